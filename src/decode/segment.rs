//! Glyph segmentation.
//!
//! Splits a cropped overlay into per-digit images, either by foreground column
//! runs (variable width) or by equal-width cells. None of these functions fail:
//! a blank or empty region simply produces no glyphs.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;

/// Converts to grayscale using the ITU-R BT.601 luma weights.
pub fn to_gray(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Global binarization with an automatically selected (Otsu) threshold.
///
/// Pixels brighter than the threshold become 255, all others 0. A uniform
/// image has no foreground.
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let min = gray.pixels().map(|p| p[0]).min().unwrap_or(0);
    let max = gray.pixels().map(|p| p[0]).max().unwrap_or(0);
    if min == max {
        return GrayImage::new(width, height);
    }

    let level = otsu_level(gray);
    GrayImage::from_fn(width, height, |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Collapses a foreground mask into half-open `(start, end)` runs.
pub fn find_foreground_ranges(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, &on) in mask.iter().enumerate() {
        match (start, on) {
            (None, true) => start = Some(idx),
            (Some(s), false) => {
                ranges.push((s, idx));
                start = None;
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        ranges.push((s, mask.len()));
    }
    ranges
}

fn column_mask(binary: &GrayImage) -> Vec<bool> {
    (0..binary.width())
        .map(|x| (0..binary.height()).any(|y| binary.get_pixel(x, y)[0] > 0))
        .collect()
}

fn row_mask(binary: &GrayImage, x0: u32, x1: u32) -> Vec<bool> {
    (0..binary.height())
        .map(|y| (x0..x1).any(|x| binary.get_pixel(x, y)[0] > 0))
        .collect()
}

/// Bounding box `(left, top, right, bottom)` of the foreground, exclusive ends.
pub fn foreground_bounds(binary: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let columns = column_mask(binary);
    let left = columns.iter().position(|&on| on)? as u32;
    let right = columns.iter().rposition(|&on| on)? as u32 + 1;
    let rows = row_mask(binary, left, right);
    let top = rows.iter().position(|&on| on)? as u32;
    let bottom = rows.iter().rposition(|&on| on)? as u32 + 1;
    Some((left, top, right, bottom))
}

/// Splits `gray` at the foreground column runs of `binary`, trimming each
/// glyph to its foreground rows. Glyphs are returned left to right.
pub fn extract_digit_crops(gray: &GrayImage, binary: &GrayImage) -> Vec<GrayImage> {
    let mut crops = Vec::new();

    for (start, end) in find_foreground_ranges(&column_mask(binary)) {
        let (x0, x1) = (start as u32, end as u32);
        let rows = row_mask(binary, x0, x1);
        let Some(top) = rows.iter().position(|&on| on) else {
            continue;
        };
        let bottom = rows.iter().rposition(|&on| on).unwrap_or(top) + 1;

        let (top, bottom) = (top as u32, bottom as u32);
        crops.push(imageops::crop_imm(gray, x0, top, x1 - x0, bottom - top).to_image());
    }

    crops
}

/// Equal-width column boundaries `(start, end)` for `count` cells.
///
/// Cells may be empty when `count` exceeds `width`.
pub fn equal_width_cells(width: u32, count: usize) -> Vec<(u32, u32)> {
    if count == 0 {
        return Vec::new();
    }
    let bound = |i: usize| (i as f64 * width as f64 / count as f64).round() as u32;
    (0..count).map(|i| (bound(i), bound(i + 1))).collect()
}

/// Adds a 1-pixel black border.
pub fn add_black_border(img: &GrayImage) -> GrayImage {
    let mut bordered = GrayImage::new(img.width() + 2, img.height() + 2);
    imageops::replace(&mut bordered, img, 1, 1);
    bordered
}

/// Binarizes `gray`, crops to the glyph bounding box, centers it in a square
/// and resizes to `canvas x canvas`. A blank input yields a black canvas.
pub fn centered_glyph(gray: &GrayImage, canvas: u32) -> GrayImage {
    let binary = otsu_binarize(gray);
    let Some((left, top, right, bottom)) = foreground_bounds(&binary) else {
        return GrayImage::new(canvas, canvas);
    };

    let (w, h) = (right - left, bottom - top);
    let glyph = imageops::crop_imm(&binary, left, top, w, h).to_image();
    let side = w.max(h);
    let mut square = GrayImage::new(side, side);
    imageops::replace(
        &mut square,
        &glyph,
        ((side - w) / 2) as i64,
        ((side - h) / 2) as i64,
    );

    imageops::resize(&square, canvas, canvas, FilterType::Triangle)
}
