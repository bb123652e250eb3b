use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::config::CropRect;
use crate::decode::segment::otsu_binarize;

/// Crops a sub-region from a frame in pixel coordinates.
///
/// The rectangle is clamped to the frame bounds, so a rectangle partly or
/// wholly outside the frame yields a smaller (possibly empty) image.
pub fn crop_rect(img: &RgbImage, rect: &CropRect) -> RgbImage {
    let (w, h) = img.dimensions();

    let x0 = rect.left.min(w);
    let y0 = rect.top.min(h);
    let rw = rect.width.min(w - x0);
    let rh = rect.height.min(h - y0);

    imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Nearest-neighbour upscale by an integer factor.
pub fn upscale(gray: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.max(1);
    imageops::resize(gray, gray.width() * factor, gray.height() * factor, FilterType::Nearest)
}

/// Gaussian blur; a non-positive sigma leaves the image as is.
pub fn blur(gray: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 && gray.width() > 0 && gray.height() > 0 {
        gaussian_blur_f32(gray, sigma)
    } else {
        gray.clone()
    }
}

/// Prepares a grayscale region for OCR: upscale, blur, then Otsu binarization.
pub fn prepare_for_ocr(gray: &GrayImage, factor: u32, blur_sigma: f32) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    otsu_binarize(&blur(&upscale(gray, factor), blur_sigma))
}

/// Photometric inverse of a grayscale image.
pub fn invert(img: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([255 - img.get_pixel(x, y)[0]])
    })
}
