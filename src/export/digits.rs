//! Secondary digit capture.
//!
//! Some recordings mark an action with `secondaryOcrCropRect`. Shortly after
//! that action the overlay region is cropped from the video and written out
//! together with its Otsu mask and per-glyph crops, which are useful for
//! building fixed digit templates.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

use super::actions::{Action, determine_secondary_capture};
use crate::decode::segment::{add_black_border, extract_digit_crops, otsu_binarize, to_gray};
use crate::ocr::crop_rect;
use crate::video::{FrameSource, read_frame_at_ms};

/// At most this many glyph crops are written.
const MAX_DIGIT_CROPS: usize = 10;

fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Removes `0.png`..`9.png` and legacy `digit_*.png` from `dir`.
fn clear_digit_files(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for digit in 0..MAX_DIGIT_CROPS {
        remove_if_exists(&dir.join(format!("{}.png", digit)))?;
    }
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let legacy = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("digit_") && n.ends_with(".png"));
        if legacy {
            std::fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Writes the capture outputs for an already cropped overlay region.
///
/// `image_path` is `<dir>/ocr_digits.png`; the mask goes next to it and
/// 1-px padded glyphs go to the sibling `ocr_digits_2/`.
pub fn write_digit_capture(cropped: &RgbImage, image_path: &Path) -> Result<()> {
    let digits_dir = image_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid capture path: {}", image_path.display()))?;
    let padded_dir = digits_dir.with_file_name("ocr_digits_2");
    std::fs::create_dir_all(digits_dir)
        .with_context(|| format!("Failed to create directory: {}", digits_dir.display()))?;
    std::fs::create_dir_all(&padded_dir)
        .with_context(|| format!("Failed to create directory: {}", padded_dir.display()))?;

    cropped
        .save(image_path)
        .with_context(|| format!("Failed to save {}", image_path.display()))?;
    let gray = to_gray(cropped);
    let binary = otsu_binarize(&gray);
    let otsu_path = digits_dir.join("ocr_digits_otsu.png");
    binary
        .save(&otsu_path)
        .with_context(|| format!("Failed to save {}", otsu_path.display()))?;

    clear_digit_files(digits_dir)?;
    clear_digit_files(&padded_dir)?;
    let crops = extract_digit_crops(&gray, &binary);
    for (i, crop) in crops.iter().take(MAX_DIGIT_CROPS).enumerate() {
        let name = format!("{}.png", i);
        crop.save(digits_dir.join(&name))
            .with_context(|| format!("Failed to save digit crop {}", name))?;
        add_black_border(crop)
            .save(padded_dir.join(&name))
            .with_context(|| format!("Failed to save padded digit crop {}", name))?;
    }
    crate::log(&format!("Secondary capture: {} glyphs", crops.len().min(MAX_DIGIT_CROPS)));
    Ok(())
}

/// Removes every output of a previous capture.
fn clear_digit_capture(image_path: &Path) -> Result<()> {
    remove_if_exists(image_path)?;
    let Some(digits_dir) = image_path.parent() else {
        return Ok(());
    };
    remove_if_exists(&digits_dir.join("ocr_digits_otsu.png"))?;
    clear_digit_files(digits_dir)?;
    clear_digit_files(&digits_dir.with_file_name("ocr_digits_2"))
}

/// Captures the overlay region `settle_delay_ms` after the first action with
/// a secondary crop. Without such an action, earlier capture outputs are
/// removed. A frame that cannot be read or an empty crop leaves the outputs
/// as they are.
pub fn write_secondary_digit_capture(
    actions: &[Action],
    source: &mut dyn FrameSource,
    image_path: &Path,
    settle_delay_ms: i64,
) -> Result<()> {
    let Some(capture) = determine_secondary_capture(actions, settle_delay_ms) else {
        return clear_digit_capture(image_path);
    };

    let Some(frame) = read_frame_at_ms(source, capture.target_ms)? else {
        crate::log(&format!("Secondary capture: no frame at {} ms", capture.target_ms));
        return Ok(());
    };
    let cropped = crop_rect(&frame, &capture.crop);
    if cropped.width() == 0 || cropped.height() == 0 {
        crate::log("Secondary capture: crop is outside the frame");
        return Ok(());
    }
    write_digit_capture(&cropped, image_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::testing::overlay;
    use crate::video::memory::MemoryFrameSource;
    use image::{Rgb, imageops};
    use serde_json::json;
    use tempfile::tempdir;

    fn frame_with_overlay(digits: &str) -> RgbImage {
        let mut frame = RgbImage::from_pixel(100, 40, Rgb([20, 20, 20]));
        imageops::replace(&mut frame, &overlay(digits, 2, 10, 3), 10, 5);
        frame
    }

    fn capture_action() -> Action {
        json!({
            "timeSinceVideoStartNs": 0,
            "secondaryOcrCropRect": {"left": 10, "top": 5, "width": 30, "height": 16}
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_capture_writes_glyphs() {
        let dir = tempdir().unwrap();
        let image_path = dir.path().join("ocr_digits").join("ocr_digits.png");
        let mut source = MemoryFrameSource::new(vec![frame_with_overlay("000"); 20], Some(10.0));

        write_secondary_digit_capture(&[capture_action()], &mut source, &image_path, 500).unwrap();

        let captured = image::open(&image_path).unwrap().to_rgb8();
        assert_eq!(captured.dimensions(), (30, 16));
        assert!(dir.path().join("ocr_digits").join("ocr_digits_otsu.png").exists());
        for i in 0..3 {
            let glyph = image::open(dir.path().join("ocr_digits").join(format!("{}.png", i)))
                .unwrap()
                .to_luma8();
            assert_eq!(glyph.dimensions(), (6, 10));
            let padded = image::open(dir.path().join("ocr_digits_2").join(format!("{}.png", i)))
                .unwrap()
                .to_luma8();
            assert_eq!(padded.dimensions(), (8, 12));
        }
        assert!(!dir.path().join("ocr_digits").join("3.png").exists());
    }

    #[test]
    fn test_without_capture_action_clears_outputs() {
        let dir = tempdir().unwrap();
        let digits_dir = dir.path().join("ocr_digits");
        let padded_dir = dir.path().join("ocr_digits_2");
        std::fs::create_dir_all(&digits_dir).unwrap();
        std::fs::create_dir_all(&padded_dir).unwrap();
        for name in ["ocr_digits.png", "ocr_digits_otsu.png", "0.png", "digit_1.png", "other.png"] {
            std::fs::write(digits_dir.join(name), b"x").unwrap();
        }
        std::fs::write(padded_dir.join("4.png"), b"x").unwrap();

        let mut source = MemoryFrameSource::numbered(2, Some(10.0));
        let image_path = digits_dir.join("ocr_digits.png");
        write_secondary_digit_capture(&[], &mut source, &image_path, 500).unwrap();

        assert!(!image_path.exists());
        assert!(!digits_dir.join("ocr_digits_otsu.png").exists());
        assert!(!digits_dir.join("0.png").exists());
        assert!(!digits_dir.join("digit_1.png").exists());
        assert!(digits_dir.join("other.png").exists());
        assert!(!padded_dir.join("4.png").exists());
    }

    #[test]
    fn test_missing_frame_leaves_outputs() {
        let dir = tempdir().unwrap();
        let image_path = dir.path().join("ocr_digits").join("ocr_digits.png");
        let mut source = MemoryFrameSource::new(Vec::new(), Some(10.0));

        write_secondary_digit_capture(&[capture_action()], &mut source, &image_path, 500).unwrap();
        assert!(!image_path.exists());
    }
}
