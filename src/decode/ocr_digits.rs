//! OCR digit reading through Tesseract.
//!
//! The region is upscaled, blurred and binarized, then recognized twice: once
//! as-is and once inverted, since the overlay may be light-on-dark or the
//! reverse. The more confident parse wins.

use anyhow::Result;
use image::{GrayImage, RgbImage};
use std::path::PathBuf;

use super::DecodeOutcome;
use super::segment::to_gray;
use crate::ocr::engine::{OcrConfig, recognize_image};
use crate::ocr::extract::{DigitReading, best_reading, extract_digit_reading};
use crate::ocr::preprocess::{invert, prepare_for_ocr};
use crate::ocr::setup::find_tessdata_dir;

pub struct OcrDigitDecoder {
    tesseract_exe: PathBuf,
    digit_count: usize,
    min_score: f32,
    upscale: u32,
    blur_sigma: f32,
    ocr_config: OcrConfig,
}

impl OcrDigitDecoder {
    /// Fails when Tesseract cannot be started.
    pub fn new(digit_count: usize, min_score: f32, upscale: u32, blur_sigma: f32) -> Result<Self> {
        let tesseract_exe = crate::ocr::ensure_tesseract()?;
        let ocr_config = OcrConfig {
            tessdata_dir: find_tessdata_dir(),
            ..OcrConfig::digits_single_line()
        };
        Ok(Self {
            tesseract_exe,
            digit_count,
            min_score,
            upscale,
            blur_sigma,
            ocr_config,
        })
    }

    fn run_pass(&self, image: &GrayImage) -> Option<DigitReading> {
        match recognize_image(&self.tesseract_exe, image, &self.ocr_config) {
            Ok(lines) => extract_digit_reading(&lines, self.digit_count),
            Err(e) => {
                crate::log(&format!("OCR pass failed: {}", e));
                None
            }
        }
    }

    pub fn decode(&self, roi: &RgbImage) -> DecodeOutcome {
        if roi.width() == 0 || roi.height() == 0 {
            return DecodeOutcome::absent(1);
        }
        let prepared = prepare_for_ocr(&to_gray(roi), self.upscale, self.blur_sigma);
        let binary = self.run_pass(&prepared);
        let inverted = self.run_pass(&invert(&prepared));

        outcome_from_reading(best_reading(binary, inverted), self.min_score)
    }
}

/// One aggregate metric; below `min_score` the value is dropped.
fn outcome_from_reading(reading: Option<DigitReading>, min_score: f32) -> DecodeOutcome {
    match reading {
        Some(reading) => DecodeOutcome {
            value: (reading.confidence >= min_score).then_some(reading.value),
            score: reading.confidence,
            metrics: vec![Some(reading.confidence)],
        },
        None => DecodeOutcome::absent(1),
    }
}
