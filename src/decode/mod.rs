//! Overlay digit decoding.
//!
//! Four interchangeable strategies read the elapsed-time overlay from a
//! cropped frame region:
//! - `FixedTemplate`: segmented glyphs compared to reference bitmaps
//! - `SyntheticTemplate`: equal-width cells compared to font-rendered digits
//! - `Ocr`: Tesseract restricted to digits, binary and inverted passes
//! - `BitGrid`: a 5x5 bit pattern guarded by a CRC checksum
//!
//! Every strategy returns a [`DecodeOutcome`]; a frame that cannot be read
//! yields `value: None` rather than an error.

pub mod bitgrid;
pub mod fixed_template;
pub mod ocr_digits;
pub mod segment;
pub mod synthetic;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use image::RgbImage;
use regex::Regex;

use crate::config::{AnalyticsConfig, CropRect, DecoderKind};
use crate::style::OverlayStyle;

pub use bitgrid::BitGridDecoder;
pub use fixed_template::FixedTemplateDecoder;
pub use ocr_digits::OcrDigitDecoder;
pub use synthetic::SyntheticTemplateDecoder;

/// Largest value the six-digit overlay can show.
pub const MAX_OVERLAY_VALUE: u32 = 999_999;

/// Result of decoding one frame region.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    /// Decoded elapsed milliseconds, absent when decoding failed
    pub value: Option<u32>,
    /// Aggregate confidence in [0, 1]
    pub score: f32,
    /// Per-unit (digit or bit) confidence, `None` where a unit was not matched
    pub metrics: Vec<Option<f32>>,
}

impl DecodeOutcome {
    /// A failed decode with `metrics_len` missing unit scores.
    pub fn absent(metrics_len: usize) -> Self {
        Self {
            value: None,
            score: 0.0,
            metrics: vec![None; metrics_len],
        }
    }
}

/// The decoding strategy selected for a session.
pub enum DigitDecoder {
    FixedTemplate(FixedTemplateDecoder),
    SyntheticTemplate(SyntheticTemplateDecoder),
    Ocr(OcrDigitDecoder),
    BitGrid(BitGridDecoder),
}

impl DigitDecoder {
    /// Prepares the configured strategy. Anything a strategy needs from outside
    /// the video (templates, font, OCR engine) is checked here, before any
    /// frame is decoded.
    pub fn build(
        kind: DecoderKind,
        config: &AnalyticsConfig,
        style: &OverlayStyle,
        crop: CropRect,
    ) -> Result<Self> {
        let decoder = match kind {
            DecoderKind::FixedTemplate => DigitDecoder::FixedTemplate(
                FixedTemplateDecoder::load(&config.template_dir(), style.digit_count, config.min_score)?,
            ),
            DecoderKind::SyntheticTemplate => DigitDecoder::SyntheticTemplate(
                SyntheticTemplateDecoder::from_font_file(
                    config.font_path.as_deref(),
                    style,
                    crop,
                    config.min_score,
                )?,
            ),
            DecoderKind::Ocr => DigitDecoder::Ocr(OcrDigitDecoder::new(
                style.digit_count,
                config.min_score,
                config.ocr_upscale,
                config.ocr_blur_sigma,
            )?),
            DecoderKind::BitGrid => DigitDecoder::BitGrid(BitGridDecoder),
        };
        Ok(decoder)
    }

    pub fn kind(&self) -> DecoderKind {
        match self {
            DigitDecoder::FixedTemplate(_) => DecoderKind::FixedTemplate,
            DigitDecoder::SyntheticTemplate(_) => DecoderKind::SyntheticTemplate,
            DigitDecoder::Ocr(_) => DecoderKind::Ocr,
            DigitDecoder::BitGrid(_) => DecoderKind::BitGrid,
        }
    }

    /// Decodes one cropped overlay region.
    pub fn decode(&self, roi: &RgbImage) -> DecodeOutcome {
        match self {
            DigitDecoder::FixedTemplate(d) => d.decode(roi),
            DigitDecoder::SyntheticTemplate(d) => d.decode(roi),
            DigitDecoder::Ocr(d) => d.decode(roi),
            DigitDecoder::BitGrid(d) => d.decode(roi),
        }
    }
}

/// Clamps a similarity to [0, 1]; non-finite values become 0.
pub fn normalize_similarity(score: f32) -> f32 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// Truncates or pads `metrics` with `None` to exactly `count` entries.
pub fn pad_metrics(metrics: &[Option<f32>], count: usize) -> Vec<Option<f32>> {
    let mut padded: Vec<Option<f32>> = metrics.iter().take(count).copied().collect();
    padded.resize(count, None);
    padded
}

/// Mean of the present metrics (missing entries are skipped, not zero).
pub fn average_metric(metrics: &[Option<f32>]) -> f32 {
    let present: Vec<f32> = metrics.iter().flatten().copied().collect();
    if present.is_empty() {
        return 0.0;
    }
    normalize_similarity(present.iter().sum::<f32>() / present.len() as f32)
}

/// Parses the first run of digits in `text` as an overlay value.
///
/// Whitespace is ignored. Runs longer than `max_digits` or values above
/// [`MAX_OVERLAY_VALUE`] are rejected.
pub fn parse_overlay_digits(text: &str, max_digits: usize) -> Option<u32> {
    let normalized: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = Regex::new(r"\d+").ok()?.find(&normalized)?.as_str().to_string();
    if digits.len() > max_digits.max(1) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|v| *v <= MAX_OVERLAY_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_similarity() {
        assert_eq!(normalize_similarity(0.5), 0.5);
        assert_eq!(normalize_similarity(1.0000001), 1.0);
        assert_eq!(normalize_similarity(-0.2), 0.0);
        assert_eq!(normalize_similarity(f32::NAN), 0.0);
        assert_eq!(normalize_similarity(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_pad_metrics() {
        assert_eq!(pad_metrics(&[Some(0.5)], 3), vec![Some(0.5), None, None]);
        assert_eq!(pad_metrics(&[Some(0.1), Some(0.2), Some(0.3)], 2), vec![Some(0.1), Some(0.2)]);
        assert!(pad_metrics(&[], 0).is_empty());
    }

    #[test]
    fn test_average_metric_skips_missing() {
        assert_eq!(average_metric(&[Some(0.5), None, Some(1.0)]), 0.75);
        assert_eq!(average_metric(&[None, None]), 0.0);
        assert_eq!(average_metric(&[]), 0.0);
    }

    #[test]
    fn test_average_metric_is_clamped() {
        let metrics = vec![Some(1.0f32); 7];
        let avg = average_metric(&metrics);
        assert!((0.0..=1.0).contains(&avg));
        assert_eq!(average_metric(&[Some(1.5), Some(1.5)]), 1.0);
    }

    #[test]
    fn test_parse_overlay_digits() {
        assert_eq!(parse_overlay_digits("001234", 6), Some(1234));
        assert_eq!(parse_overlay_digits(" 12 34 ", 6), Some(1234));
        assert_eq!(parse_overlay_digits("abc42def7", 6), Some(42));
        assert_eq!(parse_overlay_digits("1234567", 6), None);
        assert_eq!(parse_overlay_digits("1234567", 7), None);
        assert_eq!(parse_overlay_digits("", 6), None);
        assert_eq!(parse_overlay_digits("none", 6), None);
        assert_eq!(parse_overlay_digits("5", 0), Some(5));
    }
}
