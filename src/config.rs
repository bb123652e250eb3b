//! Configuration types for session analytics.
//!
//! Loads settings from config.json at startup. Provides the decoding strategy,
//! score threshold, fallback crop rectangle, screenshot offsets and the
//! reporting schema. Command line flags override individual fields.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A pixel rectangle inside a video frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 120,
            height: 50,
        }
    }
}

/// Which digit decoder reads the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DecoderKind {
    /// Reference bitmaps `0.png`..`9.png` compared pixel by pixel
    FixedTemplate,
    /// Font-rendered templates compared by normalized cross-correlation
    SyntheticTemplate,
    /// Tesseract restricted to digits
    Ocr,
    /// 5x5 bit grid with CRC checksum
    BitGrid,
}

impl DecoderKind {
    pub fn label(self) -> &'static str {
        match self {
            DecoderKind::FixedTemplate => "fixed-template",
            DecoderKind::SyntheticTemplate => "synthetic-template",
            DecoderKind::Ocr => "ocr",
            DecoderKind::BitGrid => "bit-grid",
        }
    }
}

/// How the "check" export picks its sample timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CheckInterval {
    /// One sample per second of video, derived from the frame rate
    FrameRateSeconds,
    /// One sample per 1000 ms bucket of decoded overlay time
    DecodedMillis,
}

/// Which confidence columns the CSV tables carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceColumns {
    /// `digit_1_match` .. `digit_N_match`
    PerDigit,
    /// A single `confidence` column
    Aggregate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval: CheckInterval,
    #[serde(default = "default_confidence_columns")]
    pub confidence_columns: ConfidenceColumns,
}

fn default_check_interval() -> CheckInterval {
    CheckInterval::FrameRateSeconds
}

fn default_confidence_columns() -> ConfidenceColumns {
    ConfidenceColumns::PerDigit
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            confidence_columns: default_confidence_columns(),
        }
    }
}

/// Complete analytics configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Strategy used to read the overlay in every frame
    #[serde(default = "default_decoder")]
    pub decoder: DecoderKind,
    /// Minimum aggregate confidence (0.0-1.0) for template and OCR decoders
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Crop used when no action carries an overlay rectangle
    #[serde(default)]
    pub fallback_crop: CropRect,
    /// Directory holding `0.png`..`9.png` for the fixed-template decoder
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// Font used to render synthetic digit templates
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    /// Offset of the "before" screenshot (milliseconds)
    #[serde(default = "default_before_offset_ms")]
    pub before_offset_ms: i64,
    /// Offset of the "after" screenshot (milliseconds)
    #[serde(default = "default_after_offset_ms")]
    pub after_offset_ms: i64,
    /// Delay after the secondary capture action before the overlay is read
    #[serde(default = "default_overlay_settle_delay_ms")]
    pub overlay_settle_delay_ms: i64,
    /// Upscale factor applied before OCR
    #[serde(default = "default_ocr_upscale")]
    pub ocr_upscale: u32,
    /// Gaussian blur sigma applied before OCR
    #[serde(default = "default_ocr_blur_sigma")]
    pub ocr_blur_sigma: f32,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_decoder() -> DecoderKind {
    DecoderKind::BitGrid
}

fn default_min_score() -> f32 {
    0.43
}

fn default_before_offset_ms() -> i64 {
    300
}

fn default_after_offset_ms() -> i64 {
    800
}

fn default_overlay_settle_delay_ms() -> i64 {
    500
}

fn default_ocr_upscale() -> u32 {
    3
}

fn default_ocr_blur_sigma() -> f32 {
    1.0
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            decoder: default_decoder(),
            min_score: default_min_score(),
            fallback_crop: CropRect::default(),
            template_dir: None,
            font_path: None,
            before_offset_ms: default_before_offset_ms(),
            after_offset_ms: default_after_offset_ms(),
            overlay_settle_delay_ms: default_overlay_settle_delay_ms(),
            ocr_upscale: default_ocr_upscale(),
            ocr_blur_sigma: default_ocr_blur_sigma(),
            report: ReportConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Loads configuration from `config_path` or returns defaults.
    pub fn load(config_path: &Path) -> Self {
        crate::log(&format!("Looking for config at: {}", config_path.display()));

        if !config_path.exists() {
            crate::log("config.json not found. Using default config.");
            return Self::default();
        }

        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log(&format!("Config loaded from {}", config_path.display()));
                    config
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    ));
                    Self::default()
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read {}: {}. Using defaults.",
                    config_path.display(),
                    e
                ));
                Self::default()
            }
        }
    }

    /// Template directory, defaulting to `<exe_dir>/resources/digits`.
    pub fn template_dir(&self) -> PathBuf {
        self.template_dir
            .clone()
            .unwrap_or_else(crate::paths::get_digit_template_dir)
    }
}
