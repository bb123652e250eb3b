//! Synthetic-template digit matching.
//!
//! Reference digits are rendered with the overlay's font metrics, then every
//! template and every candidate cell is normalized onto the same square
//! canvas and compared by normalized cross-correlation. The region is split
//! into exactly `digit_count` equal-width cells.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{Context, Result, anyhow};
use image::imageops;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_text_mut;
use imageproc::morphology::dilate;
use std::path::{Path, PathBuf};

use super::segment::{centered_glyph, equal_width_cells, to_gray};
use super::{DecodeOutcome, average_metric, normalize_similarity, parse_overlay_digits};
use crate::config::CropRect;
use crate::style::OverlayStyle;

/// Side of the square canvas all glyphs are normalized to.
pub const CANVAS_SIZE: u32 = 32;

/// Weights at or above this are bold.
const BOLD_WEIGHT: u32 = 600;

/// Installed monospace faces and their design weight.
const FONT_SEARCH_PATHS: &[(&str, u32)] = &[
    ("/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf", 700),
    ("/usr/share/fonts/TTF/DejaVuSansMono-Bold.ttf", 700),
    ("/usr/share/fonts/dejavu/DejaVuSansMono-Bold.ttf", 700),
    ("/usr/share/fonts/truetype/liberation/LiberationMono-Bold.ttf", 700),
    ("/Library/Fonts/Courier New Bold.ttf", 700),
    ("/System/Library/Fonts/Supplemental/Courier New Bold.ttf", 700),
    (r"C:\Windows\Fonts\consolab.ttf", 700),
    (r"C:\Windows\Fonts\courbd.ttf", 700),
    ("/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf", 400),
    ("/usr/share/fonts/TTF/DejaVuSansMono.ttf", 400),
    ("/usr/share/fonts/dejavu/DejaVuSansMono.ttf", 400),
    ("/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf", 400),
    ("/System/Library/Fonts/Supplemental/Courier New.ttf", 400),
    (r"C:\Windows\Fonts\consola.ttf", 400),
    (r"C:\Windows\Fonts\cour.ttf", 400),
];

pub struct SyntheticTemplateDecoder {
    templates: Vec<(char, GrayImage)>,
    digit_count: usize,
    min_score: f32,
}

/// Design weight read off a font file name.
fn weight_from_file_name(path: &Path) -> u32 {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ["bold", "black", "heavy"].iter().any(|w| stem.contains(w)) {
        700
    } else {
        400
    }
}

/// Dilation stands in only for weight the face itself lacks.
fn needs_dilation(style_weight: u32, face_weight: u32) -> bool {
    style_weight >= BOLD_WEIGHT && face_weight < BOLD_WEIGHT
}

/// The configured font, or the first installed face whose boldness matches
/// `style_weight` (any installed face otherwise). Returns the path and the
/// face's weight.
fn find_font(configured: Option<&Path>, style_weight: u32) -> Result<(PathBuf, u32)> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok((path.to_path_buf(), weight_from_file_name(path)));
        }
        return Err(anyhow!("Font not found: {}", path.display()));
    }
    let installed: Vec<(PathBuf, u32)> = FONT_SEARCH_PATHS
        .iter()
        .map(|&(path, weight)| (PathBuf::from(path), weight))
        .filter(|(path, _)| path.exists())
        .collect();
    let wants_bold = style_weight >= BOLD_WEIGHT;
    installed
        .iter()
        .find(|(_, weight)| (*weight >= BOLD_WEIGHT) == wants_bold)
        .or_else(|| installed.first())
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "No monospace font found for synthetic digit templates. \
                 Set \"font_path\" in config.json to a TTF/OTF file."
            )
        })
}

/// Pixel size at which one digit plus letter spacing fits a cell.
fn fitted_font_px(font: &impl Font, style: &OverlayStyle, cell_width: f32, cell_height: f32) -> f32 {
    let unit_advance = font.as_scaled(PxScale::from(1.0)).h_advance(font.glyph_id('0'));
    let per_px_width = unit_advance + style.letter_spacing_em;
    let mut px = style.font_size_px;
    if cell_height > 0.0 {
        px = px.min(cell_height / style.line_height);
    }
    if cell_width > 0.0 && per_px_width > 0.0 {
        px = px.min(cell_width / per_px_width);
    }
    px.max(1.0)
}

/// Renders `digit` white on black and normalizes it onto the canvas.
fn render_digit(font: &impl Font, digit: char, px: f32, style: &OverlayStyle, dilated: bool) -> GrayImage {
    let scaled = font.as_scaled(PxScale::from(px));
    let width = scaled.h_advance(font.glyph_id(digit)).ceil().max(1.0) as u32 + 4;
    let height = (px * style.line_height.max(1.0)).ceil() as u32 + 4;

    let mut canvas = GrayImage::new(width, height);
    draw_text_mut(&mut canvas, Luma([255u8]), 2, 2, PxScale::from(px), font, &digit.to_string());
    if dilated {
        canvas = dilate(&canvas, Norm::LInf, 1);
    }
    centered_glyph(&canvas, CANVAS_SIZE)
}

/// Builds the ten reference templates for a crop of the given size.
/// `face_weight` is the design weight of `font`.
pub fn render_templates(
    font: &impl Font,
    style: &OverlayStyle,
    crop: CropRect,
    face_weight: u32,
) -> Vec<(char, GrayImage)> {
    let cell_width = crop.width as f32 / style.digit_count.max(1) as f32;
    let px = fitted_font_px(font, style, cell_width, crop.height as f32);
    let dilated = needs_dilation(style.font_weight, face_weight);
    ('0'..='9').map(|d| (d, render_digit(font, d, px, style, dilated))).collect()
}

/// Normalized cross-correlation of two equally sized images, clamped to [0, 1].
pub fn normalized_cross_correlation(a: &GrayImage, b: &GrayImage) -> f32 {
    if a.dimensions() != b.dimensions() || a.width() == 0 || a.height() == 0 {
        return 0.0;
    }
    let n = (a.width() * a.height()) as f64;
    let mean_a = a.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let mean_b = b.pixels().map(|p| p[0] as f64).sum::<f64>() / n;

    let (mut cross, mut var_a, mut var_b) = (0.0f64, 0.0f64, 0.0f64);
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let da = pa[0] as f64 - mean_a;
        let db = pb[0] as f64 - mean_b;
        cross += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denominator = (var_a * var_b).sqrt();
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    normalize_similarity((cross / denominator) as f32)
}

impl SyntheticTemplateDecoder {
    pub fn from_font_file(
        font_path: Option<&Path>,
        style: &OverlayStyle,
        crop: CropRect,
        min_score: f32,
    ) -> Result<Self> {
        let (path, face_weight) = find_font(font_path, style.font_weight)?;
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read font: {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("Invalid font {}: {}", path.display(), e))?;
        crate::log(&format!(
            "Rendering synthetic digit templates with {} (weight {}, overlay weight {})",
            path.display(),
            face_weight,
            style.font_weight
        ));

        let templates = render_templates(&font, style, crop, face_weight);
        Ok(Self::from_templates(templates, style.digit_count, min_score))
    }

    /// Uses pre-normalized `CANVAS_SIZE` templates.
    pub fn from_templates(templates: Vec<(char, GrayImage)>, digit_count: usize, min_score: f32) -> Self {
        Self {
            templates,
            digit_count,
            min_score,
        }
    }

    pub fn decode(&self, roi: &RgbImage) -> DecodeOutcome {
        let (width, height) = roi.dimensions();
        let cells = equal_width_cells(width, self.digit_count);
        if height == 0 || cells.is_empty() || cells.iter().any(|&(start, end)| end <= start) {
            return DecodeOutcome::absent(self.digit_count);
        }

        let gray = to_gray(roi);
        let mut digits = String::with_capacity(self.digit_count);
        let mut metrics = Vec::with_capacity(self.digit_count);
        for (start, end) in cells {
            let cell = imageops::crop_imm(&gray, start, 0, end - start, height).to_image();
            let candidate = centered_glyph(&cell, CANVAS_SIZE);

            let mut best: Option<(char, f32)> = None;
            for (digit, template) in &self.templates {
                let score = normalized_cross_correlation(&candidate, template);
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((*digit, score));
                }
            }
            let Some((digit, score)) = best else {
                return DecodeOutcome::absent(self.digit_count);
            };
            digits.push(digit);
            metrics.push(Some(score));
        }

        let score = average_metric(&metrics);
        let value = if score < self.min_score {
            None
        } else {
            parse_overlay_digits(&digits, self.digit_count)
        };
        DecodeOutcome {
            value,
            score,
            metrics,
        }
    }
}
