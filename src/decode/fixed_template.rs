//! Fixed-template digit matching.
//!
//! Glyphs are segmented by foreground column runs and compared to reference
//! bitmaps `0.png`..`9.png` by mean absolute pixel difference.

use anyhow::{Context, Result, bail};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use std::path::Path;

use super::segment::{add_black_border, extract_digit_crops, otsu_binarize, to_gray};
use super::{DecodeOutcome, average_metric, normalize_similarity, pad_metrics, parse_overlay_digits};

pub struct FixedTemplateDecoder {
    /// Binarized reference bitmaps in scan order
    templates: Vec<(char, GrayImage)>,
    digit_count: usize,
    min_score: f32,
}

/// Loads `<dir>/<d>.png` for each digit present, binarized.
pub fn load_digit_templates(template_dir: &Path) -> Result<Vec<(char, GrayImage)>> {
    let mut templates = Vec::new();
    for digit in 0..10u8 {
        let path = template_dir.join(format!("{}.png", digit));
        if !path.exists() {
            continue;
        }
        let img = image::open(&path)
            .with_context(|| format!("Failed to read digit template: {}", path.display()))?
            .to_luma8();
        if img.width() == 0 || img.height() == 0 {
            continue;
        }
        templates.push(((b'0' + digit) as char, otsu_binarize(&img)));
    }
    Ok(templates)
}

/// Similarity in [0, 1]: one minus the normalized mean absolute difference
/// after resizing the candidate to the template's shape.
pub fn compute_digit_similarity(candidate: &GrayImage, template: &GrayImage) -> f32 {
    let candidate = otsu_binarize(candidate);
    let template = otsu_binarize(template);
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || candidate.width() == 0 || candidate.height() == 0 {
        return 0.0;
    }
    let resized = imageops::resize(&candidate, tw, th, FilterType::Nearest);

    let total: u64 = resized
        .pixels()
        .zip(template.pixels())
        .map(|(a, b)| (a[0] as i32 - b[0] as i32).unsigned_abs() as u64)
        .sum();
    let mean = total as f32 / (tw as f32 * th as f32);
    normalize_similarity(1.0 - mean / 255.0)
}

impl FixedTemplateDecoder {
    pub fn load(template_dir: &Path, digit_count: usize, min_score: f32) -> Result<Self> {
        let templates = load_digit_templates(template_dir)?;
        if templates.is_empty() {
            bail!(
                "No digit templates found in {}. Expected 0.png..9.png.",
                template_dir.display()
            );
        }
        crate::log(&format!(
            "Loaded {} digit templates from {}",
            templates.len(),
            template_dir.display()
        ));
        Ok(Self::from_templates(templates, digit_count, min_score))
    }

    pub fn from_templates(templates: Vec<(char, GrayImage)>, digit_count: usize, min_score: f32) -> Self {
        Self {
            templates,
            digit_count,
            min_score,
        }
    }

    /// Best matching template; ties keep the first template scanned.
    fn best_digit_match(&self, digit_image: &GrayImage) -> Option<(char, f32)> {
        let mut best: Option<(char, f32)> = None;
        for (digit, template) in &self.templates {
            let similarity = compute_digit_similarity(digit_image, template);
            if best.is_none_or(|(_, best_similarity)| similarity > best_similarity) {
                best = Some((*digit, similarity));
            }
        }
        best
    }

    pub fn decode(&self, roi: &RgbImage) -> DecodeOutcome {
        if roi.width() == 0 || roi.height() == 0 || self.templates.is_empty() {
            return DecodeOutcome::absent(self.digit_count);
        }

        let gray = to_gray(roi);
        let binary = otsu_binarize(&gray);
        let crops = extract_digit_crops(&gray, &binary);

        let mut matched = String::new();
        let mut metrics = Vec::with_capacity(self.digit_count);
        for crop in crops.iter().take(self.digit_count) {
            let bordered = add_black_border(&otsu_binarize(crop));
            match self.best_digit_match(&bordered) {
                Some((digit, similarity)) => {
                    matched.push(digit);
                    metrics.push(Some(normalize_similarity(similarity)));
                }
                None => metrics.push(None),
            }
        }

        let metrics = pad_metrics(&metrics, self.digit_count);
        let score = average_metric(&metrics);
        let mut value = parse_overlay_digits(&matched, self.digit_count);
        if matched.len() != self.digit_count || score < self.min_score {
            value = None;
        }

        DecodeOutcome {
            value,
            score,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::testing::{glyph, overlay};
    use tempfile::tempdir;

    fn reference_templates() -> Vec<(char, GrayImage)> {
        (0..10)
            .map(|d| ((b'0' + d as u8) as char, add_black_border(&otsu_binarize(&glyph(d, 3)))))
            .collect()
    }

    #[test]
    fn test_identical_glyph_scores_one() {
        let template = add_black_border(&otsu_binarize(&glyph(4, 3)));
        assert_eq!(compute_digit_similarity(&template, &template), 1.0);
        let other = add_black_border(&otsu_binarize(&glyph(7, 3)));
        assert!(compute_digit_similarity(&template, &other) < 1.0);
    }

    #[test]
    fn test_decode_six_digits() {
        let decoder = FixedTemplateDecoder::from_templates(reference_templates(), 6, 0.43);
        let roi = overlay("012345", 3, 13, 4);
        let outcome = decoder.decode(&roi);

        assert_eq!(outcome.value, Some(12345));
        assert_eq!(outcome.metrics.len(), 6);
        assert!(outcome.metrics.iter().all(|m| *m == Some(1.0)));
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_decode_rejects_missing_glyphs() {
        let decoder = FixedTemplateDecoder::from_templates(reference_templates(), 7, 0.43);
        let outcome = decoder.decode(&overlay("987654", 3, 13, 4));

        assert_eq!(outcome.value, None);
        assert_eq!(outcome.metrics.len(), 7);
        assert_eq!(outcome.metrics[6], None);
        // Missing digits do not drag the mean down
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_decode_rejects_low_score() {
        let decoder = FixedTemplateDecoder::from_templates(reference_templates(), 6, 1.5);
        assert_eq!(decoder.decode(&overlay("111111", 3, 13, 4)).value, None);
    }

    #[test]
    fn test_blank_region_is_absent() {
        let decoder = FixedTemplateDecoder::from_templates(reference_templates(), 6, 0.43);
        let blank = RgbImage::from_pixel(60, 20, image::Rgb([20, 20, 20]));
        let outcome = decoder.decode(&blank);
        assert_eq!(outcome.value, None);
        assert_eq!(outcome.metrics, vec![None; 6]);
        assert_eq!(outcome.score, 0.0);

        assert_eq!(decoder.decode(&RgbImage::new(0, 0)).value, None);
    }

    #[test]
    fn test_ties_keep_first_template() {
        let same = add_black_border(&otsu_binarize(&glyph(8, 2)));
        let decoder = FixedTemplateDecoder::from_templates(
            vec![('3', same.clone()), ('8', same.clone())],
            1,
            0.0,
        );
        assert_eq!(decoder.best_digit_match(&same).map(|(d, _)| d), Some('3'));
    }

    #[test]
    fn test_load_templates_from_directory() {
        let dir = tempdir().unwrap();
        glyph(1, 2).save(dir.path().join("1.png")).unwrap();
        glyph(5, 2).save(dir.path().join("5.png")).unwrap();

        let templates = load_digit_templates(dir.path()).unwrap();
        let digits: Vec<char> = templates.iter().map(|(d, _)| *d).collect();
        assert_eq!(digits, vec!['1', '5']);

        let empty = tempdir().unwrap();
        assert!(FixedTemplateDecoder::load(empty.path(), 6, 0.43).is_err());
    }
}
