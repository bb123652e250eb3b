//! Overlay style resolution.
//!
//! The recorder draws the timestamp overlay with inline CSS assignments such as
//! `frameOverlay.style.fontSize = '21.6px';`. The geometry needed by the digit
//! decoders is recovered from those assignments; anything missing or invalid
//! falls back to the defaults below.

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_DIGIT_COUNT: usize = 6;

const PREFIXED_ASSIGNMENT: &str = r"frameOverlay\.style\.(\w+)\s*=\s*'([^']+)';";
const BARE_ASSIGNMENT: &str = r"(\w+)\s*=\s*'([^']+)'";

/// Geometry of the rendered overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub digit_count: usize,
    pub font_size_px: f32,
    pub line_height: f32,
    pub letter_spacing_em: f32,
    pub font_weight: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            digit_count: DEFAULT_DIGIT_COUNT,
            font_size_px: 21.6,
            line_height: 1.0,
            letter_spacing_em: 0.06,
            font_weight: 700,
        }
    }
}

/// Parses a CSS length, requiring `unit` as suffix when given.
fn parse_css_number(value: &str, unit: Option<&str>) -> Option<f32> {
    let value = value.trim();
    let number = match unit {
        Some(unit) => value.strip_suffix(unit)?,
        None => value,
    };
    number.trim().parse::<f32>().ok().filter(|n| n.is_finite())
}

fn collect_assignments(source: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for pattern in [PREFIXED_ASSIGNMENT, BARE_ASSIGNMENT] {
        // Both patterns are constant and known to compile.
        let Ok(regex) = Regex::new(pattern) else {
            continue;
        };
        for caps in regex.captures_iter(source) {
            values.insert(caps[1].to_string(), caps[2].to_string());
        }
        if !values.is_empty() {
            break;
        }
    }
    values
}

/// Resolves an [`OverlayStyle`] from style source text. Never fails.
pub fn parse_overlay_style(source: &str) -> OverlayStyle {
    let values = collect_assignments(source);
    let defaults = OverlayStyle::default();
    if values.is_empty() {
        return defaults;
    }
    let get = |key: &str| values.get(key).map(String::as_str).unwrap_or("");

    let digit_count = parse_css_number(get("width"), Some("ch"))
        .filter(|w| *w >= 1.0)
        .map(|w| w as usize)
        .unwrap_or(defaults.digit_count);
    let font_size_px = parse_css_number(get("fontSize"), Some("px"))
        .filter(|v| *v > 0.0)
        .unwrap_or(defaults.font_size_px);
    let line_height = parse_css_number(get("lineHeight"), None)
        .filter(|v| *v > 0.0)
        .unwrap_or(defaults.line_height);
    let letter_spacing_em = parse_css_number(get("letterSpacing"), Some("em"))
        .filter(|v| *v >= 0.0)
        .unwrap_or(defaults.letter_spacing_em);
    let font_weight = parse_css_number(get("fontWeight"), None)
        .map(|w| w.trunc())
        .filter(|w| *w > 0.0)
        .map(|w| w as u32)
        .unwrap_or(defaults.font_weight);

    OverlayStyle {
        digit_count,
        font_size_px,
        line_height,
        letter_spacing_em,
        font_weight,
    }
}

/// Loads the overlay style from the recorder source, or defaults if unavailable.
pub fn load_overlay_style(path: Option<&Path>) -> OverlayStyle {
    let Some(path) = path else {
        return OverlayStyle::default();
    };
    if !path.exists() {
        crate::log(&format!(
            "Style source {} not found. Using default overlay style.",
            path.display()
        ));
        return OverlayStyle::default();
    }
    match std::fs::read_to_string(path) {
        Ok(source) => {
            let style = parse_overlay_style(&source);
            crate::log(&format!("Overlay style: {:?}", style));
            style
        }
        Err(e) => {
            crate::log(&format!(
                "Failed to read style source {}: {}. Using defaults.",
                path.display(),
                e
            ));
            OverlayStyle::default()
        }
    }
}
