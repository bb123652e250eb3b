//! Recorder action log: loading, atomic saving and field lookups.
//!
//! Actions are kept as JSON objects so fields this tool does not know about
//! survive a rewrite unchanged and in their original order.

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::config::CropRect;

/// One recorded action, as written by the recorder.
pub type Action = Map<String, Value>;

/// Crop fields checked in priority order. The first action carrying a valid
/// rectangle under the earliest field wins.
const CROP_RECT_FIELDS: [&str; 2] = ["encodedOcrCropRect", "ocrCropRect"];

const SECONDARY_CROP_RECT_FIELD: &str = "secondaryOcrCropRect";
const TIMESTAMP_FIELD: &str = "timeSinceVideoStartNs";

pub fn load_actions(path: &Path) -> Result<Vec<Action>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read actions: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse actions: {}", path.display()))
}

/// Writes the action log as 2-space indented JSON with a trailing newline.
///
/// The file is written next to `path` and renamed over it, so readers never
/// see a partial log.
pub fn save_actions(actions: &[Action], path: &Path) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("Invalid actions path: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let json = serde_json::to_string_pretty(actions).context("Failed to serialize actions")?;
    let mut temp = NamedTempFile::new_in(dir).context("Failed to create temporary actions file")?;
    writeln!(temp, "{}", json).context("Failed to write actions")?;
    temp.persist(path)
        .map_err(|e| anyhow!("Failed to replace {}: {}", path.display(), e.error))?;
    Ok(())
}

fn integer_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a `{left, top, width, height}` object.
///
/// Rejects missing or non-numeric fields, negative offsets and non-positive
/// sizes.
pub fn normalize_crop_rect(value: Option<&Value>) -> Option<CropRect> {
    let rect = value?.as_object()?;
    let field = |name: &str| rect.get(name).and_then(integer_field);

    let left = u32::try_from(field("left")?).ok()?;
    let top = u32::try_from(field("top")?).ok()?;
    let width = u32::try_from(field("width")?).ok().filter(|w| *w > 0)?;
    let height = u32::try_from(field("height")?).ok().filter(|h| *h > 0)?;
    Some(CropRect { left, top, width, height })
}

/// Overlay crop for the session, or `fallback` when no action carries one.
pub fn determine_crop_rect(actions: &[Action], fallback: CropRect) -> CropRect {
    CROP_RECT_FIELDS
        .iter()
        .find_map(|field| {
            actions
                .iter()
                .find_map(|action| normalize_crop_rect(action.get(*field)))
        })
        .unwrap_or(fallback)
}

/// Nanosecond timestamp converted to milliseconds, ties rounded to even.
/// Missing or non-numeric timestamps count as 0.
pub fn action_target_ms(action: &Action) -> i64 {
    let ns = action
        .get(TIMESTAMP_FIELD)
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|ns| ns.is_finite())
        .unwrap_or(0.0);
    (ns / 1_000_000.0).round_ties_even() as i64
}

/// Where and when to capture the secondary digit image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryCapture {
    pub crop: CropRect,
    pub target_ms: i64,
}

/// First action with a valid secondary crop, read `settle_delay_ms` after it.
pub fn determine_secondary_capture(actions: &[Action], settle_delay_ms: i64) -> Option<SecondaryCapture> {
    actions.iter().find_map(|action| {
        let crop = normalize_crop_rect(action.get(SECONDARY_CROP_RECT_FIELD))?;
        let target_ms = (action_target_ms(action) + settle_delay_ms.max(0)).max(0);
        Some(SecondaryCapture { crop, target_ms })
    })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// File name stem for an action: its `actionId`, else `step_<stepNumber>`.
pub fn action_label(action: &Action) -> String {
    if let Some(id) = action.get("actionId").filter(|v| is_present(v)) {
        return match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    match action.get("stepNumber").filter(|v| !v.is_null()) {
        Some(Value::String(s)) => format!("step_{}", s),
        Some(other) => format!("step_{}", other),
        None => "step_unknown".to_string(),
    }
}
