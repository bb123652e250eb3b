//! Before/at/after screenshots for every recorded action.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::actions::{Action, action_label, action_target_ms};
use crate::timeline::{FrameDecodeResult, LookupMode, find_frame_index};
use crate::video::FrameCache;

/// Offsets of the before/after screenshots relative to the action time.
#[derive(Debug, Clone, Copy)]
pub struct ScreenshotOffsets {
    pub before_ms: i64,
    pub after_ms: i64,
}

impl Default for ScreenshotOffsets {
    fn default() -> Self {
        Self {
            before_ms: 300,
            after_ms: 800,
        }
    }
}

/// A single screenshot: the overlay time queried and the frame it resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shot {
    pub target_ms: i64,
    pub frame_index: usize,
}

/// Screenshots planned for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionShots {
    pub label: String,
    pub before: Shot,
    pub at: Shot,
    pub after: Shot,
}

impl ActionShots {
    fn named(&self) -> [(&'static str, Shot); 3] {
        [("before", self.before), ("at", self.at), ("after", self.after)]
    }
}

/// Resolves the three query times of every action against the timeline.
pub fn plan_action_screenshots(
    actions: &[Action],
    results: &[FrameDecodeResult],
    offsets: ScreenshotOffsets,
) -> Vec<ActionShots> {
    let shot = |target_ms: i64, mode: LookupMode| Shot {
        target_ms,
        frame_index: find_frame_index(results, target_ms, mode),
    };

    actions
        .iter()
        .map(|action| {
            let target_ms = action_target_ms(action);
            ActionShots {
                label: action_label(action),
                before: shot((target_ms - offsets.before_ms).max(0), LookupMode::AtOrBefore),
                at: shot(target_ms, LookupMode::AtOrBefore),
                after: shot(target_ms + offsets.after_ms, LookupMode::AtOrAfter),
            }
        })
        .collect()
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Writes `<label>_before.png`, `<label>_at.png` and `<label>_after.png` for
/// each action and returns copies of the actions with `screenshotTimesMs` and
/// `screenshots` added. The input actions are left untouched.
///
/// `plans` must come from [`plan_action_screenshots`] over the same actions.
pub fn capture_action_screenshots(
    actions: &[Action],
    plans: &[ActionShots],
    frames: &FrameCache,
    screenshots_dir: &Path,
) -> Result<Vec<Action>> {
    std::fs::create_dir_all(screenshots_dir)
        .with_context(|| format!("Failed to create directory: {}", screenshots_dir.display()))?;

    let mut updated = Vec::with_capacity(actions.len());
    for (action, plan) in actions.iter().zip(plans) {
        let mut times = serde_json::Map::new();
        let mut paths = serde_json::Map::new();

        for (name, shot) in plan.named() {
            let path: PathBuf = screenshots_dir.join(format!("{}_{}.png", plan.label, name));
            match frames.get(shot.frame_index) {
                Some(frame) => frame
                    .save(&path)
                    .with_context(|| format!("Failed to save screenshot: {}", path.display()))?,
                None => crate::log(&format!(
                    "No frame {} for {} screenshot of {}",
                    shot.frame_index, name, plan.label
                )),
            }
            times.insert(name.to_string(), json!(shot.target_ms));
            paths.insert(name.to_string(), Value::String(path_string(&path)));
        }

        let mut copy = action.clone();
        copy.insert("screenshotTimesMs".to_string(), Value::Object(times));
        copy.insert("screenshots".to_string(), Value::Object(paths));
        updated.push(copy);
    }

    Ok(updated)
}

/// Every frame index the action screenshots need.
pub fn planned_frame_indices(plans: &[ActionShots]) -> impl Iterator<Item = usize> + '_ {
    plans
        .iter()
        .flat_map(|plan| [plan.before.frame_index, plan.at.frame_index, plan.after.frame_index])
}
