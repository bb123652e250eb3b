//! Session discovery and the per-session pipeline.

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::{AnalyticsConfig, CropRect};
use crate::decode::DigitDecoder;
use crate::export::{self, Action, ScreenshotOffsets, TableSchema};
use crate::paths::{SCRIBER_DIR_NAME, SessionPaths};
use crate::style::{OverlayStyle, load_overlay_style};
use crate::timeline::build_timeline;
use crate::video::{FfmpegFrameSource, FrameCache, FrameSource};

/// A session directory contains the recorder's `01_scriber` folder.
pub fn is_session_dir(path: &Path) -> bool {
    path.join(SCRIBER_DIR_NAME).is_dir()
}

/// `target` itself when it is a session, otherwise its session
/// subdirectories sorted by name.
pub fn resolve_session_dirs(target: &Path) -> Result<Vec<PathBuf>> {
    if is_session_dir(target) {
        return Ok(vec![target.to_path_buf()]);
    }

    let mut sessions: Vec<PathBuf> = std::fs::read_dir(target)
        .with_context(|| format!("Failed to list {}", target.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir() && is_session_dir(p))
        .collect();
    sessions.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if sessions.is_empty() {
        bail!(
            "No session directories found in: {}. Expected a session folder with {} \
             or a parent directory containing sessions.",
            target.display(),
            SCRIBER_DIR_NAME
        );
    }
    Ok(sessions)
}

/// Everything resolved for a session before its video is decoded.
pub struct SessionPlan<'a> {
    pub paths: SessionPaths,
    pub actions: Vec<Action>,
    pub crop: CropRect,
    pub style: OverlayStyle,
    pub config: &'a AnalyticsConfig,
}

/// Processes one session. Sessions without an action log or video are
/// skipped.
pub fn process_session(session_dir: &Path, config: &AnalyticsConfig, style_path: Option<&Path>) -> Result<()> {
    let paths = SessionPaths::new(session_dir);
    if !paths.has_inputs() {
        crate::log(&format!(
            "Skipping {}: actions.json or video.webm missing",
            session_dir.display()
        ));
        return Ok(());
    }

    let actions = export::load_actions(&paths.actions)?;
    let crop = export::determine_crop_rect(&actions, config.fallback_crop);
    let style = load_overlay_style(style_path);
    crate::log(&format!(
        "Overlay crop: left={} top={} width={} height={}, {} digits",
        crop.left, crop.top, crop.width, crop.height, style.digit_count
    ));

    // Templates, fonts and the OCR engine are checked before any frame work
    let decoder = DigitDecoder::build(config.decoder, config, &style, crop)?;

    let mut source = FfmpegFrameSource::open(&paths.video)?;
    let info = source.info();
    crate::log(&format!(
        "Decoding {} with {} ({} frames, {} fps, {}x{})",
        paths.video.display(),
        decoder.kind().label(),
        info.frame_count,
        info.fps.map_or_else(|| "unknown".to_string(), |fps| format!("{:.3}", fps)),
        info.width,
        info.height
    ));

    let plan = SessionPlan {
        paths,
        actions,
        crop,
        style,
        config,
    };
    analyze_session(&plan, &mut source, &decoder)
}

/// Decodes the video and writes every session output, in order: secondary
/// digit capture, per-frame text and table, check images, action screenshots
/// and the augmented action log.
pub fn analyze_session(plan: &SessionPlan, source: &mut dyn FrameSource, decoder: &DigitDecoder) -> Result<()> {
    let config = plan.config;
    let paths = &plan.paths;

    export::write_secondary_digit_capture(
        &plan.actions,
        source,
        &paths.digit_capture_image(),
        config.overlay_settle_delay_ms,
    )?;

    let timeline = build_timeline(source, &plan.crop, decoder)?;
    let schema = TableSchema {
        columns: config.report.confidence_columns,
        digit_count: plan.style.digit_count,
    };
    export::write_frame_ms_file(&timeline.results, &paths.frame_ms_file())?;
    export::write_frame_ms_table_file(&timeline.results, &paths.frame_ms_table(), schema)?;

    let check_frames = export::plan_check_frames(&timeline, config.report.check_interval);
    let offsets = ScreenshotOffsets {
        before_ms: config.before_offset_ms,
        after_ms: config.after_offset_ms,
    };
    let shots = export::plan_action_screenshots(&plan.actions, &timeline.results, offsets);

    let needed: BTreeSet<usize> = check_frames
        .iter()
        .copied()
        .chain(export::planned_frame_indices(&shots))
        .collect();
    let frames = FrameCache::collect(source, &needed)?;
    crate::log(&format!("Re-read {} frames for screenshots", frames.len()));

    export::write_number_check_outputs(
        &timeline,
        &check_frames,
        &frames,
        &plan.crop,
        &paths.check_dir(),
        schema,
    )?;
    let updated = export::capture_action_screenshots(&plan.actions, &shots, &frames, &paths.screenshots_dir())?;
    export::save_actions(&updated, &paths.augmented_actions())?;

    crate::log(&format!(
        "Wrote {} action screenshots to {}",
        updated.len() * 3,
        paths.screenshots_dir().display()
    ));
    Ok(())
}
