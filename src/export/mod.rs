//! Session outputs: screenshots, per-frame reports, check images and the
//! augmented action log.

pub mod actions;
pub mod digits;
pub mod report;
pub mod screenshots;

pub use actions::{Action, determine_crop_rect, load_actions, save_actions};
pub use digits::write_secondary_digit_capture;
pub use report::{
    TableSchema, plan_check_frames, write_frame_ms_file, write_frame_ms_table_file,
    write_number_check_outputs,
};
pub use screenshots::{
    ScreenshotOffsets, capture_action_screenshots, plan_action_screenshots, planned_frame_indices,
};
