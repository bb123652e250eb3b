//! Video frame access.
//!
//! Frames are decoded by an external ffmpeg process and handed out one at a
//! time. Screenshot export re-reads the frames it needs instead of keeping the
//! whole video resident.

pub mod ffmpeg;
#[cfg(test)]
pub mod memory;
pub mod source;

pub use ffmpeg::FfmpegFrameSource;
pub use source::{FrameCache, FrameSource, read_frame_at_ms};
