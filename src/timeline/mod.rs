//! Per-frame overlay timeline.

pub mod resolver;

use anyhow::Result;

use crate::config::CropRect;
use crate::decode::DigitDecoder;
use crate::ocr::crop_rect;
use crate::video::FrameSource;

pub use resolver::{LookupMode, find_frame_index};

/// How often the decode pass reports progress.
pub const PROGRESS_EVERY_FRAMES: usize = 500;

/// Decoding result for one video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDecodeResult {
    pub frame_index: usize,
    /// Elapsed milliseconds shown by the overlay, if it could be read
    pub value: Option<u32>,
    pub score: f32,
    pub metrics: Vec<Option<f32>>,
}

/// Decoded overlay values for every frame that could be read, in frame order.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub results: Vec<FrameDecodeResult>,
    pub fps: Option<f64>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of frames with a decoded value.
    pub fn decoded_count(&self) -> usize {
        self.results.iter().filter(|r| r.value.is_some()).count()
    }
}

/// Decodes the overlay in every frame of `source`, starting from frame 0.
///
/// Reads until the stream ends or the reported frame count is reached (an
/// unknown count reads to the end). A source that ends early produces a
/// shorter timeline. Undecodable frames are recorded with `value: None`.
pub fn build_timeline(
    source: &mut dyn FrameSource,
    crop: &CropRect,
    decoder: &DigitDecoder,
) -> Result<Timeline> {
    let frame_limit = match source.frame_count() {
        0 => usize::MAX,
        n => n,
    };
    let mut results = Vec::with_capacity(source.frame_count());

    source.seek(0)?;
    while results.len() < frame_limit {
        let Some(frame) = source.read()? else {
            break;
        };
        let frame_index = results.len();
        let outcome = decoder.decode(&crop_rect(&frame, crop));
        results.push(FrameDecodeResult {
            frame_index,
            value: outcome.value,
            score: outcome.score,
            metrics: outcome.metrics,
        });

        if (frame_index + 1) % PROGRESS_EVERY_FRAMES == 0 {
            crate::log(&format!("Decoded {} frames", frame_index + 1));
        }
    }

    let timeline = Timeline {
        results,
        fps: source.fps(),
    };
    crate::log(&format!(
        "{}: decoded {}/{} frames",
        decoder.kind().label(),
        timeline.decoded_count(),
        timeline.len()
    ));
    Ok(timeline)
}
