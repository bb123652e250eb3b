//! In-memory frame source used by tests.

use anyhow::Result;
use image::{Rgb, RgbImage};

use super::source::{FrameSource, sanitize_fps};

pub struct MemoryFrameSource {
    frames: Vec<RgbImage>,
    fps: Option<f64>,
    reported_count: usize,
    position: usize,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<RgbImage>, fps: Option<f64>) -> Self {
        let reported_count = frames.len();
        Self {
            frames,
            fps: fps.and_then(sanitize_fps),
            reported_count,
            position: 0,
        }
    }

    /// `count` 4x4 frames whose red channel equals the frame index.
    pub fn numbered(count: usize, fps: Option<f64>) -> Self {
        let frames = (0..count)
            .map(|i| RgbImage::from_pixel(4, 4, Rgb([i as u8, 0, 0])))
            .collect();
        Self::new(frames, fps)
    }

    /// Overrides the frame count the source claims to have.
    pub fn with_reported_count(mut self, reported_count: usize) -> Self {
        self.reported_count = reported_count;
        self
    }
}

impl FrameSource for MemoryFrameSource {
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn frame_count(&self) -> usize {
        self.reported_count
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn seek(&mut self, frame_index: usize) -> Result<()> {
        self.position = frame_index;
        Ok(())
    }
}
