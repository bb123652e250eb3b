use anyhow::Result;
use image::RgbImage;
use std::collections::{BTreeMap, BTreeSet};

/// A sequential reader over decoded video frames.
pub trait FrameSource {
    /// Frames per second, or `None` when the container reports a non-finite or
    /// non-positive rate.
    fn fps(&self) -> Option<f64>;

    /// Total frame count reported by the container (0 when unknown).
    fn frame_count(&self) -> usize;

    /// Reads the next frame. `Ok(None)` marks the end of the stream.
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// Repositions the reader so the next `read` returns `frame_index`.
    fn seek(&mut self, frame_index: usize) -> Result<()>;
}

/// Normalizes a container frame rate.
pub fn sanitize_fps(fps: f64) -> Option<f64> {
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Frames retained for export, addressed by frame index.
#[derive(Debug, Default)]
pub struct FrameCache {
    frames: BTreeMap<usize, RgbImage>,
}

impl FrameCache {
    /// Reads the source from the first frame and keeps only `indices`.
    ///
    /// Stops at the highest requested index or at the end of the stream,
    /// whichever comes first.
    pub fn collect(source: &mut dyn FrameSource, indices: &BTreeSet<usize>) -> Result<Self> {
        let mut frames = BTreeMap::new();
        let Some(&last) = indices.last() else {
            return Ok(Self { frames });
        };

        source.seek(0)?;
        for frame_index in 0..=last {
            let Some(frame) = source.read()? else {
                break;
            };
            if indices.contains(&frame_index) {
                frames.insert(frame_index, frame);
            }
        }

        Ok(Self { frames })
    }

    pub fn get(&self, frame_index: usize) -> Option<&RgbImage> {
        self.frames.get(&frame_index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Maps a millisecond offset to a frame index using the container frame rate.
pub fn frame_index_at_ms(fps: Option<f64>, frame_count: usize, target_ms: i64) -> usize {
    let requested = match fps {
        Some(fps) => ((target_ms.max(0) as f64 / 1000.0) * fps).round_ties_even() as usize,
        None => 0,
    };
    requested.min(frame_count.max(1) - 1)
}

/// Reads the frame shown at `target_ms`, or `None` if the source ends first.
pub fn read_frame_at_ms(source: &mut dyn FrameSource, target_ms: i64) -> Result<Option<RgbImage>> {
    let frame_index = frame_index_at_ms(source.fps(), source.frame_count(), target_ms);
    source.seek(frame_index)?;
    source.read()
}
