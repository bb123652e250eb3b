//! Per-frame text/CSV reports and the "check" export.
//!
//! Absent values are written as the literal `None` for compatibility with
//! existing consumers of these files.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::{CheckInterval, ConfidenceColumns, CropRect};
use crate::decode::pad_metrics;
use crate::ocr::crop_rect;
use crate::timeline::{FrameDecodeResult, LookupMode, Timeline, find_frame_index};
use crate::video::FrameCache;

const ABSENT: &str = "None";

/// Name of the check table inside the check directory.
pub const CHECK_TABLE_NAME: &str = "screenshot_number_table.csv";

/// Column layout shared by the CSV reports.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub columns: ConfidenceColumns,
    pub digit_count: usize,
}

impl TableSchema {
    fn confidence_header(&self) -> Vec<String> {
        match self.columns {
            ConfidenceColumns::PerDigit => (1..=self.digit_count)
                .map(|i| format!("digit_{}_match", i))
                .collect(),
            ConfidenceColumns::Aggregate => vec!["confidence".to_string()],
        }
    }

    fn confidence_cells(&self, result: &FrameDecodeResult) -> Vec<String> {
        match self.columns {
            ConfidenceColumns::PerDigit => pad_metrics(&result.metrics, self.digit_count)
                .into_iter()
                .map(|m| m.map(|m| format!("{:.6}", m)).unwrap_or_default())
                .collect(),
            ConfidenceColumns::Aggregate => vec![format!("{:.6}", result.score)],
        }
    }
}

fn format_value(value: Option<u32>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| v.to_string())
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// One decoded value (or `None`) per line, in frame order.
pub fn write_frame_ms_file(results: &[FrameDecodeResult], path: &Path) -> Result<()> {
    let mut file = create_file(path)?;
    for result in results {
        writeln!(file, "{}", format_value(result.value))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    file.flush()?;
    Ok(())
}

/// `id,ocr_ms,<confidence columns>` with one row per frame.
pub fn write_frame_ms_table_file(results: &[FrameDecodeResult], path: &Path, schema: TableSchema) -> Result<()> {
    let mut file = create_file(path)?;
    let mut header = vec!["id".to_string(), "ocr_ms".to_string()];
    header.extend(schema.confidence_header());
    writeln!(file, "{}", header.join(","))?;

    for result in results {
        let mut row = vec![result.frame_index.to_string(), format_value(result.value)];
        row.extend(schema.confidence_cells(result));
        writeln!(file, "{}", row.join(","))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    file.flush()?;
    Ok(())
}

/// Frame indices sampled by the check export, one per row.
///
/// `FrameRateSeconds` takes the frame at each whole second of video (every
/// frame when the rate is unknown). `DecodedMillis` takes, for each 1000 ms
/// bucket up to the largest decoded value, the last frame at or before it.
pub fn plan_check_frames(timeline: &Timeline, interval: CheckInterval) -> Vec<usize> {
    if timeline.is_empty() {
        return Vec::new();
    }
    let available = timeline.len();

    match interval {
        CheckInterval::FrameRateSeconds => match timeline.fps {
            Some(fps) => {
                let max_second = ((available - 1) as f64 / fps).floor() as usize;
                (0..=max_second)
                    .map(|second| ((second as f64 * fps).round_ties_even() as usize).min(available - 1))
                    .collect()
            }
            None => (0..available).collect(),
        },
        CheckInterval::DecodedMillis => {
            let Some(max_value) = timeline.results.iter().filter_map(|r| r.value).max() else {
                return Vec::new();
            };
            (0..=max_value / 1000)
                .map(|bucket| {
                    find_frame_index(&timeline.results, i64::from(bucket) * 1000, LookupMode::AtOrBefore)
                })
                .collect()
        }
    }
}

/// Deletes `second_*.png` left over from an earlier run.
fn remove_stale_check_images(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let is_stale = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("second_") && n.ends_with(".png"));
        if is_stale {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Writes `second_NNNNNN.png` overlay crops and the matching table rows for
/// the planned frames. The directory is cleared of earlier check images
/// first, so the output always reflects this run.
pub fn write_number_check_outputs(
    timeline: &Timeline,
    planned: &[usize],
    frames: &FrameCache,
    crop: &CropRect,
    dir: &Path,
    schema: TableSchema,
) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    remove_stale_check_images(dir)?;

    let table_path = dir.join(CHECK_TABLE_NAME);
    let mut table = create_file(&table_path)?;
    let mut header = vec!["screenshot_name".to_string(), "id".to_string(), "ocr_ms".to_string()];
    header.extend(schema.confidence_header());
    writeln!(table, "{}", header.join(","))?;

    for (second, &frame_index) in planned.iter().enumerate() {
        let Some(result) = timeline.results.get(frame_index) else {
            continue;
        };
        let screenshot_name = format!("second_{:06}.png", second);
        match frames.get(frame_index) {
            Some(frame) => {
                let cropped = crop_rect(frame, crop);
                let image_path = dir.join(&screenshot_name);
                if cropped.width() == 0 || cropped.height() == 0 {
                    crate::log(&format!("Crop is outside frame {}, skipping {}", frame_index, screenshot_name));
                } else {
                    cropped
                        .save(&image_path)
                        .with_context(|| format!("Failed to save {}", image_path.display()))?;
                }
            }
            None => crate::log(&format!("No frame {} for {}", frame_index, screenshot_name)),
        }

        let mut row = vec![
            screenshot_name,
            result.frame_index.to_string(),
            format_value(result.value),
        ];
        row.extend(schema.confidence_cells(result));
        writeln!(table, "{}", row.join(","))
            .with_context(|| format!("Failed to write {}", table_path.display()))?;
    }
    table.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::memory::MemoryFrameSource;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn result(frame_index: usize, value: Option<u32>, metrics: Vec<Option<f32>>) -> FrameDecodeResult {
        FrameDecodeResult {
            frame_index,
            value,
            score: if value.is_some() { 0.75 } else { 0.0 },
            metrics,
        }
    }

    fn timeline_of(values: &[Option<u32>], fps: Option<f64>) -> Timeline {
        Timeline {
            results: values
                .iter()
                .enumerate()
                .map(|(i, v)| result(i, *v, Vec::new()))
                .collect(),
            fps,
        }
    }

    fn per_digit(digit_count: usize) -> TableSchema {
        TableSchema {
            columns: ConfidenceColumns::PerDigit,
            digit_count,
        }
    }

    #[test]
    fn test_frame_ms_file_uses_none_sentinel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics").join("ocr_ms_per_frame.txt");
        let results = vec![result(0, Some(1000), vec![]), result(1, None, vec![]), result(2, Some(0), vec![])];

        write_frame_ms_file(&results, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1000\nNone\n0\n");
    }

    #[test]
    fn test_frame_ms_table_per_digit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let results = vec![
            result(0, Some(12), vec![Some(1.0), Some(0.5), None]),
            result(1, None, vec![]),
        ];

        write_frame_ms_table_file(&results, &path, per_digit(2)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,ocr_ms,digit_1_match,digit_2_match");
        assert_eq!(lines[1], "0,12,1.000000,0.500000");
        assert_eq!(lines[2], "1,None,,");
    }

    #[test]
    fn test_frame_ms_table_aggregate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let results = vec![result(0, Some(12), vec![Some(1.0)]), result(1, None, vec![])];
        let schema = TableSchema {
            columns: ConfidenceColumns::Aggregate,
            digit_count: 6,
        };

        write_frame_ms_table_file(&results, &path, schema).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,ocr_ms,confidence\n0,12,0.750000\n1,None,0.000000\n");
    }

    #[test]
    fn test_plan_check_frames_by_frame_rate() {
        let timeline = timeline_of(&[None; 10], Some(4.0));
        // Seconds 0, 1, 2 at 4 fps
        assert_eq!(plan_check_frames(&timeline, CheckInterval::FrameRateSeconds), vec![0, 4, 8]);

        let fractional = timeline_of(&[None; 8], Some(2.5));
        assert_eq!(plan_check_frames(&fractional, CheckInterval::FrameRateSeconds), vec![0, 2, 5]);

        let unknown = timeline_of(&[None; 3], None);
        assert_eq!(plan_check_frames(&unknown, CheckInterval::FrameRateSeconds), vec![0, 1, 2]);

        let empty = timeline_of(&[], Some(30.0));
        assert!(plan_check_frames(&empty, CheckInterval::FrameRateSeconds).is_empty());
    }

    #[test]
    fn test_plan_check_frames_by_decoded_millis() {
        let timeline = timeline_of(&[Some(0), Some(600), None, Some(1200), Some(2100)], Some(30.0));
        assert_eq!(plan_check_frames(&timeline, CheckInterval::DecodedMillis), vec![0, 1, 3]);

        let blank = timeline_of(&[None, None], Some(30.0));
        assert!(plan_check_frames(&blank, CheckInterval::DecodedMillis).is_empty());
    }

    #[test]
    fn test_check_outputs_replace_stale_images() {
        let dir = tempdir().unwrap();
        let check_dir = dir.path().join("check_number_ocr");
        std::fs::create_dir_all(&check_dir).unwrap();
        std::fs::write(check_dir.join("second_000099.png"), b"stale").unwrap();
        std::fs::write(check_dir.join("notes.txt"), b"keep").unwrap();

        let timeline = timeline_of(&[Some(0), Some(500), Some(1000)], Some(2.0));
        let planned = plan_check_frames(&timeline, CheckInterval::FrameRateSeconds);
        let mut source = MemoryFrameSource::numbered(3, Some(2.0));
        let indices: BTreeSet<usize> = planned.iter().copied().collect();
        let frames = FrameCache::collect(&mut source, &indices).unwrap();
        let crop = CropRect { left: 1, top: 1, width: 2, height: 2 };

        write_number_check_outputs(&timeline, &planned, &frames, &crop, &check_dir, per_digit(1)).unwrap();

        assert!(!check_dir.join("second_000099.png").exists());
        assert!(check_dir.join("notes.txt").exists());
        let second = image::open(check_dir.join("second_000001.png")).unwrap().to_rgb8();
        assert_eq!(second.dimensions(), (2, 2));
        assert_eq!(second.get_pixel(0, 0)[0], 2);

        let table = std::fs::read_to_string(check_dir.join(CHECK_TABLE_NAME)).unwrap();
        assert_eq!(
            table,
            "screenshot_name,id,ocr_ms,digit_1_match\n\
             second_000000.png,0,0,\n\
             second_000001.png,2,1000,\n"
        );
    }

    #[test]
    fn test_check_outputs_empty_timeline_writes_header() {
        let dir = tempdir().unwrap();
        let timeline = timeline_of(&[], None);
        let frames = FrameCache::default();

        write_number_check_outputs(&timeline, &[], &frames, &CropRect::default(), dir.path(), per_digit(2))
            .unwrap();
        let table = std::fs::read_to_string(dir.path().join(CHECK_TABLE_NAME)).unwrap();
        assert_eq!(table, "screenshot_name,id,ocr_ms,digit_1_match,digit_2_match\n");
    }
}
