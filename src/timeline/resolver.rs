use anyhow::{Result, bail};
use std::str::FromStr;

use super::FrameDecodeResult;

/// Direction in which a target time is matched against decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Last frame whose value is <= target, else the first decoded frame
    AtOrBefore,
    /// First frame whose value is >= target, else the last decoded frame
    AtOrAfter,
}

impl FromStr for LookupMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "at_or_before" => Ok(LookupMode::AtOrBefore),
            "at_or_after" => Ok(LookupMode::AtOrAfter),
            other => bail!("Unsupported lookup mode: {}", other),
        }
    }
}

/// Picks the frame whose decoded overlay value best matches `target_ms`.
///
/// Only frames with a value take part, in frame order; values need not be
/// monotonic. Returns 0 when no frame has a value.
pub fn find_frame_index(results: &[FrameDecodeResult], target_ms: i64, mode: LookupMode) -> usize {
    let mut decoded = results
        .iter()
        .filter_map(|r| r.value.map(|value| (r.frame_index, i64::from(value))));

    let Some((first_index, _)) = decoded.clone().next() else {
        return 0;
    };

    match mode {
        LookupMode::AtOrBefore => decoded
            .filter(|&(_, value)| value <= target_ms)
            .last()
            .map_or(first_index, |(index, _)| index),
        LookupMode::AtOrAfter => {
            let mut last_index = first_index;
            for (index, value) in decoded.by_ref() {
                if value >= target_ms {
                    return index;
                }
                last_index = index;
            }
            last_index
        }
    }
}
