//! Bit-grid overlay decoding.
//!
//! The recorder can render elapsed milliseconds as a 5x5 grid of dark/light
//! cells read row-major: 20 payload bits followed by the low 5 bits of a
//! CRC-32 over the payload's three big-endian bytes. A frame either decodes
//! exactly or is rejected.

use image::RgbImage;

use super::segment::to_gray;
use super::{DecodeOutcome, normalize_similarity};

pub const GRID_SIZE: u32 = 5;
pub const DATA_BITS: u32 = 20;
pub const CRC_BITS: u32 = 5;
pub const TOTAL_BITS: usize = (DATA_BITS + CRC_BITS) as usize;

const DARK_CELL_THRESHOLD: f32 = 0.5;

/// Standard reflected CRC-32 (polynomial 0xEDB88320).
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    crc ^ 0xFFFF_FFFF
}

/// Checksum bits expected for a 20-bit payload.
pub fn payload_checksum(elapsed_ms: u32) -> u32 {
    let bytes = [
        ((elapsed_ms >> 16) & 0xFF) as u8,
        ((elapsed_ms >> 8) & 0xFF) as u8,
        (elapsed_ms & 0xFF) as u8,
    ];
    crc32(&bytes) & ((1 << CRC_BITS) - 1)
}

/// Validates a row-major bit sequence and returns the payload.
pub fn decode_bits(bits: &[bool]) -> Option<u32> {
    if bits.len() < TOTAL_BITS {
        return None;
    }
    let word = bits[..TOTAL_BITS]
        .iter()
        .fold(0u32, |acc, &bit| (acc << 1) | bit as u32);

    let received_crc = word & ((1 << CRC_BITS) - 1);
    let elapsed_ms = word >> CRC_BITS;
    if elapsed_ms > (1 << DATA_BITS) - 1 {
        return None;
    }
    (received_crc == payload_checksum(elapsed_ms)).then_some(elapsed_ms)
}

/// Cell boundary along one axis, rounded to the nearest pixel.
fn grid_bound(index: u32, length: u32) -> u32 {
    (index as f64 * length as f64 / GRID_SIZE as f64).round() as u32
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BitGridDecoder;

impl BitGridDecoder {
    /// Reads the grid. Metrics are the 25 per-cell darkness values.
    pub fn decode(&self, roi: &RgbImage) -> DecodeOutcome {
        let gray = to_gray(roi);
        let (width, height) = gray.dimensions();
        if width < GRID_SIZE || height < GRID_SIZE {
            return DecodeOutcome::absent(0);
        }

        let mut bits = Vec::with_capacity(TOTAL_BITS);
        let mut metrics = Vec::with_capacity(TOTAL_BITS);
        for row in 0..GRID_SIZE {
            let (y0, y1) = (grid_bound(row, height), grid_bound(row + 1, height));
            for col in 0..GRID_SIZE {
                let (x0, x1) = (grid_bound(col, width), grid_bound(col + 1, width));
                let count = (x1 - x0) as u64 * (y1 - y0) as u64;
                if count == 0 {
                    metrics.push(Some(0.0));
                    bits.push(false);
                    continue;
                }

                let sum: u64 = (y0..y1)
                    .flat_map(|y| (x0..x1).map(move |x| (x, y)))
                    .map(|(x, y)| gray.get_pixel(x, y)[0] as u64)
                    .sum();
                let darkness = normalize_similarity(1.0 - (sum as f32 / count as f32) / 255.0);
                metrics.push(Some(darkness));
                bits.push(darkness >= DARK_CELL_THRESHOLD);
            }
        }

        let value = decode_bits(&bits);
        let score = if value.is_some() { 1.0 } else { 0.0 };
        DecodeOutcome {
            value,
            score,
            metrics,
        }
    }
}
