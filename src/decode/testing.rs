//! Bitmap digit fixtures shared by decoder tests.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// 3x5 digit font, one string per row.
const FONT_3X5: [[&str; 5]; 10] = [
    ["###", "#.#", "#.#", "#.#", "###"],
    [".#.", "##.", ".#.", ".#.", "###"],
    ["###", "..#", "###", "#..", "###"],
    ["###", "..#", ".##", "..#", "###"],
    ["#.#", "#.#", "###", "..#", "..#"],
    ["###", "#..", "###", "..#", "###"],
    ["###", "#..", "###", "#.#", "###"],
    ["###", "..#", "..#", ".#.", ".#."],
    ["###", "#.#", "###", "#.#", "###"],
    ["###", "#.#", "###", "..#", "###"],
];

pub const FG: u8 = 230;
pub const BG: u8 = 20;

fn lit(digit: usize, x: u32, y: u32, scale: u32) -> bool {
    let row = FONT_3X5[digit][(y / scale) as usize].as_bytes();
    row[(x / scale) as usize] == b'#'
}

/// A tight `3*scale x 5*scale` glyph, bright on dark.
pub fn glyph(digit: usize, scale: u32) -> GrayImage {
    GrayImage::from_fn(3 * scale, 5 * scale, |x, y| {
        Luma([if lit(digit, x, y, scale) { FG } else { BG }])
    })
}

/// Renders `digits` left to right, each glyph at `scale`, centered in a cell
/// of `cell_width` pixels, with `margin` pixels above and below.
pub fn overlay(digits: &str, scale: u32, cell_width: u32, margin: u32) -> RgbImage {
    let glyph_width = 3 * scale;
    let height = 5 * scale + 2 * margin;
    let offset = (cell_width - glyph_width) / 2;
    let digits: Vec<usize> = digits.bytes().map(|b| (b - b'0') as usize).collect();

    RgbImage::from_fn(cell_width * digits.len() as u32, height, |x, y| {
        let cell = (x / cell_width) as usize;
        let gx = x % cell_width;
        let on = y >= margin
            && y < margin + 5 * scale
            && gx >= offset
            && gx < offset + glyph_width
            && lit(digits[cell], gx - offset, y - margin, scale);
        let v = if on { FG } else { BG };
        Rgb([v, v, v])
    })
}
