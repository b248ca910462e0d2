//! Coarse color comparison for estimating how many colors artwork really
//! uses. This is unrelated to tile identity, which is always exact.

use std::collections::HashSet;

use image::RgbaImage;

pub const DEFAULT_COLOR_THRESHOLD: u8 = 4;

/// Buckets each channel by `threshold + 1`
pub fn quantize_color([r, g, b]: [u8; 3], threshold: u8) -> [u8; 3] {
    let factor = threshold as u16 + 1;
    return [r, g, b].map(|c| (c as u16 / factor) as u8);
}

/// The distinct RGB buckets of `image`, alpha ignored
pub fn unique_colors(image: &RgbaImage, threshold: u8) -> HashSet<[u8; 3]> {
    return image
        .pixels()
        .map(|p| {
            let [r, g, b, _] = p.0;
            quantize_color([r, g, b], threshold)
        })
        .collect();
}
