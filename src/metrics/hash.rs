use image::DynamicImage;

use crate::preprocess::{ensure_initialized, gray_resized, validate};
use crate::Result;

/// 64-bit difference hash.
///
/// The image is shrunk to 9x8 grayscale; bit `row * 8 + col` is set when a
/// pixel is brighter than its right-hand neighbour.
pub fn dhash64(image: &DynamicImage) -> Result<u64> {
    ensure_initialized();
    validate(image, "image")?;

    let small = gray_resized(image, 9, 8);
    let mut hash = 0u64;
    for y in 0..8 {
        for x in 0..8 {
            let left = small.get_pixel(x, y).0[0];
            let right = small.get_pixel(x + 1, y).0[0];
            if left > right {
                hash |= 1 << (y * 8 + x);
            }
        }
    }
    Ok(hash)
}

pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
