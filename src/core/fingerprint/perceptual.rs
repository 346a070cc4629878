//! Perceptual Hash (pHash).
//!
//! 1. Resize the grayscale image to 32x32
//! 2. Run a 2-D DCT-II and keep the 8x8 lowest frequencies
//! 3. Emit bit 1 for every coefficient at or above their median
//!
//! Thresholding at the median keeps the hash stable under uniform
//! brightness shifts, which only move the DC coefficient.

use super::dct::dct2_low_frequency;
use super::resize::GrayResizer;
use super::{pack_bits, HASH_SIDE};
use crate::error::HashError;
use image::GrayImage;

/// Side of the grid the DCT runs on
pub const DCT_SIDE: u32 = 32;

pub fn compute_perceptual_hash(image: &GrayImage) -> Result<String, HashError> {
    perceptual_hash_with(&mut GrayResizer::new(), image)
}

pub(crate) fn perceptual_hash_with(
    resizer: &mut GrayResizer,
    image: &GrayImage,
) -> Result<String, HashError> {
    let small = resizer.resize(image, DCT_SIDE, DCT_SIDE)?;
    let matrix: Vec<f64> = small.as_raw().iter().map(|&p| p as f64).collect();

    let coefficients = dct2_low_frequency(&matrix, DCT_SIDE as usize, HASH_SIDE as usize);
    let median = median(&coefficients);

    Ok(pack_bits(coefficients.iter().map(|&c| c >= median)))
}

/// Median, averaging the two middle values for even lengths
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Deterministic noise so no two coefficients tie
    fn noise(width: u32, height: u32, offset: u8) -> GrayImage {
        let mut state: u32 = 12345;
        GrayImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            Luma([((state >> 16) % 200) as u8 + offset])
        })
    }

    #[test]
    fn median_of_even_and_odd_lengths() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn hash_is_64_bits_of_hex() {
        let hash = compute_perceptual_hash(&noise(300, 200, 0)).unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn half_the_bits_are_set() {
        let hash = compute_perceptual_hash(&noise(32, 32, 0)).unwrap();
        let ones: u32 = hash
            .chars()
            .map(|c| c.to_digit(16).unwrap().count_ones())
            .sum();
        assert_eq!(ones, 32);
    }

    #[test]
    fn brightness_shift_does_not_change_hash() {
        let base = compute_perceptual_hash(&noise(32, 32, 0)).unwrap();
        let brighter = compute_perceptual_hash(&noise(32, 32, 40)).unwrap();
        assert_eq!(base, brighter);
    }
}
