//! # Fingerprint Module
//!
//! Turns a decoded grayscale image into the two 64-bit hashes stored in the
//! index, and measures how close two images or two hashes are.
//!
//! ## Hashes
//! | Hash | Grid | Threshold |
//! |------|------|-----------|
//! | average | 8x8 pixels | mean intensity |
//! | perceptual | 8x8 low DCT coefficients of a 32x32 grid | median coefficient |
//!
//! Both are packed MSB-first in row-major order and written as 16
//! lowercase hex characters.

mod average;
mod dct;
mod perceptual;
mod resize;
mod similarity;

pub use average::compute_average_hash;
pub use perceptual::compute_perceptual_hash;
pub use resize::{resize_gray, GrayResizer};
pub use similarity::{hamming_distance, pixel_similarity};

use crate::error::HashError;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Side of the 8x8 bit grid both hashes are built from
pub const HASH_SIDE: u32 = 8;

/// Number of bits in each hash, also the largest possible distance
pub const HASH_BITS: u32 = HASH_SIDE * HASH_SIDE;

/// The pair of hashes stored per image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub average_hash: String,
    pub perceptual_hash: String,
}

impl Fingerprint {
    /// Hamming distances (average, perceptual) to another pair of hashes
    pub fn distances(&self, average_hash: &str, perceptual_hash: &str) -> (u32, u32) {
        (
            hamming_distance(&self.average_hash, average_hash),
            hamming_distance(&self.perceptual_hash, perceptual_hash),
        )
    }
}

/// Compute both hashes, sharing one resizer
pub fn compute_fingerprint(image: &GrayImage) -> Result<Fingerprint, HashError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(HashError::EmptyImage {
            path: PathBuf::new(),
        });
    }

    let mut resizer = GrayResizer::new();
    Ok(Fingerprint {
        average_hash: average::average_hash_with(&mut resizer, image)?,
        perceptual_hash: perceptual::perceptual_hash_with(&mut resizer, image)?,
    })
}

/// Pack bits MSB-first into lowercase hex, four bits per digit
fn pack_bits(bits: impl Iterator<Item = bool>) -> String {
    let mut hex = String::with_capacity((HASH_BITS / 4) as usize);
    let mut nibble = 0u32;
    let mut filled = 0;

    for bit in bits {
        nibble = (nibble << 1) | u32::from(bit);
        filled += 1;
        if filled == 4 {
            hex.push(char::from_digit(nibble, 16).unwrap_or('0'));
            nibble = 0;
            filled = 0;
        }
    }
    if filled > 0 {
        hex.push(char::from_digit(nibble << (4 - filled), 16).unwrap_or('0'));
    }

    hex
}
