//! Average Hash (aHash).
//!
//! 1. Resize the grayscale image to 8x8
//! 2. Compute the mean intensity of the 64 samples
//! 3. Emit bit 1 for every sample at or above the mean
//!
//! Fast and coarse; used as the first of the two prefilter distances.

use super::resize::GrayResizer;
use super::{pack_bits, HASH_SIDE};
use crate::error::HashError;
use image::GrayImage;

pub fn compute_average_hash(image: &GrayImage) -> Result<String, HashError> {
    average_hash_with(&mut GrayResizer::new(), image)
}

pub(crate) fn average_hash_with(
    resizer: &mut GrayResizer,
    image: &GrayImage,
) -> Result<String, HashError> {
    let small = resizer.resize(image, HASH_SIDE, HASH_SIDE)?;

    let samples = small.as_raw();
    let mean = samples.iter().map(|&p| p as f64).sum::<f64>() / samples.len() as f64;

    Ok(pack_bits(samples.iter().map(|&p| p as f64 >= mean)))
}
