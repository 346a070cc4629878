//! Distance and similarity measures between fingerprints and images.

use super::resize::GrayResizer;
use image::GrayImage;
use std::borrow::Cow;
use tracing::debug;

/// Number of differing bits between two hex hashes.
///
/// Compared position by position over the shorter string. Hex digits are
/// compared bitwise; any non-hex character counts as one difference when it
/// does not match.
pub fn hamming_distance(a: &str, b: &str) -> u32 {
    a.chars()
        .zip(b.chars())
        .map(|(x, y)| match (x.to_digit(16), y.to_digit(16)) {
            (Some(x), Some(y)) => (x ^ y).count_ones(),
            _ => u32::from(x != y),
        })
        .sum()
}

/// Pixel-level similarity in `[0, 1]`, 1 meaning identical.
///
/// `second` is resized to the dimensions of `first`, then the score is
/// `1 - mean(|a - b|) / 255`. Empty inputs score 0 instead of failing.
pub fn pixel_similarity(first: &GrayImage, second: &GrayImage) -> f64 {
    pixel_similarity_with(&mut GrayResizer::new(), first, second)
}

pub(crate) fn pixel_similarity_with(
    resizer: &mut GrayResizer,
    first: &GrayImage,
    second: &GrayImage,
) -> f64 {
    let (width, height) = first.dimensions();
    if width == 0 || height == 0 || second.width() == 0 || second.height() == 0 {
        return 0.0;
    }

    let second: Cow<'_, GrayImage> = if second.dimensions() == (width, height) {
        Cow::Borrowed(second)
    } else {
        match resizer.resize(second, width, height) {
            Ok(resized) => Cow::Owned(resized),
            Err(e) => {
                debug!("Similarity resize failed: {}", e);
                return 0.0;
            }
        }
    };

    let total: u64 = first
        .as_raw()
        .iter()
        .zip(second.as_raw())
        .map(|(&a, &b)| a.abs_diff(b) as u64)
        .sum();
    let mean_diff = total as f64 / (width as f64 * height as f64);

    (1.0 - mean_diff / 255.0).clamp(0.0, 1.0)
}
