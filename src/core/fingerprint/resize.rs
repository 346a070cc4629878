//! Fast SIMD-accelerated grayscale resizing.
//!
//! Uses fast_image_resize, which picks AVX2/NEON paths when available.

use crate::error::HashError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::GrayImage;
use std::path::PathBuf;

/// Reusable resizer for 8-bit luma buffers
pub struct GrayResizer {
    resizer: Resizer,
}

impl GrayResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Resize `image` to exactly `width` x `height`.
    ///
    /// Returns a copy when the image already has the requested size.
    pub fn resize(
        &mut self,
        image: &GrayImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, HashError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage {
                path: PathBuf::new(),
            });
        }
        if width == 0 || height == 0 {
            return Err(HashError::ComputationFailed(format!(
                "invalid target size {}x{}",
                width, height
            )));
        }
        if image.dimensions() == (width, height) {
            return Ok(image.clone());
        }

        let src = Image::from_vec_u8(
            image.width(),
            image.height(),
            image.as_raw().to_vec(),
            PixelType::U8,
        )
        .map_err(|e| HashError::ComputationFailed(format!("invalid source buffer: {}", e)))?;

        let mut dst = Image::new(width, height, PixelType::U8);

        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
        self.resizer
            .resize(&src, &mut dst, &options)
            .map_err(|e| HashError::ComputationFailed(format!("resize failed: {}", e)))?;

        GrayImage::from_raw(width, height, dst.into_vec()).ok_or_else(|| {
            HashError::ComputationFailed("resized buffer has the wrong length".to_string())
        })
    }
}

impl Default for GrayResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-off resize with a fresh resizer
pub fn resize_gray(image: &GrayImage, width: u32, height: u32) -> Result<GrayImage, HashError> {
    GrayResizer::new().resize(image, width, height)
}
