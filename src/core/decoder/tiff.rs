//! TIFF decoding with preview fallbacks for files the `image` crate rejects
//! (unusual compression, layered scans).

use super::external::exiftool_preview;
use super::{DecoderConfig, ImageDecoder};
use crate::error::HashError;
use image::GrayImage;
use std::path::Path;
use tracing::debug;

const PREVIEW_TAGS: &[&str] = &["PreviewImage", "ThumbnailImage"];

pub struct TiffDecoder {
    config: DecoderConfig,
}

impl TiffDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }
}

impl ImageDecoder for TiffDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError> {
        let direct = image::open(path).map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        });

        let error = match direct {
            Ok(image) => return Ok(image.to_luma8()),
            Err(e) => e,
        };

        if !self.config.external_tools {
            return Err(error);
        }
        debug!("Direct TIFF decode failed for {}: {}", path.display(), error);

        for tag in PREVIEW_TAGS {
            match exiftool_preview(&self.config, path, tag) {
                Ok(image) => return Ok(image.to_luma8()),
                Err(e) => debug!("TIFF {} extraction failed: {}", tag, e),
            }
        }

        Err(error)
    }

    fn name(&self) -> &'static str {
        "tiff"
    }
}
