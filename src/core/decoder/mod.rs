//! # Decoder Module
//!
//! Turns image files into 8-bit grayscale buffers for fingerprinting.
//!
//! ## Registry
//! Decoders are looked up per `FormatCategory` in a `DecoderRegistry` that
//! is built once and handed to the scan pipeline and search engine. Tests
//! swap entries with `register`.
//!
//! ## Default decoders
//! - `StandardDecoder` - zune-jpeg fast path, `image` crate fallback, HEIC via sips on macOS
//! - `RawDecoder` - embedded previews, dcraw, EXIF thumbnail, direct decode
//! - `TiffDecoder` - direct decode, then embedded previews

mod bytes;
mod external;
mod raw;
mod standard;
mod tiff;

pub use bytes::{read_file_bytes, FileBytes};
pub use raw::RawDecoder;
pub use standard::StandardDecoder;
pub use tiff::TiffDecoder;

use crate::core::format::FormatCategory;
use crate::error::HashError;
use image::GrayImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decodes one class of image files into grayscale
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Settings shared by the default decoders
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// exiftool executable
    pub exiftool: String,
    /// dcraw executable
    pub dcraw: String,
    /// Allow spawning external converters at all
    pub external_tools: bool,
    /// Where converter output is written (system temp dir when None)
    pub temp_dir: Option<PathBuf>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            exiftool: "exiftool".to_string(),
            dcraw: "dcraw".to_string(),
            external_tools: true,
            temp_dir: None,
        }
    }
}

/// Mapping from format category to decoder
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<FormatCategory, Arc<dyn ImageDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry; every decode fails until decoders are registered
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard, RAW and TIFF decoders
    pub fn with_defaults(config: &DecoderConfig) -> Self {
        Self::new()
            .register(FormatCategory::Standard, Arc::new(StandardDecoder::new(config.clone())))
            .register(FormatCategory::Raw, Arc::new(RawDecoder::new(config.clone())))
            .register(FormatCategory::Tiff, Arc::new(TiffDecoder::new(config.clone())))
    }

    /// Set the decoder for a category, replacing any previous one
    pub fn register(mut self, category: FormatCategory, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoders.insert(category, decoder);
        self
    }

    pub fn decoder_for(&self, category: FormatCategory) -> Option<&Arc<dyn ImageDecoder>> {
        self.decoders.get(&category)
    }

    /// Decode `path` with the decoder for `category`.
    ///
    /// Zero-sized results are reported as `HashError::EmptyImage`.
    pub fn decode(&self, path: &Path, category: FormatCategory) -> Result<GrayImage, HashError> {
        let decoder = self
            .decoder_for(category)
            .ok_or_else(|| HashError::UnsupportedFormat {
                format: category.to_string(),
            })?;

        let image = decoder.decode(path)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        Ok(image)
    }
}
