//! Shared fixtures for integration tests.
//!
//! Every fixture file holds PNG bytes whatever its extension, so RAW and
//! TIFF paths can be exercised without real camera files.

#![allow(dead_code)]

use image::{GrayImage, ImageFormat, ImageReader, Luma};
use image_finder::core::decoder::{DecoderRegistry, ImageDecoder};
use image_finder::core::format::FormatCategory;
use image_finder::error::HashError;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 32x32, left half black, right half at 150
pub fn query_image() -> GrayImage {
    shifted(0)
}

/// The query image brightened by `k`; pixel similarity to it is `1 - k/255`
pub fn shifted(k: u8) -> GrayImage {
    GrayImage::from_fn(32, 32, |x, _| Luma([if x < 16 { k } else { 150 + k }]))
}

pub fn write_image(path: &Path, image: &GrayImage) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    std::fs::write(path, bytes.into_inner()).unwrap();
}

/// Decodes fixture files by sniffing their content
pub struct SniffingDecoder;

impl ImageDecoder for SniffingDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError> {
        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| HashError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?;
        reader
            .decode()
            .map(|image| image.to_luma8())
            .map_err(|e| HashError::DecodeError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "sniffing"
    }
}

/// Counts decodes before delegating
pub struct CountingDecoder {
    pub calls: Arc<AtomicUsize>,
}

impl ImageDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SniffingDecoder.decode(path)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Sleeps while decoding and records the peak number of concurrent decodes
pub struct SlowDecoder {
    pub delay: Duration,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl ImageDecoder for SlowDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        let result = SniffingDecoder.decode(path);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Panics on every file
pub struct PanickingDecoder;

impl ImageDecoder for PanickingDecoder {
    fn decode(&self, _path: &Path) -> Result<GrayImage, HashError> {
        panic!("decoder bug");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// The same decoder for standard, RAW and TIFF files
pub fn registry(decoder: Arc<dyn ImageDecoder>) -> DecoderRegistry {
    DecoderRegistry::new()
        .register(FormatCategory::Standard, decoder.clone())
        .register(FormatCategory::Raw, decoder.clone())
        .register(FormatCategory::Tiff, decoder)
}

pub fn sniffing_registry() -> DecoderRegistry {
    registry(Arc::new(SniffingDecoder))
}
