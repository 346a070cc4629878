//! Decoder for everyday formats (JPEG, PNG, GIF, BMP, WebP, HEIC).

use super::bytes::read_file_bytes;
use super::{DecoderConfig, ImageDecoder};
use crate::error::HashError;
use image::GrayImage;
use std::path::Path;
use tracing::debug;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Decodes standard formats straight to luma
pub struct StandardDecoder {
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    config: DecoderConfig,
}

impl StandardDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// JPEG via zune-jpeg, asking it for the luma plane directly
    fn decode_jpeg(&self, path: &Path) -> Result<GrayImage, HashError> {
        let bytes = read_file_bytes(path)?;

        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::Luma);
        let mut decoder = JpegDecoder::new_with_options(&bytes[..], options);

        let pixels = decoder.decode().map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: "JPEG header missing".to_string(),
        })?;

        if decoder.get_output_colorspace() != Some(ColorSpace::Luma) {
            return Err(HashError::DecodeError {
                path: path.to_path_buf(),
                reason: "zune-jpeg did not produce luma output".to_string(),
            });
        }

        GrayImage::from_raw(info.width as u32, info.height as u32, pixels).ok_or_else(|| {
            HashError::DecodeError {
                path: path.to_path_buf(),
                reason: "JPEG buffer does not match its dimensions".to_string(),
            }
        })
    }

    /// HEIC through macOS `sips`, converted into a scoped temp JPEG
    #[cfg(target_os = "macos")]
    fn decode_heic(&self, path: &Path) -> Result<GrayImage, HashError> {
        let converted = super::external::scratch_file(&self.config, ".jpg")?;

        let output = std::process::Command::new("sips")
            .args(["-s", "format", "jpeg"])
            .arg(path)
            .arg("--out")
            .arg(converted.path())
            .output()
            .map_err(|e| HashError::DecodeError {
                path: path.to_path_buf(),
                reason: format!("Failed to run sips: {}", e),
            })?;

        if !output.status.success() {
            return Err(HashError::DecodeError {
                path: path.to_path_buf(),
                reason: format!(
                    "sips conversion failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        super::external::open_guessing_format(converted.path(), path).map(|img| img.to_luma8())
    }

    #[cfg(not(target_os = "macos"))]
    fn decode_heic(&self, path: &Path) -> Result<GrayImage, HashError> {
        Err(HashError::DecodeError {
            path: path.to_path_buf(),
            reason: "HEIC decoding is only supported on macOS".to_string(),
        })
    }

    fn decode_fallback(&self, path: &Path) -> Result<GrayImage, HashError> {
        image::open(path)
            .map(|img| img.to_luma8())
            .map_err(|e| HashError::DecodeError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl ImageDecoder for StandardDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let fast = match ext.as_str() {
            "jpg" | "jpeg" => Some(self.decode_jpeg(path)),
            "heic" | "heif" => Some(self.decode_heic(path)),
            _ => None,
        };

        match fast {
            Some(Ok(image)) => Ok(image),
            Some(Err(e)) => {
                debug!("Fast path failed for {}, falling back: {}", path.display(), e);
                self.decode_fallback(path)
            }
            None => self.decode_fallback(path),
        }
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}
