//! Camera RAW decoding.
//!
//! RAW files are never demosaiced in-process. The decoder walks a list of
//! strategies and keeps the first image any of them produces:
//!
//! 1. Embedded preview via exiftool (CR3 files carry several candidates)
//! 2. dcraw with auto-brightening
//! 3. dcraw with camera white balance only
//! 4. The EXIF IFD1 thumbnail, read in-process with kamadak-exif
//! 5. Direct decode with the `image` crate (works for some DNGs)

use super::external::{dcraw_develop, exiftool_preview};
use super::{DecoderConfig, ImageDecoder};
use crate::error::HashError;
use exif::{In, Reader, Tag};
use image::{DynamicImage, GrayImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Preview tags tried for Canon CR3, best quality first
const CR3_PREVIEW_TAGS: &[&str] = &[
    "LargePreviewImage",
    "PreviewImage",
    "OtherImage",
    "ThumbnailImage",
    "FullPreviewImage",
];

const DEFAULT_PREVIEW_TAGS: &[&str] = &["PreviewImage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Preview(&'static str),
    Dcraw { auto_bright: bool },
    ExifThumbnail,
    Direct,
}

pub struct RawDecoder {
    config: DecoderConfig,
}

impl RawDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    fn strategies(&self, path: &Path) -> Vec<Strategy> {
        let mut strategies = Vec::new();

        if self.config.external_tools {
            let is_cr3 = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("cr3"));
            let tags = if is_cr3 { CR3_PREVIEW_TAGS } else { DEFAULT_PREVIEW_TAGS };

            strategies.extend(tags.iter().copied().map(Strategy::Preview));
            strategies.push(Strategy::Dcraw { auto_bright: true });
            strategies.push(Strategy::Dcraw { auto_bright: false });
        }

        strategies.push(Strategy::ExifThumbnail);
        strategies.push(Strategy::Direct);
        strategies
    }

    fn run(&self, strategy: Strategy, path: &Path) -> Result<DynamicImage, HashError> {
        match strategy {
            Strategy::Preview(tag) => exiftool_preview(&self.config, path, tag),
            Strategy::Dcraw { auto_bright } => dcraw_develop(&self.config, path, auto_bright),
            Strategy::ExifThumbnail => exif_thumbnail(path),
            Strategy::Direct => image::open(path).map_err(|e| HashError::DecodeError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}

impl ImageDecoder for RawDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage, HashError> {
        let mut failures = Vec::new();

        for strategy in self.strategies(path) {
            match self.run(strategy, path) {
                Ok(image) if image.width() > 0 && image.height() > 0 => {
                    debug!("Decoded {} with {:?}", path.display(), strategy);
                    return Ok(image.to_luma8());
                }
                Ok(_) => failures.push(format!("{:?}: empty image", strategy)),
                Err(e) => {
                    debug!("RAW strategy {:?} failed for {}: {}", strategy, path.display(), e);
                    failures.push(format!("{:?}: {}", strategy, e));
                }
            }
        }

        Err(HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("all RAW strategies failed ({})", failures.join("; ")),
        })
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

/// Decode the JPEG thumbnail referenced from IFD1 of a TIFF-based RAW file
fn exif_thumbnail(path: &Path) -> Result<DynamicImage, HashError> {
    let decode_error = |reason: String| HashError::DecodeError {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| HashError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| decode_error(format!("no EXIF data: {}", e)))?;

    let field_u32 = |tag: Tag| {
        exif.get_field(tag, In::THUMBNAIL)
            .and_then(|f| f.value.get_uint(0))
            .ok_or_else(|| decode_error(format!("missing {}", tag)))
    };
    let offset = field_u32(Tag::JPEGInterchangeFormat)? as usize;
    let length = field_u32(Tag::JPEGInterchangeFormatLength)? as usize;

    let thumbnail = offset
        .checked_add(length)
        .and_then(|end| exif.buf().get(offset..end))
        .ok_or_else(|| decode_error("thumbnail lies outside the EXIF block".to_string()))?;

    image::load_from_memory(thumbnail).map_err(|e| decode_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline() -> RawDecoder {
        RawDecoder::new(DecoderConfig {
            external_tools: false,
            ..Default::default()
        })
    }

    #[test]
    fn cr3_tries_every_preview_tag_first() {
        let decoder = RawDecoder::new(DecoderConfig::default());
        let strategies = decoder.strategies(Path::new("/x/IMG_0001.CR3"));

        assert_eq!(strategies[0], Strategy::Preview("LargePreviewImage"));
        assert_eq!(strategies[4], Strategy::Preview("FullPreviewImage"));
        assert_eq!(strategies[5], Strategy::Dcraw { auto_bright: true });
        assert_eq!(strategies.last(), Some(&Strategy::Direct));
    }

    #[test]
    fn other_raws_use_single_preview_then_dcraw() {
        let decoder = RawDecoder::new(DecoderConfig::default());
        let strategies = decoder.strategies(Path::new("/x/DSC_0042.nef"));

        assert_eq!(
            strategies,
            vec![
                Strategy::Preview("PreviewImage"),
                Strategy::Dcraw { auto_bright: true },
                Strategy::Dcraw { auto_bright: false },
                Strategy::ExifThumbnail,
                Strategy::Direct,
            ]
        );
    }

    #[test]
    fn disabling_tools_leaves_in_process_strategies() {
        let strategies = offline().strategies(Path::new("a.cr2"));
        assert_eq!(strategies, vec![Strategy::ExifThumbnail, Strategy::Direct]);
    }

    #[test]
    fn unreadable_raw_reports_every_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.cr2");
        std::fs::write(&path, b"not a raw file").unwrap();

        match offline().decode(&path) {
            Err(HashError::DecodeError { reason, .. }) => {
                assert!(reason.contains("ExifThumbnail"));
                assert!(reason.contains("Direct"));
            }
            other => panic!("expected decode error, got {:?}", other.map(|i| i.dimensions())),
        }
    }
}
