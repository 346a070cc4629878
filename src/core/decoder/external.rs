//! Helpers for external converter tools (exiftool, dcraw).
//!
//! Tool output is streamed into a `NamedTempFile`. The file is deleted when
//! it goes out of scope, whichever way the conversion ends.

use super::DecoderConfig;
use crate::error::HashError;
use image::{DynamicImage, ImageReader};
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::debug;

/// Create a scoped temp file in the configured directory
pub(crate) fn scratch_file(config: &DecoderConfig, suffix: &str) -> Result<NamedTempFile, HashError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("image-finder-").suffix(suffix);

    let result = match &config.temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };

    result.map_err(|e| HashError::ComputationFailed(format!("cannot create temp file: {}", e)))
}

/// Run `program args... source` with stdout redirected into a temp file,
/// then decode whatever it wrote.
pub(crate) fn convert_via_stdout(
    config: &DecoderConfig,
    program: &str,
    args: &[&str],
    source: &Path,
    suffix: &str,
) -> Result<DynamicImage, HashError> {
    let output = scratch_file(config, suffix)?;
    let stdout = output.reopen().map_err(|e| HashError::IoError {
        path: output.path().to_path_buf(),
        source: e,
    })?;

    let status = Command::new(program)
        .args(args)
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::null())
        .status()
        .map_err(|e| HashError::DecodeError {
            path: source.to_path_buf(),
            reason: format!("failed to run {}: {}", program, e),
        })?;

    if !status.success() {
        return Err(HashError::DecodeError {
            path: source.to_path_buf(),
            reason: format!("{} exited with {}", program, status),
        });
    }

    let written = output.as_file().metadata().map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        return Err(HashError::DecodeError {
            path: source.to_path_buf(),
            reason: format!("{} produced no image data", program),
        });
    }

    debug!("{} wrote {} bytes for {}", program, written, source.display());
    open_guessing_format(output.path(), source)
}

/// Extract an embedded preview with `exiftool -b -<tag>`
pub(crate) fn exiftool_preview(
    config: &DecoderConfig,
    source: &Path,
    tag: &str,
) -> Result<DynamicImage, HashError> {
    let flag = format!("-{}", tag);
    convert_via_stdout(config, &config.exiftool, &["-b", flag.as_str()], source, ".jpg")
}

/// Develop a RAW file to TIFF with dcraw
pub(crate) fn dcraw_develop(
    config: &DecoderConfig,
    source: &Path,
    auto_bright: bool,
) -> Result<DynamicImage, HashError> {
    let args: &[&str] = if auto_bright {
        &["-T", "-c", "-w", "-a", "-q", "3"]
    } else {
        &["-T", "-c", "-w", "-q", "3"]
    };
    convert_via_stdout(config, &config.dcraw, args, source, ".tiff")
}

/// Decode a file by sniffing its content rather than trusting the extension
pub(crate) fn open_guessing_format(path: &Path, reported: &Path) -> Result<DynamicImage, HashError> {
    let decode_error = |reason: String| HashError::DecodeError {
        path: reported.to_path_buf(),
        reason,
    };

    ImageReader::open(path)
        .map_err(|e| decode_error(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?
        .decode()
        .map_err(|e| decode_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    #[test]
    fn scratch_files_are_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let config = DecoderConfig {
            temp_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        let path = {
            let file = scratch_file(&config, ".jpg").unwrap();
            assert!(file.path().exists());
            file.path().to_path_buf()
        };

        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_tool_is_a_decode_error_and_leaves_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let config = DecoderConfig {
            exiftool: "image-finder-no-such-tool".to_string(),
            temp_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        let result = exiftool_preview(&config, Path::new("/tmp/x.cr2"), "PreviewImage");
        assert!(matches!(result, Err(HashError::DecodeError { .. })));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn content_sniffing_ignores_extension() {
        let temp_dir = TempDir::new().unwrap();
        let misnamed = temp_dir.path().join("actually_png.dat");
        GrayImage::from_pixel(4, 4, Luma([9]))
            .save_with_format(&misnamed, image::ImageFormat::Png)
            .unwrap();

        let decoded = open_guessing_format(&misnamed, &misnamed).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }
}
