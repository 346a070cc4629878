//! # Format Module
//!
//! Maps file paths to the format categories the rest of the engine
//! dispatches on.
//!
//! ## Categories
//! - **Standard** - JPEG, PNG, GIF, BMP, WebP, HEIC/HEIF
//! - **Tiff** - TIFF originals (.tif, .tiff)
//! - **Raw** - camera RAW files (DNG, RAF, ARW, NEF, CR2, CR3, ...)
//! - **Unsupported** - everything else, silently excluded from scans
//!
//! Classification looks at the extension only; nothing is decoded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const STANDARD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "heif"];
const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];
const RAW_EXTENSIONS: &[&str] = &[
    "dng", "raf", "arw", "nef", "cr2", "cr3", "nrw", "srf", "orf", "rw2", "pef", "raw",
];

/// Broad format class of an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatCategory {
    Standard,
    Raw,
    Tiff,
    Unsupported,
}

impl FormatCategory {
    /// Classify a bare extension (case-insensitive, without the dot)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        if STANDARD_EXTENSIONS.contains(&ext.as_str()) {
            FormatCategory::Standard
        } else if TIFF_EXTENSIONS.contains(&ext.as_str()) {
            FormatCategory::Tiff
        } else if RAW_EXTENSIONS.contains(&ext.as_str()) {
            FormatCategory::Raw
        } else {
            FormatCategory::Unsupported
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, FormatCategory::Unsupported)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, FormatCategory::Raw)
    }

    pub fn is_tiff(&self) -> bool {
        matches!(self, FormatCategory::Tiff)
    }
}

impl fmt::Display for FormatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatCategory::Standard => write!(f, "standard"),
            FormatCategory::Raw => write!(f, "raw"),
            FormatCategory::Tiff => write!(f, "tiff"),
            FormatCategory::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Decides which files the scan pipeline and search engine handle
#[derive(Debug, Clone, Default)]
pub struct FormatClassifier {
    include_hidden: bool,
}

impl FormatClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept files whose name starts with a dot
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Category of a path, judged by its extension
    pub fn classify(&self, path: &Path) -> FormatCategory {
        path.extension()
            .and_then(|e| e.to_str())
            .map(FormatCategory::from_extension)
            .unwrap_or(FormatCategory::Unsupported)
    }

    /// Whether `path` is an existing regular file in a supported format
    pub fn is_supported_image(&self, path: &Path) -> bool {
        if !self.include_hidden && is_hidden(path) {
            return false;
        }
        self.classify(path).is_supported() && path.is_file()
    }

    /// Lowercase extension recorded alongside each fingerprint
    pub fn format_name(&self, path: &Path) -> String {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Whether the final path component starts with a dot
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
