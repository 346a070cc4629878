//! # Scanner Module
//!
//! Discovers image files under a folder for the scan pipeline.
//!
//! ## Example
//! ```rust,ignore
//! use image_finder::core::scanner::{FileWalker, WalkConfig};
//!
//! let walker = FileWalker::new(WalkConfig::default());
//! for file in walker.walk(Path::new("/Volumes/Photos")).flatten() {
//!     println!("{} ({})", file.path.display(), file.category);
//! }
//! ```

mod walker;

pub use walker::{FileWalker, WalkConfig};

use crate::core::format::FormatCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A supported image found during traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub category: FormatCategory,
}

/// Per-category totals from a discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub total: usize,
    pub raw: usize,
    pub tiff: usize,
}

impl FileStats {
    pub fn record(&mut self, file: &DiscoveredFile) {
        self.total += 1;
        match file.category {
            FormatCategory::Raw => self.raw += 1,
            FormatCategory::Tiff => self.tiff += 1,
            _ => {}
        }
    }
}
