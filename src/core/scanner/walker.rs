//! Directory walking implementation using walkdir.

use super::{DiscoveredFile, FileStats};
use crate::core::format::{is_hidden, FormatClassifier};
use crate::error::ScanError;
use std::io::ErrorKind;
use std::path::Path;
use walkdir::WalkDir;

/// Configuration for directory traversal
#[derive(Debug, Clone, Default)]
pub struct WalkConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
}

/// Recursive walker yielding supported image files under a root
pub struct FileWalker {
    config: WalkConfig,
    classifier: FormatClassifier,
}

impl FileWalker {
    pub fn new(config: WalkConfig) -> Self {
        let classifier = FormatClassifier::new().with_hidden(config.include_hidden);
        Self { config, classifier }
    }

    pub fn classifier(&self) -> &FormatClassifier {
        &self.classifier
    }

    /// Fail unless `root` is an accessible directory
    pub fn check_root(root: &Path) -> Result<(), ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ScanError::RootNotFound {
                path: root.to_path_buf(),
            },
            _ => ScanError::PathAccess {
                path: root.to_path_buf(),
                source: e,
            },
        })?;

        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        // Listing the root surfaces permission problems before any work starts
        std::fs::read_dir(root).map_err(|e| ScanError::PathAccess {
            path: root.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Lazily walk `root`.
    ///
    /// Unsupported files are skipped silently. Unreadable entries and
    /// supported files whose path is not valid UTF-8 (the index keys on
    /// text paths) come back as `Err` so the caller can log them and keep
    /// going.
    pub fn walk<'a>(
        &'a self,
        root: &Path,
    ) -> impl Iterator<Item = Result<DiscoveredFile, ScanError>> + 'a {
        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.config.include_hidden;

        walker
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0 || include_hidden || !is_hidden(entry.path())
            })
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        return None;
                    }
                    let path = entry.path();
                    if !self.classifier.is_supported_image(path) {
                        return None;
                    }
                    if path.to_str().is_none() {
                        return Some(Err(ScanError::WalkEntry {
                            path: path.to_path_buf(),
                            reason: "path is not valid UTF-8".to_string(),
                        }));
                    }
                    Some(Ok(DiscoveredFile {
                        path: path.to_path_buf(),
                        category: self.classifier.classify(path),
                    }))
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    Some(Err(ScanError::WalkEntry {
                        path,
                        reason: e.to_string(),
                    }))
                }
            })
    }

    /// Count supported files per category without processing them
    pub fn count(&self, root: &Path) -> FileStats {
        let mut stats = FileStats::default();
        for file in self.walk(root).flatten() {
            stats.record(&file);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::FormatCategory;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn walk_finds_nested_supported_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.jpg"));
        touch(&root.join("nested/deeper/b.CR2"));
        touch(&root.join("nested/c.tif"));
        touch(&root.join("nested/notes.txt"));

        let walker = FileWalker::new(WalkConfig::default());
        let mut found: Vec<_> = walker
            .walk(root)
            .map(|r| r.unwrap())
            .map(|f| (f.path.file_name().unwrap().to_string_lossy().to_string(), f.category))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            found,
            vec![
                ("a.jpg".to_string(), FormatCategory::Standard),
                ("b.CR2".to_string(), FormatCategory::Raw),
                ("c.tif".to_string(), FormatCategory::Tiff),
            ]
        );
    }

    #[test]
    fn hidden_directories_are_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join(".cache/thumb.jpg"));
        touch(&root.join("visible.jpg"));

        let walker = FileWalker::new(WalkConfig::default());
        assert_eq!(walker.walk(root).count(), 1);

        let walker = FileWalker::new(WalkConfig {
            include_hidden: true,
            ..Default::default()
        });
        assert_eq!(walker.walk(root).count(), 2);
    }

    #[test]
    fn max_depth_limits_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("top.png"));
        touch(&root.join("sub/inner.png"));

        let walker = FileWalker::new(WalkConfig {
            max_depth: Some(1),
            ..Default::default()
        });
        assert_eq!(walker.walk(root).count(), 1);
    }

    #[test]
    fn count_splits_by_category() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("1.jpg"));
        touch(&root.join("2.nef"));
        touch(&root.join("3.dng"));
        touch(&root.join("4.tiff"));

        let stats = FileWalker::new(WalkConfig::default()).count(root);
        assert_eq!(stats, FileStats { total: 4, raw: 2, tiff: 1 });
    }

    #[test]
    fn check_root_rejects_missing_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.jpg");
        touch(&file);

        assert!(FileWalker::check_root(temp_dir.path()).is_ok());
        assert!(matches!(
            FileWalker::check_root(&temp_dir.path().join("nope")),
            Err(ScanError::RootNotFound { .. })
        ));
        assert!(matches!(
            FileWalker::check_root(&file),
            Err(ScanError::NotADirectory { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_reported_not_yielded() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("good.jpg"));
        touch(&root.join(OsStr::from_bytes(b"caf\xe9.jpg")));

        let walker = FileWalker::new(WalkConfig::default());
        let (ok, failed): (Vec<_>, Vec<_>) = walker.walk(root).partition(|r| r.is_ok());

        assert_eq!(ok.len(), 1);
        assert_eq!(failed.len(), 1);
        assert!(matches!(failed[0], Err(ScanError::WalkEntry { .. })));
        assert_eq!(walker.count(root).total, 1);
    }
}
