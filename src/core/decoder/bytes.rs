//! File reading with memory mapping for large images.

use crate::error::HashError;
use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

/// Files at least this large are memory-mapped instead of read
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Owned or memory-mapped file contents
pub enum FileBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Owned(bytes) => bytes,
            FileBytes::Mapped(map) => map,
        }
    }
}

pub fn read_file_bytes(path: &Path) -> Result<FileBytes, HashError> {
    let io_error = |source| HashError::IoError {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let len = file.metadata().map_err(io_error)?.len();

    if len < MMAP_THRESHOLD {
        return std::fs::read(path).map(FileBytes::Owned).map_err(io_error);
    }

    // SAFETY: the map is read-only and only lives as long as this decode.
    // A concurrent truncation by another process is the accepted risk.
    let map = unsafe { Mmap::map(&file) }.map_err(io_error)?;
    Ok(FileBytes::Mapped(map))
}
