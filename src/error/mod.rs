//! # Error Module
//!
//! Error types for the image fingerprint index.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Per-file errors stay per-file** - `TaskError` never escapes a scan;
//!   only operation-level failures surface as `ImageFinderError`

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ImageFinderError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Fingerprint error: {0}")]
    Hash(#[from] HashError),

    #[error("Index error: {0}")]
    Store(#[from] StoreError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that abort a whole scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Folder not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Cannot access {path}: {source}")]
    PathAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a folder: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to read entry {path}: {reason}")]
    WalkEntry { path: PathBuf, reason: String },

    #[error("Failed to start worker pool: {0}")]
    PoolSetup(String),

    #[error("Progress aggregator stopped unexpectedly: {0}")]
    Aggregator(String),
}

/// Errors that occur while decoding or fingerprinting one image
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or has zero dimensions: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the fingerprint index
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open index database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Index database not found at {path}. Run a scan first.")]
    NotFound { path: PathBuf },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Index corruption detected at {path}. Delete this file and scan again.")]
    Corrupted { path: PathBuf },

    #[error("Invalid record for {path}: {reason}")]
    InvalidRecord { path: String, reason: String },
}

/// Errors that abort a whole search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query image not found: {path}")]
    QueryNotFound { path: PathBuf },

    #[error("Query image has an unsupported format: {path}")]
    UnsupportedQuery { path: PathBuf },

    #[error("Invalid threshold: {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { value: f64 },

    #[error("Failed to fingerprint query image: {0}")]
    QueryDecode(#[source] HashError),

    #[error("Search was cancelled")]
    Cancelled,
}

/// Why a single file's scan task failed.
///
/// Reported as data inside a `ScanResult`, never propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("No decoder registered for {category}")]
    NoDecoder { category: String },

    #[error("{0}")]
    Decode(String),

    #[error("Failed to store fingerprint: {0}")]
    Store(String),

    #[error("Unexpected fault while processing: {message}")]
    Fault { message: String },

    #[error("Abandoned after waiting {attempts} times for a worker slot")]
    Abandoned { attempts: u32 },

    #[error("Cancelled before processing")]
    Cancelled,
}

impl TaskError {
    /// Whether the failure came from the index rather than the image
    pub fn is_store_error(&self) -> bool {
        matches!(self, TaskError::Store(_))
    }
}

impl From<HashError> for TaskError {
    fn from(error: HashError) -> Self {
        match error {
            HashError::UnsupportedFormat { format } => TaskError::NoDecoder { category: format },
            other => TaskError::Decode(other.to_string()),
        }
    }
}

impl From<StoreError> for TaskError {
    fn from(error: StoreError) -> Self {
        TaskError::Store(error.to_string())
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ImageFinderError>;
