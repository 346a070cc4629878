//! # Core Module
//!
//! The image fingerprint index, independent of any front end.
//!
//! ## Modules
//! - `format` - Classifies files as standard, RAW or TIFF images
//! - `scanner` - Discovers images in directories
//! - `decoder` - Decodes images to grayscale, per format category
//! - `fingerprint` - Average and perceptual hashes, distances, pixel similarity
//! - `store` - Persists one fingerprint record per path and source prefix
//! - `pipeline` - Indexes a folder with a bounded worker pool
//! - `search` - Finds indexed images similar to a query image

pub mod decoder;
pub mod fingerprint;
pub mod format;
pub mod pipeline;
pub mod scanner;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use decoder::{DecoderConfig, DecoderRegistry, ImageDecoder};
pub use fingerprint::Fingerprint;
pub use format::FormatCategory;
pub use pipeline::{CancellationToken, ScanOptions, ScanPipeline, ScanSummary};
pub use search::{MatchResult, SearchEngine, SearchQuery};
pub use store::{FingerprintRecord, FingerprintStore, InMemoryStore, SqliteStore};
