//! # Store Module
//!
//! The fingerprint index: one record per `(path, source_prefix)`.
//!
//! ## Write policy
//! - Normal scans insert new records and update existing ones only when the
//!   incoming modification time is strictly newer. The check and the write
//!   are one atomic statement.
//! - Forced scans overwrite every field, including `created_at`.
//!
//! ## Backends
//! - `SqliteStore` - persistent storage using SQLite
//! - `InMemoryStore` - for tests

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::FingerprintStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// A stored fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub path: PathBuf,
    /// Caller-supplied label partitioning the index ("" when unset)
    pub source_prefix: String,
    /// Lowercase file extension
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// Source file modification time, whole seconds
    pub modified_at: DateTime<Utc>,
    /// When the record was first written (or last force-written)
    pub created_at: DateTime<Utc>,
    pub average_hash: String,
    pub perceptual_hash: String,
    pub is_raw_format: bool,
}

/// Whether an upsert changed the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written,
    /// An existing record was at least as new; nothing changed
    Unchanged,
}

/// Index statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub unique_average_hashes: usize,
    pub raw_records: usize,
}

/// File modification time at the precision the index compares on
pub fn modification_time(time: SystemTime) -> DateTime<Utc> {
    let time: DateTime<Utc> = time.into();
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

/// Treat `Some("")` like `None`: no prefix filter
pub(crate) fn prefix_filter(prefix: Option<&str>) -> Option<&str> {
    prefix.filter(|p| !p.is_empty())
}

#[cfg(test)]
pub(crate) fn sample_record(path: &str, prefix: &str, modified_secs: i64) -> FingerprintRecord {
    FingerprintRecord {
        path: PathBuf::from(path),
        source_prefix: prefix.to_string(),
        format: "jpg".to_string(),
        width: 640,
        height: 480,
        size_bytes: 12_345,
        modified_at: DateTime::from_timestamp(modified_secs, 0).unwrap(),
        created_at: Utc::now(),
        average_hash: "00000000ffffffff".to_string(),
        perceptual_hash: "0f0f0f0f0f0f0f0f".to_string(),
        is_raw_format: false,
    }
}
