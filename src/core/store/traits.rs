//! Store backend trait definition.

use super::{FingerprintRecord, StoreStats, UpsertOutcome};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Durable keyed storage of fingerprint records.
///
/// Implementations must make each `upsert` atomic per key; the scan
/// pipeline calls it from many workers at once.
pub trait FingerprintStore: Send + Sync {
    /// Stored modification time for a key, if the key exists
    fn exists(&self, path: &Path, source_prefix: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn get(&self, path: &Path, source_prefix: &str) -> Result<Option<FingerprintRecord>, StoreError>;

    /// Insert or update a record.
    ///
    /// With `force` every field is overwritten. Otherwise an existing record
    /// is only replaced when `record.modified_at` is strictly newer, and its
    /// `created_at` is kept.
    fn upsert(&self, record: &FingerprintRecord, force: bool) -> Result<UpsertOutcome, StoreError>;

    /// All records with the given prefix, or every record for `None`/`""`
    fn query_by_prefix(&self, source_prefix: Option<&str>) -> Result<Vec<FingerprintRecord>, StoreError>;

    fn stats(&self, source_prefix: Option<&str>) -> Result<StoreStats, StoreError>;
}
