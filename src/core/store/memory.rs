//! In-memory store backend for testing.

use super::{prefix_filter, FingerprintRecord, FingerprintStore, StoreStats, UpsertOutcome};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

type Key = (PathBuf, String);

/// In-memory fingerprint index
///
/// Useful for tests and one-off searches that don't need persistence.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Key, FingerprintRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }
}

impl FingerprintStore for InMemoryStore {
    fn exists(&self, path: &Path, source_prefix: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.get(path, source_prefix)?.map(|r| r.modified_at))
    }

    fn get(&self, path: &Path, source_prefix: &str) -> Result<Option<FingerprintRecord>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records
            .get(&(path.to_path_buf(), source_prefix.to_string()))
            .cloned())
    }

    fn upsert(&self, record: &FingerprintRecord, force: bool) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let key = (record.path.clone(), record.source_prefix.clone());

        match records.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(UpsertOutcome::Written)
            }
            Entry::Occupied(mut slot) => {
                if force {
                    slot.insert(record.clone());
                    Ok(UpsertOutcome::Written)
                } else if record.modified_at > slot.get().modified_at {
                    let created_at = slot.get().created_at;
                    slot.insert(FingerprintRecord {
                        created_at,
                        ..record.clone()
                    });
                    Ok(UpsertOutcome::Written)
                } else {
                    Ok(UpsertOutcome::Unchanged)
                }
            }
        }
    }

    fn query_by_prefix(&self, source_prefix: Option<&str>) -> Result<Vec<FingerprintRecord>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        let prefix = prefix_filter(source_prefix);

        Ok(records
            .values()
            .filter(|r| prefix.map_or(true, |p| r.source_prefix == p))
            .cloned()
            .collect())
    }

    fn stats(&self, source_prefix: Option<&str>) -> Result<StoreStats, StoreError> {
        let matching = self.query_by_prefix(source_prefix)?;

        let unique: HashSet<&str> = matching.iter().map(|r| r.average_hash.as_str()).collect();
        Ok(StoreStats {
            total_records: matching.len(),
            unique_average_hashes: unique.len(),
            raw_records: matching.iter().filter(|r| r.is_raw_format).count(),
        })
    }
}
