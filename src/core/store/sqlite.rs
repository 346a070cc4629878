//! SQLite store backend.

use super::{prefix_filter, FingerprintRecord, FingerprintStore, StoreStats, UpsertOutcome};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL,
        source_prefix TEXT NOT NULL DEFAULT '',
        format TEXT NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        size_bytes INTEGER NOT NULL,
        modified_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        average_hash TEXT NOT NULL,
        perceptual_hash TEXT NOT NULL,
        is_raw_format INTEGER NOT NULL DEFAULT 0,
        UNIQUE(path, source_prefix)
    );
    CREATE INDEX IF NOT EXISTS idx_images_source_prefix ON images(source_prefix);
    CREATE INDEX IF NOT EXISTS idx_images_average_hash ON images(average_hash);
    CREATE INDEX IF NOT EXISTS idx_images_perceptual_hash ON images(perceptual_hash);
";

const COLUMNS: &str = "path, source_prefix, format, width, height, size_bytes, \
                       modified_at, created_at, average_hash, perceptual_hash, is_raw_format";

const UPSERT_IF_NEWER: &str = "
    INSERT INTO images (path, source_prefix, format, width, height, size_bytes,
                        modified_at, created_at, average_hash, perceptual_hash, is_raw_format)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(path, source_prefix) DO UPDATE SET
        format = excluded.format,
        width = excluded.width,
        height = excluded.height,
        size_bytes = excluded.size_bytes,
        modified_at = excluded.modified_at,
        average_hash = excluded.average_hash,
        perceptual_hash = excluded.perceptual_hash,
        is_raw_format = excluded.is_raw_format
    WHERE excluded.modified_at > images.modified_at
";

const UPSERT_FORCE: &str = "
    INSERT INTO images (path, source_prefix, format, width, height, size_bytes,
                        modified_at, created_at, average_hash, perceptual_hash, is_raw_format)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(path, source_prefix) DO UPDATE SET
        format = excluded.format,
        width = excluded.width,
        height = excluded.height,
        size_bytes = excluded.size_bytes,
        modified_at = excluded.modified_at,
        created_at = excluded.created_at,
        average_hash = excluded.average_hash,
        perceptual_hash = excluded.perceptual_hash,
        is_raw_format = excluded.is_raw_format
";

/// SQLite-backed fingerprint index
///
/// Runs in WAL mode so searches can read while a scan is writing.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create an index at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Self::initialize(conn, path.to_path_buf())
    }

    /// Open an index that must already exist (searching an empty index is
    /// almost always a mistake)
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Self::open(path)
    }

    /// A private in-memory index
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::initialize(conn, PathBuf::from(":memory:"))
    }

    fn initialize(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FingerprintRecord> {
        Ok(FingerprintRecord {
            path: PathBuf::from(row.get::<_, String>(0)?),
            source_prefix: row.get(1)?,
            format: row.get(2)?,
            width: row.get::<_, i64>(3)? as u32,
            height: row.get::<_, i64>(4)? as u32,
            size_bytes: row.get::<_, i64>(5)? as u64,
            modified_at: timestamp_column(row, 6)?,
            created_at: timestamp_column(row, 7)?,
            average_hash: row.get(8)?,
            perceptual_hash: row.get(9)?,
            is_raw_format: row.get(10)?,
        })
    }
}

/// Paths are stored as text; a path that is not valid UTF-8 has no key
fn path_key(path: &Path) -> Result<&str, StoreError> {
    path.to_str().ok_or_else(|| StoreError::InvalidRecord {
        path: path.display().to_string(),
        reason: "path is not valid UTF-8".to_string(),
    })
}

fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(index)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, millis))
}

impl FingerprintStore for SqliteStore {
    fn exists(&self, path: &Path, source_prefix: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let key = path_key(path)?;
        let conn = self.lock()?;

        let millis: Option<i64> = conn
            .query_row(
                "SELECT modified_at FROM images WHERE path = ?1 AND source_prefix = ?2",
                params![key, source_prefix],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        millis
            .map(|ms| {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::InvalidRecord {
                    path: key.to_string(),
                    reason: format!("modified_at {} out of range", ms),
                })
            })
            .transpose()
    }

    fn get(&self, path: &Path, source_prefix: &str) -> Result<Option<FingerprintRecord>, StoreError> {
        let key = path_key(path)?;
        let conn = self.lock()?;

        conn.query_row(
            &format!("SELECT {} FROM images WHERE path = ?1 AND source_prefix = ?2", COLUMNS),
            params![key, source_prefix],
            Self::record_from_row,
        )
        .optional()
        .map_err(|e| StoreError::QueryFailed(e.to_string()))
    }

    fn upsert(&self, record: &FingerprintRecord, force: bool) -> Result<UpsertOutcome, StoreError> {
        let key = path_key(&record.path)?;
        let conn = self.lock()?;

        let sql = if force { UPSERT_FORCE } else { UPSERT_IF_NEWER };
        let changed = conn
            .execute(
                sql,
                params![
                    key,
                    record.source_prefix,
                    record.format,
                    record.width as i64,
                    record.height as i64,
                    record.size_bytes as i64,
                    record.modified_at.timestamp_millis(),
                    record.created_at.timestamp_millis(),
                    record.average_hash,
                    record.perceptual_hash,
                    record.is_raw_format,
                ],
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(if changed > 0 {
            UpsertOutcome::Written
        } else {
            UpsertOutcome::Unchanged
        })
    }

    fn query_by_prefix(&self, source_prefix: Option<&str>) -> Result<Vec<FingerprintRecord>, StoreError> {
        let conn = self.lock()?;

        let records = match prefix_filter(source_prefix) {
            Some(prefix) => {
                let mut stmt = conn
                    .prepare(&format!("SELECT {} FROM images WHERE source_prefix = ?1", COLUMNS))
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                let rows = stmt
                    .query_map([prefix], Self::record_from_row)
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!("SELECT {} FROM images", COLUMNS))
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                let rows = stmt
                    .query_map([], Self::record_from_row)
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
        };

        records.map_err(|e| StoreError::QueryFailed(e.to_string()))
    }

    fn stats(&self, source_prefix: Option<&str>) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let select = "SELECT COUNT(*), COUNT(DISTINCT average_hash), COALESCE(SUM(is_raw_format), 0) FROM images";
        let to_stats = |row: &Row<'_>| -> rusqlite::Result<StoreStats> {
            Ok(StoreStats {
                total_records: row.get::<_, i64>(0)? as usize,
                unique_average_hashes: row.get::<_, i64>(1)? as usize,
                raw_records: row.get::<_, i64>(2)? as usize,
            })
        };

        let result = match prefix_filter(source_prefix) {
            Some(prefix) => conn.query_row(
                &format!("{} WHERE source_prefix = ?1", select),
                [prefix],
                to_stats,
            ),
            None => conn.query_row(select, [], to_stats),
        };

        result.map_err(|e| StoreError::QueryFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::sample_record;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn sqlite_store_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/dir/images.db");

        let store = SqliteStore::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.stats(None).unwrap(), StoreStats::default());
    }

    #[test]
    fn open_existing_requires_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("images.db");

        assert!(matches!(
            SqliteStore::open_existing(&db_path),
            Err(StoreError::NotFound { .. })
        ));

        SqliteStore::open(&db_path).unwrap();
        assert!(SqliteStore::open_existing(&db_path).is_ok());
    }

    #[test]
    fn stores_and_retrieves_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record("/photos/a.jpg", "drive-a", 1_700_000_000);

        assert_eq!(store.upsert(&record, false).unwrap(), UpsertOutcome::Written);

        let loaded = store.get(Path::new("/photos/a.jpg"), "drive-a").unwrap().unwrap();
        assert_eq!(loaded.average_hash, record.average_hash);
        assert_eq!(loaded.modified_at, record.modified_at);
        assert_eq!(loaded.width, 640);
        assert!(store.get(Path::new("/photos/a.jpg"), "drive-b").unwrap().is_none());
    }

    #[test]
    fn exists_returns_stored_modification_time() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&sample_record("/a.jpg", "", 1_600_000_000), false).unwrap();

        let modified = store.exists(Path::new("/a.jpg"), "").unwrap();
        assert_eq!(modified.map(|t| t.timestamp()), Some(1_600_000_000));
        assert!(store.exists(Path::new("/b.jpg"), "").unwrap().is_none());
    }

    #[test]
    fn same_path_with_different_prefixes_are_distinct() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&sample_record("/a.jpg", "one", 1), false).unwrap();
        store.upsert(&sample_record("/a.jpg", "two", 1), false).unwrap();

        assert_eq!(store.stats(None).unwrap().total_records, 2);
        assert_eq!(store.query_by_prefix(Some("one")).unwrap().len(), 1);
        assert_eq!(store.query_by_prefix(Some("")).unwrap().len(), 2);
    }

    #[test]
    fn non_forced_upsert_keeps_newer_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let newer = sample_record("/a.jpg", "", 2_000);
        store.upsert(&newer, false).unwrap();

        let mut stale = sample_record("/a.jpg", "", 1_000);
        stale.average_hash = "ffffffffffffffff".to_string();
        assert_eq!(store.upsert(&stale, false).unwrap(), UpsertOutcome::Unchanged);

        let mut same_time = sample_record("/a.jpg", "", 2_000);
        same_time.average_hash = "1111111111111111".to_string();
        assert_eq!(store.upsert(&same_time, false).unwrap(), UpsertOutcome::Unchanged);

        let loaded = store.get(Path::new("/a.jpg"), "").unwrap().unwrap();
        assert_eq!(loaded.average_hash, newer.average_hash);
    }

    #[test]
    fn non_forced_upsert_updates_newer_file_but_keeps_created_at() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut original = sample_record("/a.jpg", "", 1_000);
        original.created_at = DateTime::from_timestamp(10, 0).unwrap();
        store.upsert(&original, false).unwrap();

        let mut changed = sample_record("/a.jpg", "", 1_001);
        changed.average_hash = "ffffffffffffffff".to_string();
        assert_eq!(store.upsert(&changed, false).unwrap(), UpsertOutcome::Written);

        let loaded = store.get(Path::new("/a.jpg"), "").unwrap().unwrap();
        assert_eq!(loaded.average_hash, "ffffffffffffffff");
        assert_eq!(loaded.modified_at.timestamp(), 1_001);
        assert_eq!(loaded.created_at.timestamp(), 10);
    }

    #[test]
    fn forced_upsert_overwrites_everything() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut original = sample_record("/a.jpg", "", 1_000);
        original.created_at = DateTime::from_timestamp(10, 0).unwrap();
        store.upsert(&original, false).unwrap();

        let mut forced = sample_record("/a.jpg", "", 1_000);
        forced.created_at = DateTime::from_timestamp(20, 0).unwrap();
        forced.perceptual_hash = "abcdefabcdefabcd".to_string();
        assert_eq!(store.upsert(&forced, true).unwrap(), UpsertOutcome::Written);

        let loaded = store.get(Path::new("/a.jpg"), "").unwrap().unwrap();
        assert_eq!(loaded.created_at.timestamp(), 20);
        assert_eq!(loaded.perceptual_hash, "abcdefabcdefabcd");
        assert_eq!(store.stats(None).unwrap().total_records, 1);
    }

    #[test]
    fn stats_count_unique_hashes_and_raw_files() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&sample_record("/a.jpg", "x", 1), false).unwrap();
        store.upsert(&sample_record("/b.jpg", "x", 1), false).unwrap();
        let mut raw = sample_record("/c.cr2", "y", 1);
        raw.is_raw_format = true;
        raw.average_hash = "123456789abcdef0".to_string();
        store.upsert(&raw, false).unwrap();

        assert_eq!(
            store.stats(None).unwrap(),
            StoreStats {
                total_records: 3,
                unique_average_hashes: 2,
                raw_records: 1,
            }
        );
        assert_eq!(store.stats(Some("x")).unwrap().total_records, 2);
        assert_eq!(store.stats(Some("y")).unwrap().raw_records, 1);
    }

    #[test]
    fn concurrent_upserts_keep_one_row_per_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(&temp_dir.path().join("images.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..20 {
                        let record = sample_record(&format!("/p/{}.jpg", n), "", 1_000 + i);
                        store.upsert(&record, false).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.stats(None).unwrap().total_records, 20);
        for n in 0..20 {
            let loaded = store.get(Path::new(&format!("/p/{}.jpg", n)), "").unwrap().unwrap();
            assert_eq!(loaded.modified_at.timestamp(), 1_007);
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_are_rejected_not_mangled() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = sample_record("/placeholder.jpg", "", 1);
        record.path = PathBuf::from(OsStr::from_bytes(b"/photos/caf\xe9.jpg"));

        assert!(matches!(
            store.upsert(&record, false),
            Err(StoreError::InvalidRecord { .. })
        ));
        assert!(matches!(
            store.exists(&record.path, ""),
            Err(StoreError::InvalidRecord { .. })
        ));
        assert_eq!(store.stats(None).unwrap().total_records, 0);
    }
}
