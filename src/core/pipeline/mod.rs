//! # Pipeline Module
//!
//! Indexes a folder: every supported image is decoded, fingerprinted and
//! written to the fingerprint store.
//!
//! ## Stages
//! 1. **Count** - pre-walk for totals used in progress reporting
//! 2. **Walk** - the calling thread discovers files and launches tasks
//! 3. **Process** - workers run skip check, decode, hash and upsert
//! 4. **Aggregate** - one thread consumes every `ScanResult`
//!
//! ## Concurrency
//! A dedicated rayon pool runs the tasks. Worker slots cap how many are in
//! flight, and results pass through a bounded crossbeam queue. A result
//! that cannot be queued before `result_send_deadline` is dropped and
//! counted in `ScanSummary::dropped_results`.
//!
//! ## Example
//! ```rust,ignore
//! let store = Arc::new(SqliteStore::open(&db_path)?);
//! let pipeline = ScanPipeline::builder(store, DecoderRegistry::with_defaults(&DecoderConfig::default()))
//!     .max_workers(8)
//!     .build();
//! let summary = pipeline.scan(&ScanOptions::new("/Volumes/Photos").source_prefix("archive"))?;
//! ```

mod cancel;
mod executor;
mod progress;
mod slots;
mod task;

pub use cancel::CancellationToken;
pub use executor::{default_worker_count, ScanConfig, ScanOptions, ScanPipeline, ScanPipelineBuilder};
pub use progress::{ScanSummary, STORE_ERROR_WARNING_THRESHOLD};
pub use slots::{SlotPermit, WorkerSlots};
pub use task::{ScanResult, ScanTask, TaskOutcome};

pub(crate) use task::panic_message;
