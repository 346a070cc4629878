//! Result aggregation and periodic progress reporting.

use super::task::{ScanResult, TaskOutcome};
use crate::core::scanner::FileStats;
use crate::error::TaskError;
use crate::events::{EventSender, ScanEvent, ScanProgress};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Store failures in one scan after which a systemic warning is logged
pub const STORE_ERROR_WARNING_THRESHOLD: usize = 10;

/// Final statistics of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Results that reached the aggregator (stored + skipped + errors)
    pub total_processed: usize,
    pub stored: usize,
    pub skipped: usize,
    pub errors: usize,
    pub raw_count: usize,
    pub tif_count: usize,
    pub raw_errors: usize,
    pub tif_errors: usize,
    pub store_errors: usize,
    /// Tasks that never got a worker slot
    pub abandoned: usize,
    /// Results lost because the result queue stayed full past its deadline
    pub dropped_results: usize,
    pub walk_errors: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl ScanSummary {
    /// Files handed to the pipeline, whether or not their result arrived
    pub fn files_seen(&self) -> usize {
        self.total_processed + self.dropped_results
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0 || self.dropped_results > 0 || self.walk_errors > 0
    }
}

/// Aggregator state; owned by the aggregator thread
pub(crate) struct ProgressTracker {
    totals: FileStats,
    summary: ScanSummary,
    raw_processed: usize,
    tif_processed: usize,
    interval: Duration,
    last_report: Instant,
    store_warning_logged: bool,
}

impl ProgressTracker {
    pub fn new(totals: FileStats, interval: Duration) -> Self {
        Self {
            totals,
            summary: ScanSummary::default(),
            raw_processed: 0,
            tif_processed: 0,
            interval,
            last_report: Instant::now(),
            store_warning_logged: false,
        }
    }

    pub fn record(&mut self, result: &ScanResult, events: &EventSender) {
        let summary = &mut self.summary;
        summary.total_processed += 1;
        if result.is_raw {
            self.raw_processed += 1;
        }
        if result.is_tiff {
            self.tif_processed += 1;
        }

        let error = match &result.outcome {
            Ok(TaskOutcome::Stored) => {
                summary.stored += 1;
                if result.is_raw {
                    summary.raw_count += 1;
                }
                if result.is_tiff {
                    summary.tif_count += 1;
                }
                return;
            }
            Ok(TaskOutcome::Skipped) => {
                summary.skipped += 1;
                return;
            }
            Err(error) => error,
        };

        summary.errors += 1;
        if result.is_raw {
            summary.raw_errors += 1;
        }
        if result.is_tiff {
            summary.tif_errors += 1;
        }

        match error {
            TaskError::Cancelled => {
                debug!("Cancelled before processing {}", result.path.display());
            }
            TaskError::Abandoned { .. } => {
                summary.abandoned += 1;
                warn!("Abandoned {}: {}", result.path.display(), error);
            }
            TaskError::Store(_) => {
                summary.store_errors += 1;
                warn!("Failed to index {}: {}", result.path.display(), error);
                if summary.store_errors >= STORE_ERROR_WARNING_THRESHOLD && !self.store_warning_logged {
                    self.store_warning_logged = true;
                    warn!(
                        "{} index writes have failed; the database may be locked, full or corrupted",
                        summary.store_errors
                    );
                }
            }
            _ => warn!("Failed to process {}: {}", result.path.display(), error),
        }

        events.scan(ScanEvent::FileFailed {
            path: result.path.clone(),
            message: error.to_string(),
        });
    }

    /// Report progress if the interval has elapsed
    pub fn tick(&mut self, events: &EventSender) {
        if self.last_report.elapsed() >= self.interval {
            self.report(events);
        }
    }

    pub fn report(&mut self, events: &EventSender) {
        let progress = self.snapshot();
        debug!(
            "Progress: {}/{} ({:.1}%), errors: {}, RAW: {}/{}, TIF: {}/{}",
            progress.processed,
            progress.total,
            progress.percent(),
            progress.errors,
            progress.raw_processed,
            progress.raw_total,
            progress.tif_processed,
            progress.tif_total
        );
        events.scan(ScanEvent::Progress(progress));
        self.last_report = Instant::now();
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            processed: self.summary.total_processed,
            total: self.totals.total,
            errors: self.summary.errors,
            raw_processed: self.raw_processed,
            raw_total: self.totals.raw,
            tif_processed: self.tif_processed,
            tif_total: self.totals.tiff,
        }
    }

    pub fn finish(self) -> ScanSummary {
        self.summary
    }
}
