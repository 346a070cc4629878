//! Pipeline execution implementation.

use super::progress::{ProgressTracker, ScanSummary};
use super::slots::WorkerSlots;
use super::task::{run_task, ScanResult, ScanTask, TaskContext};
use super::CancellationToken;
use crate::core::decoder::DecoderRegistry;
use crate::core::scanner::{FileWalker, WalkConfig};
use crate::core::store::FingerprintStore;
use crate::error::{ImageFinderError, ScanError, TaskError};
use crate::events::{null_sender, EventSender, ScanEvent};
use crossbeam_channel::{bounded, RecvTimeoutError, SendTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shortest wait between aggregator wake-ups
const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

/// Three quarters of the available cores, at least one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 3 / 4)
        .unwrap_or(1)
        .max(1)
}

/// Configuration for the scan pipeline
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Concurrent decode/hash/store tasks
    pub max_workers: usize,
    /// How long one wait for a worker slot may take
    pub slot_timeout: Duration,
    /// Waits before a task is abandoned
    pub slot_attempts: u32,
    /// Capacity of the queue between workers and the aggregator
    pub result_queue_capacity: usize,
    /// How long a worker may block on a full result queue before the result is dropped
    pub result_send_deadline: Duration,
    /// Minimum time between progress events
    pub progress_interval: Duration,
    /// Directory traversal settings
    pub walk: WalkConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_workers: default_worker_count(),
            slot_timeout: Duration::from_secs(30),
            slot_attempts: 4,
            result_queue_capacity: 100,
            result_send_deadline: Duration::from_secs(60),
            progress_interval: Duration::from_millis(500),
            walk: WalkConfig::default(),
        }
    }
}

/// What to scan and how to label it
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub source_prefix: String,
    pub force_rewrite: bool,
}

impl ScanOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source_prefix: String::new(),
            force_rewrite: false,
        }
    }

    pub fn source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = prefix.into();
        self
    }

    pub fn force_rewrite(mut self, force: bool) -> Self {
        self.force_rewrite = force;
        self
    }
}

/// Builder for the scan pipeline
pub struct ScanPipelineBuilder {
    config: ScanConfig,
    store: Arc<dyn FingerprintStore>,
    decoders: DecoderRegistry,
    cancel: Option<CancellationToken>,
}

impl ScanPipelineBuilder {
    pub fn new(store: Arc<dyn FingerprintStore>, decoders: DecoderRegistry) -> Self {
        Self {
            config: ScanConfig::default(),
            store,
            decoders,
            cancel: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of concurrent workers (minimum 1)
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers.max(1);
        self
    }

    pub fn slot_timeout(mut self, timeout: Duration) -> Self {
        self.config.slot_timeout = timeout;
        self
    }

    pub fn slot_attempts(mut self, attempts: u32) -> Self {
        self.config.slot_attempts = attempts.max(1);
        self
    }

    pub fn result_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.result_queue_capacity = capacity.max(1);
        self
    }

    pub fn result_send_deadline(mut self, deadline: Duration) -> Self {
        self.config.result_send_deadline = deadline;
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    pub fn walk_config(mut self, walk: WalkConfig) -> Self {
        self.config.walk = walk;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.walk.include_hidden = include;
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> ScanPipeline {
        ScanPipeline {
            config: self.config,
            store: self.store,
            decoders: self.decoders,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

/// Indexes every supported image under a folder
pub struct ScanPipeline {
    config: ScanConfig,
    store: Arc<dyn FingerprintStore>,
    decoders: DecoderRegistry,
    cancel: CancellationToken,
}

impl ScanPipeline {
    pub fn builder(store: Arc<dyn FingerprintStore>, decoders: DecoderRegistry) -> ScanPipelineBuilder {
        ScanPipelineBuilder::new(store, decoders)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Token that stops this pipeline when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a scan without events
    pub fn scan(&self, options: &ScanOptions) -> Result<ScanSummary, ImageFinderError> {
        self.scan_with_events(options, &null_sender())
    }

    /// Run a scan with event reporting.
    ///
    /// Fails only when the root folder is unusable or the worker pool
    /// cannot start. Per-file problems end up in the summary.
    pub fn scan_with_events(
        &self,
        options: &ScanOptions,
        events: &EventSender,
    ) -> Result<ScanSummary, ImageFinderError> {
        let start_time = Instant::now();
        let root = options.root.as_path();

        FileWalker::check_root(root)?;
        let walker = FileWalker::new(self.config.walk.clone());
        let totals = walker.count(root);

        info!(
            "Scanning {} ({} images: {} RAW, {} TIF) with {} workers",
            root.display(),
            totals.total,
            totals.raw,
            totals.tiff,
            self.config.max_workers
        );
        events.scan(ScanEvent::Started {
            root: root.to_path_buf(),
            total_files: totals.total,
            raw_files: totals.raw,
            tif_files: totals.tiff,
        });

        let workers = self.config.max_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("scan-worker-{}", index))
            .build()
            .map_err(|e| ScanError::PoolSetup(e.to_string()))?;

        let slots = WorkerSlots::new(workers);
        let (result_tx, result_rx) = bounded::<ScanResult>(self.config.result_queue_capacity.max(1));
        let dropped = AtomicUsize::new(0);
        let interval = self.config.progress_interval.max(MIN_PROGRESS_INTERVAL);

        let (tracker, walk_errors) = std::thread::scope(|scope| {
            let aggregator = scope.spawn(move || {
                let mut tracker = ProgressTracker::new(totals, interval);
                loop {
                    match result_rx.recv_timeout(interval) {
                        Ok(result) => {
                            tracker.record(&result, events);
                            tracker.tick(events);
                        }
                        Err(RecvTimeoutError::Timeout) => tracker.tick(events),
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracker.report(events);
                tracker
            });

            let walk_errors = self.launch_tasks(&pool, &walker, options, &slots, &result_tx, &dropped, events);

            // Closing the queue lets the aggregator drain and stop
            drop(result_tx);
            aggregator
                .join()
                .map(|tracker| (tracker, walk_errors))
                .map_err(|_| ScanError::Aggregator("aggregator thread panicked".to_string()))
        })?;

        let mut summary = tracker.finish();
        summary.dropped_results = dropped.load(Ordering::SeqCst);
        summary.walk_errors = walk_errors;
        summary.cancelled = self.cancel.is_cancelled();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        if summary.cancelled {
            info!("Scan of {} cancelled", root.display());
            events.scan(ScanEvent::Cancelled);
        }
        if summary.dropped_results > 0 {
            warn!(
                "{} results were dropped because the result queue stayed full",
                summary.dropped_results
            );
        }
        info!(
            "Scan complete: {} processed, {} stored, {} skipped, {} errors ({} RAW, {} TIF stored) in {}ms",
            summary.total_processed,
            summary.stored,
            summary.skipped,
            summary.errors,
            summary.raw_count,
            summary.tif_count,
            summary.duration_ms
        );

        events.scan(ScanEvent::Completed {
            summary: summary.clone(),
        });

        Ok(summary)
    }

    /// Walk the tree on the calling thread and hand each file to the pool.
    ///
    /// Returns the number of unreadable directory entries.
    #[allow(clippy::too_many_arguments)]
    fn launch_tasks(
        &self,
        pool: &rayon::ThreadPool,
        walker: &FileWalker,
        options: &ScanOptions,
        slots: &WorkerSlots,
        results: &Sender<ScanResult>,
        dropped: &AtomicUsize,
        events: &EventSender,
    ) -> usize {
        let ctx = TaskContext {
            store: self.store.as_ref(),
            decoders: &self.decoders,
            classifier: walker.classifier(),
            cancel: &self.cancel,
        };
        let ctx = &ctx;
        let source_prefix: Arc<str> = Arc::from(options.source_prefix.as_str());
        let deadline = self.config.result_send_deadline;
        let mut walk_errors = 0;

        pool.in_place_scope(|scope| {
            for entry in walker.walk(&options.root) {
                if self.cancel.is_cancelled() {
                    debug!("Cancellation requested, no further files will be launched");
                    break;
                }

                let file = match entry {
                    Ok(file) => file,
                    Err(error) => {
                        walk_errors += 1;
                        warn!("{}", error);
                        events.scan(walk_error_event(&error, &options.root));
                        continue;
                    }
                };

                let task = ScanTask {
                    path: file.path,
                    category: file.category,
                    source_prefix: Arc::clone(&source_prefix),
                    force_rewrite: options.force_rewrite,
                };

                let permit = match slots.acquire(self.config.slot_timeout, self.config.slot_attempts) {
                    Ok(permit) => permit,
                    Err(attempts) => {
                        let result = ScanResult::new(&task, Err(TaskError::Abandoned { attempts }));
                        deliver(results, result, deadline, dropped);
                        continue;
                    }
                };

                scope.spawn(move |_| {
                    let result = run_task(&task, ctx);
                    deliver(results, result, deadline, dropped);
                    drop(permit);
                });
            }
        });

        walk_errors
    }
}

/// Send a result to the aggregator, counting it as dropped if the queue
/// stays full past `deadline` or the aggregator is gone
fn deliver(results: &Sender<ScanResult>, result: ScanResult, deadline: Duration, dropped: &AtomicUsize) {
    match results.send_timeout(result, deadline) {
        Ok(()) => {}
        Err(SendTimeoutError::Timeout(result)) => {
            dropped.fetch_add(1, Ordering::SeqCst);
            warn!(
                "Result queue full for {:?}, dropped result for {}",
                deadline,
                result.path.display()
            );
        }
        Err(SendTimeoutError::Disconnected(result)) => {
            dropped.fetch_add(1, Ordering::SeqCst);
            warn!("Aggregator gone, dropped result for {}", result.path.display());
        }
    }
}

fn walk_error_event(error: &ScanError, root: &Path) -> ScanEvent {
    let path = match error {
        ScanError::WalkEntry { path, .. } if !path.as_os_str().is_empty() => path.clone(),
        _ => root.to_path_buf(),
    };
    ScanEvent::WalkError {
        path,
        message: error.to_string(),
    }
}
