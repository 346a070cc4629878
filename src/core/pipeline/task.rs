//! One file's trip through the pipeline:
//! skip check, decode, fingerprint, store.

use super::CancellationToken;
use crate::core::decoder::DecoderRegistry;
use crate::core::fingerprint::compute_fingerprint;
use crate::core::format::{FormatCategory, FormatClassifier};
use crate::core::store::{modification_time, FingerprintRecord, FingerprintStore, UpsertOutcome};
use crate::error::TaskError;
use chrono::Utc;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// A file waiting to be processed
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub path: PathBuf,
    pub category: FormatCategory,
    pub source_prefix: Arc<str>,
    pub force_rewrite: bool,
}

/// How a successful task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A record was inserted or updated
    Stored,
    /// The stored record was already current
    Skipped,
}

/// Outcome of exactly one `ScanTask`
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub path: PathBuf,
    pub outcome: Result<TaskOutcome, TaskError>,
    pub is_raw: bool,
    pub is_tiff: bool,
}

impl ScanResult {
    pub fn new(task: &ScanTask, outcome: Result<TaskOutcome, TaskError>) -> Self {
        Self {
            path: task.path.clone(),
            outcome,
            is_raw: task.category.is_raw(),
            is_tiff: task.category.is_tiff(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }
}

/// Everything a worker borrows from the pipeline
pub(crate) struct TaskContext<'a> {
    pub store: &'a dyn FingerprintStore,
    pub decoders: &'a DecoderRegistry,
    pub classifier: &'a FormatClassifier,
    pub cancel: &'a CancellationToken,
}

/// Run a task, turning any panic inside it into a failed result
pub(crate) fn run_task(task: &ScanTask, ctx: &TaskContext<'_>) -> ScanResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| process_file(task, ctx)))
        .unwrap_or_else(|panic| {
            Err(TaskError::Fault {
                message: panic_message(panic.as_ref()),
            })
        });
    ScanResult::new(task, outcome)
}

fn process_file(task: &ScanTask, ctx: &TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if ctx.cancel.is_cancelled() {
        return Err(TaskError::Cancelled);
    }

    let metadata = std::fs::metadata(&task.path).map_err(|e| TaskError::Io(e.to_string()))?;
    let modified = modification_time(metadata.modified().map_err(|e| TaskError::Io(e.to_string()))?);

    if !task.force_rewrite {
        if let Some(stored) = ctx.store.exists(&task.path, &task.source_prefix)? {
            if modified <= stored {
                debug!("Skipping unchanged {}", task.path.display());
                return Ok(TaskOutcome::Skipped);
            }
        }
    }

    let image = ctx.decoders.decode(&task.path, task.category)?;
    let fingerprint = compute_fingerprint(&image)?;

    let record = FingerprintRecord {
        path: task.path.clone(),
        source_prefix: task.source_prefix.to_string(),
        format: ctx.classifier.format_name(&task.path),
        width: image.width(),
        height: image.height(),
        size_bytes: metadata.len(),
        modified_at: modified,
        created_at: Utc::now(),
        average_hash: fingerprint.average_hash,
        perceptual_hash: fingerprint.perceptual_hash,
        is_raw_format: task.category.is_raw(),
    };

    match ctx.store.upsert(&record, task.force_rewrite)? {
        UpsertOutcome::Written => Ok(TaskOutcome::Stored),
        // Another writer got there first with data at least as new
        UpsertOutcome::Unchanged => Ok(TaskOutcome::Skipped),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
