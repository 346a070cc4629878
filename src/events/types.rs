//! Event type definitions for progress reporting.

use crate::core::pipeline::ScanSummary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the scan pipeline and search engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Indexing events
    Scan(ScanEvent),
    /// Similarity search events
    Search(SearchEvent),
}

/// Events while indexing a folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Discovery finished and processing is about to start
    Started {
        root: PathBuf,
        total_files: usize,
        raw_files: usize,
        tif_files: usize,
    },
    /// Periodic progress update
    Progress(ScanProgress),
    /// A file could not be indexed; the scan continues
    FileFailed { path: PathBuf, message: String },
    /// A directory entry could not be read; traversal continues
    WalkError { path: PathBuf, message: String },
    /// The scan was cancelled before all files were launched
    Cancelled,
    /// Scan completed
    Completed { summary: ScanSummary },
}

/// Running totals reported while a scan is in flight
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Results received so far (stored, skipped and failed)
    pub processed: usize,
    /// Files found by the pre-count
    pub total: usize,
    /// Failed files so far
    pub errors: usize,
    /// RAW files processed / found
    pub raw_processed: usize,
    pub raw_total: usize,
    /// TIFF files processed / found
    pub tif_processed: usize,
    pub tif_total: usize,
}

impl ScanProgress {
    /// Completion percentage, 100 when there is nothing to do
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }
}

/// Events during a similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SearchEvent {
    /// The query was fingerprinted and the index loaded
    Started { query: PathBuf, records: usize },
    /// A record passed the hash-distance prefilter
    CandidateFound {
        path: String,
        average_distance: u32,
        perceptual_distance: u32,
    },
    /// A candidate passed pixel verification
    MatchConfirmed { path: String, similarity_score: f64 },
    /// Search completed
    Completed {
        candidates: usize,
        matches: usize,
        duration_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Scan(ScanEvent::Progress(ScanProgress {
            processed: 10,
            total: 50,
            ..Default::default()
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Scan(ScanEvent::Progress(p)) => {
                assert_eq!(p.processed, 10);
                assert_eq!(p.total, 50);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn progress_percent_handles_empty_scan() {
        let progress = ScanProgress::default();
        assert_eq!(progress.percent(), 100.0);

        let half = ScanProgress {
            processed: 5,
            total: 10,
            ..Default::default()
        };
        assert!((half.percent() - 50.0).abs() < f64::EPSILON);
    }
}
