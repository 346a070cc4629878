//! Two-stage similarity search: hash prefilter, then pixel verification.

use super::bounds::{FormatRelation, HashBounds};
use super::filename::filenames_related;
use crate::core::decoder::DecoderRegistry;
use crate::core::fingerprint::{compute_fingerprint, pixel_similarity, Fingerprint};
use crate::core::format::{FormatCategory, FormatClassifier};
use crate::core::pipeline::{default_worker_count, panic_message, CancellationToken, WorkerSlots};
use crate::core::store::{FingerprintRecord, FingerprintStore};
use crate::error::{ImageFinderError, SearchError};
use crate::events::{null_sender, EventSender, SearchEvent};
use crossbeam_channel::unbounded;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the search engine
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Concurrent candidate verifications
    pub max_workers: usize,
    pub slot_timeout: Duration,
    pub slot_attempts: u32,
    /// Bounds when query and candidate are the same kind of file
    pub strict_bounds: HashBounds,
    /// Bounds for RAW against a rendered format
    pub relaxed_bounds: HashBounds,
    /// Multiplier applied to the threshold for RAW/rendered pairs
    pub cross_format_threshold_factor: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_worker_count(),
            slot_timeout: Duration::from_secs(30),
            slot_attempts: 4,
            strict_bounds: HashBounds::strict(),
            relaxed_bounds: HashBounds::relaxed(),
            cross_format_threshold_factor: 0.8,
        }
    }
}

impl SearchConfig {
    /// Prefilter bounds for a pair.
    ///
    /// A RAW/rendered pair whose filenames are related always goes on to
    /// verification.
    pub fn bounds_for(&self, relation: FormatRelation, related_names: bool) -> HashBounds {
        match relation {
            FormatRelation::SameClass => self.strict_bounds,
            FormatRelation::CrossFormat if related_names => HashBounds::disabled(),
            FormatRelation::CrossFormat => self.relaxed_bounds,
        }
    }

    /// Minimum pixel similarity a candidate must reach
    pub fn effective_threshold(&self, threshold: f64, relation: FormatRelation) -> f64 {
        if relation.is_cross_format() {
            threshold * self.cross_format_threshold_factor
        } else {
            threshold
        }
    }
}

/// A search request
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub path: PathBuf,
    /// Minimum pixel similarity, 0.0 to 1.0
    pub threshold: f64,
    /// Only search records with this prefix
    pub source_prefix: Option<String>,
}

impl SearchQuery {
    pub fn new(path: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            path: path.into(),
            threshold,
            source_prefix: None,
        }
    }

    pub fn source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = Some(prefix.into());
        self
    }
}

/// A record that passed the hash prefilter
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub record: FingerprintRecord,
    pub category: FormatCategory,
    pub relation: FormatRelation,
    pub related_names: bool,
    pub average_distance: u32,
    pub perceptual_distance: u32,
}

/// A verified match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub path: PathBuf,
    pub source_prefix: String,
    /// Pixel similarity to the query, higher is more similar
    pub similarity_score: f64,
    pub is_raw_format: bool,
}

/// Ranked matches plus what happened along the way
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchReport {
    pub matches: Vec<MatchResult>,
    /// Records read from the index
    pub records_examined: usize,
    /// Records that passed the prefilter
    pub candidates: usize,
    /// Candidates decoded and scored
    pub verified: usize,
    /// Candidates no longer on disk
    pub skipped_missing: usize,
    /// Candidates that could not be decoded
    pub failed: usize,
    /// Candidates that never got a worker slot
    pub abandoned: usize,
    pub duration_ms: u64,
}

enum Verification {
    Scored(Option<MatchResult>),
    Missing,
    Failed,
    Abandoned,
}

/// Sort best match first. Equal scores keep no particular order.
pub fn rank_matches(matches: &mut [MatchResult]) {
    matches.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
}

/// Finds indexed images that look like a query image
pub struct SearchEngine {
    store: Arc<dyn FingerprintStore>,
    decoders: DecoderRegistry,
    config: SearchConfig,
    classifier: FormatClassifier,
    cancel: CancellationToken,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn FingerprintStore>, decoders: DecoderRegistry, config: SearchConfig) -> Self {
        Self {
            store,
            decoders,
            config,
            classifier: FormatClassifier::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Ranked matches for `query`
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<MatchResult>, ImageFinderError> {
        Ok(self.search_with_events(query, &null_sender())?.matches)
    }

    pub fn search_with_events(
        &self,
        query: &SearchQuery,
        events: &EventSender,
    ) -> Result<SearchReport, ImageFinderError> {
        let start_time = Instant::now();

        if !(0.0..=1.0).contains(&query.threshold) {
            return Err(SearchError::InvalidThreshold {
                value: query.threshold,
            }
            .into());
        }

        let (query_image, fingerprint, query_category) = self.fingerprint_query(&query.path)?;
        let records = self.store.query_by_prefix(query.source_prefix.as_deref())?;
        let records_examined = records.len();

        info!(
            "Searching {} records for images like {}",
            records_examined,
            query.path.display()
        );
        events.search(SearchEvent::Started {
            query: query.path.clone(),
            records: records_examined,
        });

        let candidates = self.select_candidates(&query.path, query_category, &fingerprint, records);
        for candidate in &candidates {
            events.search(SearchEvent::CandidateFound {
                path: candidate.record.path.display().to_string(),
                average_distance: candidate.average_distance,
                perceptual_distance: candidate.perceptual_distance,
            });
        }
        debug!("{} of {} records passed the prefilter", candidates.len(), records_examined);

        let mut report = self.verify(&query_image, query.threshold, &candidates, events)?;
        report.records_examined = records_examined;
        report.candidates = candidates.len();
        rank_matches(&mut report.matches);
        report.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Search complete: {} matches from {} candidates in {}ms",
            report.matches.len(),
            report.candidates,
            report.duration_ms
        );
        events.search(SearchEvent::Completed {
            candidates: report.candidates,
            matches: report.matches.len(),
            duration_ms: report.duration_ms,
        });

        Ok(report)
    }

    /// Records whose hashes are close enough to the query to be worth decoding
    pub fn select_candidates(
        &self,
        query_path: &Path,
        query_category: FormatCategory,
        fingerprint: &Fingerprint,
        records: Vec<FingerprintRecord>,
    ) -> Vec<MatchCandidate> {
        records
            .into_iter()
            .filter_map(|record| {
                let category = self.classifier.classify(&record.path);
                let relation = FormatRelation::between(query_category, category);
                let related_names = relation.is_cross_format() && filenames_related(query_path, &record.path);
                let (average_distance, perceptual_distance) =
                    fingerprint.distances(&record.average_hash, &record.perceptual_hash);

                self.config
                    .bounds_for(relation, related_names)
                    .admits(average_distance, perceptual_distance)
                    .then_some(MatchCandidate {
                        record,
                        category,
                        relation,
                        related_names,
                        average_distance,
                        perceptual_distance,
                    })
            })
            .collect()
    }

    fn fingerprint_query(&self, path: &Path) -> Result<(GrayImage, Fingerprint, FormatCategory), SearchError> {
        if !path.is_file() {
            return Err(SearchError::QueryNotFound {
                path: path.to_path_buf(),
            });
        }

        let category = self.classifier.classify(path);
        if !category.is_supported() {
            return Err(SearchError::UnsupportedQuery {
                path: path.to_path_buf(),
            });
        }

        let image = self
            .decoders
            .decode(path, category)
            .map_err(SearchError::QueryDecode)?;
        let fingerprint = compute_fingerprint(&image).map_err(SearchError::QueryDecode)?;
        Ok((image, fingerprint, category))
    }

    /// Decode and score candidates on a bounded pool
    fn verify(
        &self,
        query_image: &GrayImage,
        threshold: f64,
        candidates: &[MatchCandidate],
        events: &EventSender,
    ) -> Result<SearchReport, ImageFinderError> {
        let mut report = SearchReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }

        let workers = self.config.max_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("verify-worker-{}", index))
            .build()
            .map_err(|e| ImageFinderError::Config(format!("failed to start verification pool: {}", e)))?;
        let slots = WorkerSlots::new(workers);
        let (sender, receiver) = unbounded::<Verification>();

        pool.in_place_scope(|scope| {
            for candidate in candidates {
                if self.cancel.is_cancelled() {
                    break;
                }

                let permit = match slots.acquire(self.config.slot_timeout, self.config.slot_attempts) {
                    Ok(permit) => permit,
                    Err(attempts) => {
                        warn!(
                            "Gave up verifying {} after {} waits for a worker slot",
                            candidate.record.path.display(),
                            attempts
                        );
                        let _ = sender.send(Verification::Abandoned);
                        continue;
                    }
                };

                let sender = sender.clone();
                scope.spawn(move |_| {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        self.verify_candidate(query_image, threshold, candidate, events)
                    }))
                    .unwrap_or_else(|panic| {
                        warn!(
                            "Verification of {} panicked: {}",
                            candidate.record.path.display(),
                            panic_message(panic.as_ref())
                        );
                        Verification::Failed
                    });
                    let _ = sender.send(outcome);
                    drop(permit);
                });
            }
        });
        drop(sender);

        if self.cancel.is_cancelled() {
            return Err(SearchError::Cancelled.into());
        }

        for outcome in receiver.iter() {
            match outcome {
                Verification::Scored(accepted) => {
                    report.verified += 1;
                    report.matches.extend(accepted);
                }
                Verification::Missing => report.skipped_missing += 1,
                Verification::Failed => report.failed += 1,
                Verification::Abandoned => report.abandoned += 1,
            }
        }

        Ok(report)
    }

    fn verify_candidate(
        &self,
        query_image: &GrayImage,
        threshold: f64,
        candidate: &MatchCandidate,
        events: &EventSender,
    ) -> Verification {
        let path = &candidate.record.path;

        match std::fs::metadata(path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Skipping {}: no longer on disk", path.display());
                return Verification::Missing;
            }
            Err(e) => {
                warn!("Cannot access candidate {}: {}", path.display(), e);
                return Verification::Failed;
            }
        }

        let image = match self.decoders.decode(path, candidate.category) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to load candidate {}: {}", path.display(), e);
                return Verification::Failed;
            }
        };

        let score = pixel_similarity(query_image, &image);
        let required = self.config.effective_threshold(threshold, candidate.relation);
        if score < required {
            debug!(
                "Rejected {}: similarity {:.4} below {:.4}",
                path.display(),
                score,
                required
            );
            return Verification::Scored(None);
        }

        events.search(SearchEvent::MatchConfirmed {
            path: path.display().to_string(),
            similarity_score: score,
        });
        Verification::Scored(Some(MatchResult {
            path: path.clone(),
            source_prefix: candidate.record.source_prefix.clone(),
            similarity_score: score,
            is_raw_format: candidate.record.is_raw_format,
        }))
    }
}
