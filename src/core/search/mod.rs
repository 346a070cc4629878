//! # Search Module
//!
//! Finds indexed images that look like a query image.
//!
//! ## Two stages
//! 1. **Prefilter** - Hamming distances between the query's hashes and every
//!    record in scope. A record survives if either hash is within the bounds
//!    for its format relation. No decoding happens here.
//! 2. **Verify** - surviving candidates are decoded on a bounded pool and
//!    scored by pixel similarity against the decoded query.
//!
//! ## Format relations
//! | Query / candidate | Bounds (avg / pHash) | Threshold |
//! |-------------------|----------------------|-----------|
//! | same class | 10 / 12 | as given |
//! | RAW vs rendered | 20 / 20 | x 0.8 |
//! | RAW vs rendered, related names | 64 / 64 | x 0.8 |

mod bounds;
mod engine;
mod filename;

pub use bounds::{FormatRelation, HashBounds};
pub use engine::{
    rank_matches, MatchCandidate, MatchResult, SearchConfig, SearchEngine, SearchQuery, SearchReport,
};
pub use filename::filenames_related;
