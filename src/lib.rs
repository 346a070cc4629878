//! # Image Finder
//!
//! Indexes image collections by perceptual fingerprint and finds images
//! that look like a query image, including RAW files against their exports.
//!
//! ## Architecture
//! - `core` - The indexing and search engine
//! - `events` - Event-driven progress reporting
//! - `error` - Error types with enough context to act on

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{ImageFinderError, Result};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the library
///
/// Called by the application entry point. `RUST_LOG` takes precedence;
/// otherwise the level is `info`, or `debug` when `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed, e.g. by a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
