//! Cooperative cancellation shared between a caller and a running scan or search.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Once cancelled, no new tasks are launched and queued tasks finish as
/// cancelled without decoding. Work already decoding runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
