//! Stale-result guard for callers that issue overlapping searches.
//!
//! Each search takes a ticket; when its result arrives the caller checks
//! whether a newer search has started since and drops the result if so.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SearchSequence {
    latest: AtomicU64,
}

impl SearchSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket newer than every ticket issued before
    pub fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
