//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the delivery pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub detected: AtomicU64,
    pub admitted: AtomicU64,
    pub denied: AtomicU64,
    pub abandoned: AtomicU64,
    pub uploaded: AtomicU64,
    pub failed: AtomicU64,
}

impl PipelineStats {
    /// Create a new shared stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get a snapshot of current counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            detected: self.detected.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            uploaded: self.uploaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub detected: u64,
    pub admitted: u64,
    pub denied: u64,
    pub abandoned: u64,
    pub uploaded: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    /// Jobs that reached a terminal state.
    #[must_use]
    pub const fn terminal(&self) -> u64 {
        self.uploaded + self.failed
    }
}
