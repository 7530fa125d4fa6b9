//! Writer pool metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for the writer pool
#[derive(Debug, Default)]
pub struct PersistMetrics {
    /// Current queue length (approximate)
    queue_len: AtomicUsize,
    /// Total successful writes
    write_count: AtomicU64,
    /// Total write failures
    failure_count: AtomicU64,
    /// Writes executed on the submitting task because the queue was full
    sync_fallback_writes: AtomicU64,
}

impl PersistMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_fallback_writes(&self) -> u64 {
        self.sync_fallback_writes.load(Ordering::Relaxed)
    }

    pub fn inc_sync_fallback(&self) {
        self.sync_fallback_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all metrics
    pub fn snapshot(&self) -> PersistSnapshot {
        PersistSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            sync_fallback_writes: self.sync_fallback_writes(),
        }
    }
}

/// Snapshot of writer metrics (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub sync_fallback_writes: u64,
}
