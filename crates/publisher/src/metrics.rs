//! Publisher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single publisher target
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    /// Requests accepted into the queue
    queued_count: AtomicU64,
    /// Requests delivered to the broker
    published_count: AtomicU64,
    /// Requests abandoned after the retry budget
    failed_count: AtomicU64,
    /// Requests dropped because the queue was full or closed
    dropped_count: AtomicU64,
    /// Hook invocations that panicked
    hook_panic_count: AtomicU64,
    /// Successful (re)connects
    connect_count: AtomicU64,
}

impl PublisherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued_count(&self) -> u64 {
        self.queued_count.load(Ordering::Relaxed)
    }

    pub fn inc_queued_count(&self) {
        self.queued_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published_count(&self) -> u64 {
        self.published_count.load(Ordering::Relaxed)
    }

    pub fn inc_published_count(&self) {
        self.published_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::Relaxed)
    }

    pub fn inc_failed_count(&self) {
        self.failed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hook_panic_count(&self) -> u64 {
        self.hook_panic_count.load(Ordering::Relaxed)
    }

    pub fn inc_hook_panic_count(&self) {
        self.hook_panic_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::Relaxed)
    }

    pub fn inc_connect_count(&self) {
        self.connect_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued_count: self.queued_count(),
            published_count: self.published_count(),
            failed_count: self.failed_count(),
            dropped_count: self.dropped_count(),
            hook_panic_count: self.hook_panic_count(),
            connect_count: self.connect_count(),
        }
    }
}

/// Snapshot of publisher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queued_count: u64,
    pub published_count: u64,
    pub failed_count: u64,
    pub dropped_count: u64,
    pub hook_panic_count: u64,
    pub connect_count: u64,
}
