//! Observability metrics for the signal pipeline.
//!
//! All counters use atomic operations for thread-safe updates and reads, and
//! can be queried at any time via [`KernelMetrics::snapshot`].

use crate::domain::signal::ProcessingStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking pipeline outcomes.
#[derive(Debug, Clone)]
pub struct KernelMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    processed: AtomicU64,
    denied: AtomicU64,
    failed: AtomicU64,
    throttled: AtomicU64,
    ignored: AtomicU64,
    /// Calls rejected by an open circuit breaker
    breaker_rejections: AtomicU64,
    /// Attempts rejected by a retry ceiling
    throttle_rejections: AtomicU64,
}

impl KernelMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                processed: AtomicU64::new(0),
                denied: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                throttled: AtomicU64::new(0),
                ignored: AtomicU64::new(0),
                breaker_rejections: AtomicU64::new(0),
                throttle_rejections: AtomicU64::new(0),
            }),
        }
    }

    /// Record a terminal status.
    pub(crate) fn record_status(&self, status: ProcessingStatus) {
        let counter = match status {
            ProcessingStatus::Processed => &self.inner.processed,
            ProcessingStatus::Denied => &self.inner.denied,
            ProcessingStatus::Failed => &self.inner.failed,
            ProcessingStatus::Throttled => &self.inner.throttled,
            ProcessingStatus::Ignored => &self.inner.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejection by an open breaker.
    pub(crate) fn record_breaker_rejection(&self) {
        self.inner.breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejection by a retry ceiling.
    pub(crate) fn record_throttle_rejection(&self) {
        self.inner
            .throttle_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.inner.processed.load(Ordering::Relaxed),
            denied: self.inner.denied.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            throttled: self.inner.throttled.load(Ordering::Relaxed),
            ignored: self.inner.ignored.load(Ordering::Relaxed),
            breaker_rejections: self.inner.breaker_rejections.load(Ordering::Relaxed),
            throttle_rejections: self.inner.throttle_rejections.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.inner.processed.store(0, Ordering::Relaxed);
        self.inner.denied.store(0, Ordering::Relaxed);
        self.inner.failed.store(0, Ordering::Relaxed);
        self.inner.throttled.store(0, Ordering::Relaxed);
        self.inner.ignored.store(0, Ordering::Relaxed);
        self.inner.breaker_rejections.store(0, Ordering::Relaxed);
        self.inner.throttle_rejections.store(0, Ordering::Relaxed);
    }
}

impl Default for KernelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of pipeline metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub denied: u64,
    pub failed: u64,
    pub throttled: u64,
    pub ignored: u64,
    pub breaker_rejections: u64,
    pub throttle_rejections: u64,
}

impl MetricsSnapshot {
    /// Total signals that reached a terminal status.
    pub fn total(&self) -> u64 {
        self.processed
            .saturating_add(self.denied)
            .saturating_add(self.failed)
            .saturating_add(self.throttled)
            .saturating_add(self.ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_each_status() {
        let metrics = KernelMetrics::new();
        metrics.record_status(ProcessingStatus::Processed);
        metrics.record_status(ProcessingStatus::Processed);
        metrics.record_status(ProcessingStatus::Denied);
        metrics.record_status(ProcessingStatus::Throttled);

        let snap = metrics.snapshot();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.denied, 1);
        assert_eq!(snap.throttled, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.total(), 4);
    }

    #[test]
    fn test_reset() {
        let metrics = KernelMetrics::new();
        metrics.record_status(ProcessingStatus::Failed);
        metrics.record_breaker_rejection();
        metrics.record_throttle_rejection();

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_clone_shares_counters() {
        let metrics = KernelMetrics::new();
        let clone = metrics.clone();
        clone.record_status(ProcessingStatus::Ignored);
        assert_eq!(metrics.snapshot().ignored, 1);
    }
}
