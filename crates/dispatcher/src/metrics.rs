//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records handed to the sink's backing store
    delivered_count: AtomicU64,
    /// Records dropped by the sink's own policy
    skipped_count: AtomicU64,
    /// Fatal outcomes
    fatal_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total delivered count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Increment delivered count
    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get skipped count
    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    /// Increment skipped count
    pub fn inc_skipped_count(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get fatal count
    pub fn fatal_count(&self) -> u64 {
        self.fatal_count.load(Ordering::Relaxed)
    }

    /// Increment fatal count
    pub fn inc_fatal_count(&self) {
        self.fatal_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            delivered_count: self.delivered_count(),
            skipped_count: self.skipped_count(),
            fatal_count: self.fatal_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub delivered_count: u64,
    pub skipped_count: u64,
    pub fatal_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = SinkMetrics::new();
        metrics.inc_delivered_count();
        metrics.inc_delivered_count();
        metrics.inc_skipped_count();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delivered_count, 2);
        assert_eq!(snapshot.skipped_count, 1);
        assert_eq!(snapshot.fatal_count, 0);
    }
}
