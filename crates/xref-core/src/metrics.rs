//! Run metrics for the indexer.
//!
//! Counts emitted records and merged output, and tracks merge latency.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Atomic counters for one indexing run.
pub struct RunMetrics {
    /// Target records emitted
    pub target_records: AtomicU64,
    /// Source records emitted
    pub source_records: AtomicU64,
    /// Structured records emitted
    pub structured_records: AtomicU64,
    /// Occurrences dropped before emission (bad token, template filter)
    pub dropped_occurrences: AtomicU64,
    /// Output files merged into the database
    pub files_merged: AtomicU64,
    /// Lines written by merges
    pub lines_written: AtomicU64,
    /// New lines skipped because they were already present
    pub lines_deduplicated: AtomicU64,
    /// Merge latency samples
    pub merge_latency: LatencyTracker,
    start_time: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            target_records: AtomicU64::new(0),
            source_records: AtomicU64::new(0),
            structured_records: AtomicU64::new(0),
            dropped_occurrences: AtomicU64::new(0),
            files_merged: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
            lines_deduplicated: AtomicU64::new(0),
            merge_latency: LatencyTracker::default(),
            start_time: Instant::now(),
        }
    }

    pub fn record_target(&self) {
        self.target_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source(&self) {
        self.source_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_structured(&self) {
        self.structured_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_occurrences.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed file merge.
    pub fn record_merge(&self, written: u64, deduplicated: u64, latency: Duration) {
        self.files_merged.fetch_add(1, Ordering::Relaxed);
        self.lines_written.fetch_add(written, Ordering::Relaxed);
        self.lines_deduplicated
            .fetch_add(deduplicated, Ordering::Relaxed);
        self.merge_latency.record(latency);
    }

    /// Total records emitted of any kind.
    pub fn records_total(&self) -> u64 {
        self.target_records.load(Ordering::Relaxed)
            + self.source_records.load(Ordering::Relaxed)
            + self.structured_records.load(Ordering::Relaxed)
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Sliding window of the most recent merge durations.
pub struct LatencyTracker {
    window: RwLock<VecDeque<Duration>>,
    capacity: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Add a sample, evicting the oldest once the window is full.
    pub fn record(&self, duration: Duration) {
        let mut window = self.window.write();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(duration);
    }

    pub fn p50(&self) -> Duration {
        self.percentile(0.50)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(0.99)
    }

    /// Nearest-rank percentile of the window; zero when empty.
    pub fn percentile(&self, p: f64) -> Duration {
        let mut sorted: Vec<Duration> = self.window.read().iter().copied().collect();
        if sorted.is_empty() {
            return Duration::ZERO;
        }
        sorted.sort_unstable();
        let rank = (sorted.len() as f64 * p.clamp(0.0, 1.0)) as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    /// Slowest sample in the window.
    pub fn max(&self) -> Duration {
        self.window.read().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn len(&self) -> usize {
        self.window.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counters() {
        let metrics = RunMetrics::new();
        metrics.record_target();
        metrics.record_source();
        metrics.record_source();
        metrics.record_structured();

        assert_eq!(metrics.source_records.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.records_total(), 4);
    }

    #[test]
    fn test_record_merge() {
        let metrics = RunMetrics::new();
        metrics.record_merge(10, 3, Duration::from_millis(4));
        metrics.record_merge(5, 0, Duration::from_millis(2));

        assert_eq!(metrics.files_merged.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.lines_written.load(Ordering::Relaxed), 15);
        assert_eq!(metrics.lines_deduplicated.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.merge_latency.len(), 2);
        assert_eq!(metrics.merge_latency.max(), Duration::from_millis(4));
    }

    #[test]
    fn test_merge_latency_percentiles() {
        let tracker = LatencyTracker::new(200);
        for ms in (1..=100).rev() {
            tracker.record(Duration::from_millis(ms));
        }

        assert_eq!(tracker.p50(), Duration::from_millis(51));
        assert_eq!(tracker.p99(), Duration::from_millis(100));
        assert_eq!(tracker.percentile(0.0), Duration::from_millis(1));
    }

    #[test]
    fn test_merge_latency_window_evicts_oldest() {
        let tracker = LatencyTracker::new(3);
        assert!(tracker.is_empty());
        assert_eq!(tracker.p50(), Duration::ZERO);

        for ms in [40, 1, 2, 3] {
            tracker.record(Duration::from_millis(ms));
        }
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.max(), Duration::from_millis(3));
    }
}
