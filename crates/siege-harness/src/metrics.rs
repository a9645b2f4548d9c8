use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// The four pool-wide lifecycle counters. Monotonic; never decremented;
/// reset only by process restart.
#[derive(Debug, Default)]
struct Counters {
    connected_total: u64,
    disconnected_total: u64,
    error_total: u64,
    message_total: u64,
    start_time: Option<Instant>,
}

/// Shared aggregation point for every worker's lifecycle events.
///
/// All increments go through one mutex so they are linearizable with respect
/// to each other, and a snapshot observes a state some real interleaving of
/// increments produced: a snapshot can never pair a later `message_total`
/// with an earlier `connected_total`.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    inner: Mutex<Counters>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connected(&self) {
        let mut counters = self.inner.lock();
        counters.start_time.get_or_insert_with(Instant::now);
        counters.connected_total += 1;
    }

    pub fn record_disconnected(&self) {
        let mut counters = self.inner.lock();
        counters.start_time.get_or_insert_with(Instant::now);
        counters.disconnected_total += 1;
    }

    pub fn record_error(&self) {
        let mut counters = self.inner.lock();
        counters.start_time.get_or_insert_with(Instant::now);
        counters.error_total += 1;
    }

    pub fn record_message(&self) {
        let mut counters = self.inner.lock();
        counters.start_time.get_or_insert_with(Instant::now);
        counters.message_total += 1;
    }

    /// Consistent read of all counters at one instant.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.inner.lock();
        MetricsSnapshot {
            connected_total: counters.connected_total,
            disconnected_total: counters.disconnected_total,
            error_total: counters.error_total,
            message_total: counters.message_total,
            started_at: counters.start_time,
        }
    }
}

/// Immutable, consistent view of the counters at one instant.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub connected_total: u64,
    pub disconnected_total: u64,
    pub error_total: u64,
    pub message_total: u64,
    /// Set once, on the first counter change the aggregator ever observed.
    pub started_at: Option<Instant>,
}

impl MetricsSnapshot {
    /// True once any counter has moved.
    pub fn has_activity(&self) -> bool {
        self.connected_total > 0
            || self.disconnected_total > 0
            || self.error_total > 0
            || self.message_total > 0
    }

    /// Time since the first observed activity; zero before any.
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}
