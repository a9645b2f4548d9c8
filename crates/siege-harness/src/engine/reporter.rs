use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::metrics::{MetricsAggregator, MetricsSnapshot};

/// One printed stats line: constructed, rendered, discarded.
#[derive(Debug, Clone, Copy)]
pub struct StatsSample {
    pub elapsed: Duration,
    pub connected_total: u64,
    pub disconnected_total: u64,
    pub error_total: u64,
    pub message_total: u64,
    /// Messages since the previous sample, over the sample interval.
    pub rate: f64,
}

impl StatsSample {
    pub fn render(&self) -> String {
        format!(
            "[{}s] Connected: {} | Disconnected: {} | Errors: {} | Messages: {} | Rate: {:.1}/s",
            self.elapsed.as_secs(),
            self.connected_total,
            self.disconnected_total,
            self.error_total,
            self.message_total,
            self.rate,
        )
    }
}

/// Turns successive snapshots into samples. Quiet until the aggregator
/// records its first counter change, so no all-zero rate line is printed.
#[derive(Debug)]
pub struct RateTracker {
    interval: Duration,
    last_message_total: u64,
}

impl RateTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_message_total: 0,
        }
    }

    pub fn observe(&mut self, snapshot: MetricsSnapshot) -> Option<StatsSample> {
        if !snapshot.has_activity() {
            return None;
        }
        let delta = snapshot.message_total - self.last_message_total;
        self.last_message_total = snapshot.message_total;
        Some(StatsSample {
            elapsed: snapshot.elapsed(),
            connected_total: snapshot.connected_total,
            disconnected_total: snapshot.disconnected_total,
            error_total: snapshot.error_total,
            message_total: snapshot.message_total,
            rate: delta as f64 / self.interval.as_secs_f64(),
        })
    }
}

/// Periodic snapshot-and-print loop. Runs beside the workers and never
/// blocks them; a failed write is logged and skipped, not propagated.
pub struct StatsReporter {
    metrics: Arc<MetricsAggregator>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl StatsReporter {
    pub fn new(
        metrics: Arc<MetricsAggregator>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            metrics,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // A late tick must not produce a burst of catch-up samples.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tracker = RateTracker::new(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(sample) = tracker.observe(self.metrics.snapshot()) {
                        emit(&sample);
                    }
                }
            }
        }
    }
}

fn emit(sample: &StatsSample) {
    let mut out = io::stdout();
    if let Err(e) = writeln!(out, "{}", sample.render()).and_then(|_| out.flush()) {
        warn!(error = %e, "failed to write stats line");
    }
}
