use siege_common::{PoolConfig, StatsConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::reporter::StatsReporter;
use crate::engine::worker::{ConnectionWorker, PhaseBoard, WorkerSettings};
use crate::metrics::MetricsAggregator;
use crate::transport::{Endpoint, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Cumulative totals printed once, after every worker is accounted for or
/// the grace period elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSummary {
    pub connected_total: u64,
    pub disconnected_total: u64,
    pub error_total: u64,
    pub message_total: u64,
    /// Workers still blocked past the grace period; abandoned, not killed.
    pub unaccounted_workers: usize,
}

impl PoolSummary {
    pub fn render(&self) -> String {
        let mut out = format!(
            "\n=== Final Stats ===\n\
             Total Connected: {}\n\
             Total Disconnected: {}\n\
             Total Errors: {}\n\
             Total Messages: {}",
            self.connected_total, self.disconnected_total, self.error_total, self.message_total,
        );
        if self.unaccounted_workers > 0 {
            out.push_str(&format!(
                "\nUnaccounted Workers: {}",
                self.unaccounted_workers
            ));
        }
        out
    }
}

/// Owns the worker set and the shutdown signal. Staggers worker launches on
/// the way up; on the way down broadcasts cancellation once and drains every
/// worker within a shared grace deadline.
pub struct PoolSupervisor {
    pool: PoolConfig,
    stats: StatsConfig,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsAggregator>,
    phases: Arc<PhaseBoard>,
    shutdown: CancellationToken,
    state: PoolState,
    workers: Vec<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
    summary: Option<PoolSummary>,
}

impl PoolSupervisor {
    pub fn new(
        pool: PoolConfig,
        stats: StatsConfig,
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            pool,
            stats,
            endpoint,
            transport,
            metrics: Arc::new(MetricsAggregator::new()),
            phases: Arc::new(PhaseBoard::new()),
            shutdown: CancellationToken::new(),
            state: PoolState::Idle,
            workers: Vec::new(),
            reporter: None,
            summary: None,
        }
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.metrics)
    }

    pub fn phases(&self) -> Arc<PhaseBoard> {
        Arc::clone(&self.phases)
    }

    /// Launch the reporter and all workers, pausing the stagger delay
    /// between successive launches so the pool does not open every
    /// connection against the target at once.
    pub async fn start(&mut self) {
        if self.state != PoolState::Idle {
            return;
        }
        self.state = PoolState::Starting;
        info!(
            workers = self.pool.worker_count,
            endpoint = %self.endpoint.url(),
            "pool starting"
        );

        let reporter = StatsReporter::new(
            Arc::clone(&self.metrics),
            Duration::from_secs(self.stats.interval_secs),
            self.shutdown.clone(),
        );
        self.reporter = Some(tokio::spawn(reporter.run()));

        let settings = WorkerSettings::from(&self.pool);
        let stagger = Duration::from_millis(self.pool.stagger_ms);
        for id in 0..self.pool.worker_count {
            if id > 0 {
                tokio::time::sleep(stagger).await;
            }
            let worker = ConnectionWorker::new(
                id,
                self.endpoint.clone(),
                Arc::clone(&self.transport),
                settings,
                Arc::clone(&self.metrics),
                Arc::clone(&self.phases),
                self.shutdown.clone(),
            );
            self.workers.push(tokio::spawn(worker.run()));
            if (id + 1) % 50 == 0 {
                println!("Spawned {}/{} workers...", id + 1, self.pool.worker_count);
            }
        }

        self.state = PoolState::Running;
        info!(workers = self.pool.worker_count, "pool running");
        println!(
            "All {} workers launched. Press Ctrl+C to stop.",
            self.pool.worker_count
        );
    }

    /// `start()`, block on the interrupt, then `stop()`.
    pub async fn run<F>(&mut self, interrupt: F) -> PoolSummary
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        interrupt.await;
        self.stop().await
    }

    /// Broadcast the shutdown signal and drain every worker within the grace
    /// deadline. Handles still pending at the deadline are dropped: the
    /// task is abandoned, never aborted, since the transport may not support
    /// forced cancellation. Idempotent: a second call returns the same
    /// summary and performs no work.
    pub async fn stop(&mut self) -> PoolSummary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }
        self.state = PoolState::Stopping;
        info!("pool stopping");
        self.shutdown.cancel();

        let grace = Duration::from_millis(self.pool.grace_period_ms);
        let deadline = tokio::time::Instant::now() + grace;
        let mut unaccounted = 0usize;
        for handle in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, handle).await.is_err() {
                unaccounted += 1;
            }
        }
        if let Some(reporter) = self.reporter.take() {
            let _ = reporter.await;
        }
        if unaccounted > 0 {
            warn!(unaccounted, "workers still blocked past the grace period");
        }

        self.state = PoolState::Stopped;
        info!("pool stopped");

        let snapshot = self.metrics.snapshot();
        let summary = PoolSummary {
            connected_total: snapshot.connected_total,
            disconnected_total: snapshot.disconnected_total,
            error_total: snapshot.error_total,
            message_total: snapshot.message_total,
            unaccounted_workers: unaccounted,
        };
        println!("{}", summary.render());
        self.summary = Some(summary.clone());
        summary
    }
}
