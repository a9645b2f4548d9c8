use dashmap::DashMap;
use siege_common::PoolConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::MetricsAggregator;
use crate::transport::{Endpoint, Recv, StreamConnection, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Connecting,
    Connected,
    Disconnected,
    Stopped,
}

/// Per-worker phase record. Each worker writes only its own entry; the
/// supervisor and the metrics exporter read across entries.
#[derive(Debug, Default)]
pub struct PhaseBoard {
    phases: DashMap<usize, WorkerPhase>,
}

impl PhaseBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: usize, phase: WorkerPhase) {
        self.phases.insert(id, phase);
    }

    pub fn get(&self, id: usize) -> Option<WorkerPhase> {
        self.phases.get(&id).map(|entry| *entry.value())
    }

    pub fn count(&self, phase: WorkerPhase) -> usize {
        self.phases
            .iter()
            .filter(|entry| *entry.value() == phase)
            .count()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Minimum pause before retrying a failed or closed connection.
    pub backoff: Duration,
    /// Ceiling on one blocking receive; bounds how long shutdown can go
    /// unobserved.
    pub receive_timeout: Duration,
}

impl From<&PoolConfig> for WorkerSettings {
    fn from(pool: &PoolConfig) -> Self {
        Self {
            backoff: Duration::from_millis(pool.backoff_ms),
            receive_timeout: Duration::from_millis(pool.receive_timeout_ms),
        }
    }
}

/// One logical client slot: connect, consume until the connection ends,
/// back off, retry, until the shutdown signal is observed.
pub struct ConnectionWorker {
    id: usize,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    settings: WorkerSettings,
    metrics: Arc<MetricsAggregator>,
    phases: Arc<PhaseBoard>,
    shutdown: CancellationToken,
}

impl ConnectionWorker {
    pub fn new(
        id: usize,
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
        settings: WorkerSettings,
        metrics: Arc<MetricsAggregator>,
        phases: Arc<PhaseBoard>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            endpoint,
            transport,
            settings,
            metrics,
            phases,
            shutdown,
        }
    }

    pub async fn run(self) {
        // Attempt first, check the signal after: even a pool that is stopped
        // immediately has every worker attempt at least once.
        loop {
            self.attempt().await;
            if self.shutdown.is_cancelled() {
                break;
            }
            // Never retry tighter than the configured backoff; shutdown may
            // cut the wait short.
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.backoff) => {}
            }
        }
        self.phases.set(self.id, WorkerPhase::Stopped);
        debug!(worker = self.id, "worker stopped");
    }

    /// One connection lifecycle. An attempt that never reaches `Connected`
    /// counts toward `error_total` only; `disconnected_total` strictly means
    /// "was connected, now is not".
    async fn attempt(&self) {
        self.phases.set(self.id, WorkerPhase::Connecting);

        let conn = match self.transport.establish(&self.endpoint).await {
            Ok(conn) => conn,
            Err(e) => {
                debug!(worker = self.id, error = %e, "connect failed");
                self.metrics.record_error();
                return;
            }
        };

        self.phases.set(self.id, WorkerPhase::Connected);
        self.metrics.record_connected();
        debug!(worker = self.id, "connected");

        let closure = self.consume(conn).await;
        self.phases.set(self.id, WorkerPhase::Disconnected);
        self.metrics.record_disconnected();
        if let Closure::Abnormal(e) = closure {
            debug!(worker = self.id, error = %e, "connection dropped");
            self.metrics.record_error();
        }
    }

    /// Consume the connection until it ends or shutdown is observed.
    /// Cancellation is cooperative: the signal is checked between receives,
    /// never mid-message, and each receive is bounded by the ceiling.
    async fn consume(&self, mut conn: Box<dyn StreamConnection>) -> Closure {
        loop {
            if self.shutdown.is_cancelled() {
                conn.close().await;
                return Closure::Clean;
            }
            match conn.receive_next(self.settings.receive_timeout).await {
                Ok(Recv::Message(_payload)) => self.metrics.record_message(),
                Ok(Recv::Idle) => {}
                Ok(Recv::Closed) => return Closure::Clean,
                Err(e) => return Closure::Abnormal(e),
            }
        }
    }
}

enum Closure {
    Clean,
    Abnormal(TransportError),
}
