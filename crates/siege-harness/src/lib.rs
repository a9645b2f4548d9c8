pub mod engine;
pub mod export;
pub mod metrics;
pub mod transport;

pub use engine::supervisor::{PoolState, PoolSummary, PoolSupervisor};
pub use engine::worker::{ConnectionWorker, PhaseBoard, WorkerPhase, WorkerSettings};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
