use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};

use crate::metrics::MetricsSnapshot;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref CONNECTED_TOTAL: IntGauge = IntGauge::new(
        "siege_connected_total",
        "Total successful connection establishments across the pool"
    )
    .expect("metric can be created");
    pub static ref DISCONNECTED_TOTAL: IntGauge = IntGauge::new(
        "siege_disconnected_total",
        "Total connection closures after a successful establishment"
    )
    .expect("metric can be created");
    pub static ref ERROR_TOTAL: IntGauge = IntGauge::new(
        "siege_error_total",
        "Total failed connection attempts and abnormal closures"
    )
    .expect("metric can be created");
    pub static ref MESSAGE_TOTAL: IntGauge = IntGauge::new(
        "siege_message_total",
        "Total messages received across all connections"
    )
    .expect("metric can be created");
    pub static ref ACTIVE_CONNECTIONS: Gauge = Gauge::new(
        "siege_active_connections",
        "Number of workers currently holding an open connection"
    )
    .expect("metric can be created");
}

pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(CONNECTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DISCONNECTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERROR_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MESSAGE_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_CONNECTIONS.clone()));
}

fn update_metrics(snapshot: &MetricsSnapshot, active_connections: usize) {
    CONNECTED_TOTAL.set(snapshot.connected_total as i64);
    DISCONNECTED_TOTAL.set(snapshot.disconnected_total as i64);
    ERROR_TOTAL.set(snapshot.error_total as i64);
    MESSAGE_TOTAL.set(snapshot.message_total as i64);
    ACTIVE_CONNECTIONS.set(active_connections as f64);
}

/// Prometheus text exposition, refreshed from an aggregator snapshot at
/// scrape time.
pub fn render_metrics(snapshot: &MetricsSnapshot, active_connections: usize) -> String {
    update_metrics(snapshot, active_connections);

    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| "# Error: Invalid UTF8".to_string())
}
