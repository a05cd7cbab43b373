//! Metrics collection and exposition.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record an admitted connection.
pub(crate) fn record_accepted() {
    counter!("server_connections_accepted_total").increment(1);
}

/// Record a connection denied by admission control.
pub(crate) fn record_denied(reason: &'static str) {
    counter!("server_connections_denied_total", "reason" => reason).increment(1);
}

/// Update the active-connection gauge.
pub(crate) fn set_active_connections(count: usize) {
    gauge!("server_active_connections").set(count as f64);
}
