//! Metrics collection and exposition.
//!
//! # Metrics
//! - `large_response_classifications_total` (counter): guard outcomes by `outcome`
//! - `large_response_size_mb` (histogram): approximate response size seen by the guard
//! - `large_response_offloads_total` (counter): storage writes by `result`
//! - `large_response_dereferences_total` (counter): client fetches by `result`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed by the server binary

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one guard decision.
pub fn record_classification(outcome: &'static str, size_mb: f64) {
    counter!("large_response_classifications_total", "outcome" => outcome).increment(1);
    histogram!("large_response_size_mb").record(size_mb);
}

/// Record one storage write.
pub fn record_offload(result: &'static str) {
    counter!("large_response_offloads_total", "result" => result).increment(1);
}

/// Record one client-side dereference.
pub fn record_dereference(result: &'static str) {
    counter!("large_response_dereferences_total", "result" => result).increment(1);
}
