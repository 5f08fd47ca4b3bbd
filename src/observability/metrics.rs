//! Metrics collection and exposition.
//!
//! # Metrics
//! - `migration_proxy_requests_total` (counter): by category, backend, status
//! - `migration_proxy_request_duration_seconds` (histogram): by backend
//! - `migration_proxy_forbidden_total` (counter): rejected requests
//! - `migration_proxy_policy_updates_total` (counter): admin mutations by kind
//! - `migration_proxy_percentage` (gauge): current rollout percentage
//!
//! Recording is a no-op until a recorder is installed, so tests and the
//! check mode pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(category: &'static str, backend: &'static str, status: u16, start: Instant) {
    counter!(
        "migration_proxy_requests_total",
        "category" => category,
        "backend" => backend,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("migration_proxy_request_duration_seconds", "backend" => backend)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_forbidden() {
    counter!("migration_proxy_forbidden_total").increment(1);
}

pub fn record_policy_update(kind: &'static str) {
    counter!("migration_proxy_policy_updates_total", "kind" => kind).increment(1);
}

pub fn set_percentage(percentage: u8) {
    gauge!("migration_proxy_percentage").set(f64::from(percentage));
}
