//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_picks_total` (counter): node selections by service, strategy, outcome
//! - `dispatch_pool_acquire_total` (counter): pool checkouts by address, outcome
//! - `dispatch_connections_discarded_total` (counter): discards by address, reason
//! - `dispatch_pool_idle` (gauge): idle connections per address
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exporter is optional and started from config

use std::net::SocketAddr;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a node selection.
pub fn record_pick(service: &str, strategy: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "dispatch_picks_total",
        "service" => service.to_string(),
        "strategy" => strategy.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a pool checkout attempt.
pub fn record_acquire(address: &str, outcome: &'static str) {
    counter!(
        "dispatch_pool_acquire_total",
        "address" => address.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a connection discarded instead of recycled.
pub fn record_discard(address: &str, reason: &'static str) {
    counter!(
        "dispatch_connections_discarded_total",
        "address" => address.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record the current idle count of a pool.
pub fn record_pool_idle(address: &str, idle: usize) {
    gauge!("dispatch_pool_idle", "address" => address.to_string()).set(idle as f64);
}
