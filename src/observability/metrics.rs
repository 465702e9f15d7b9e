//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_requests_admitted_total` (counter): requests that passed every check
//! - `gatekeeper_requests_rejected_total` (counter): rejections by `reason`
//! - `gatekeeper_blocks_total` (counter): blocks by `scope` (address, subnet)
//! - `gatekeeper_tracked_addresses` (gauge): addresses with failure state
//! - `gatekeeper_subnet_blocks` (gauge): live /24 blocks
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admitted() {
    counter!("gatekeeper_requests_admitted_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("gatekeeper_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_block(scope: &'static str) {
    counter!("gatekeeper_blocks_total", "scope" => scope).increment(1);
}

pub fn record_tracker_size(addresses: usize, subnets: usize) {
    gauge!("gatekeeper_tracked_addresses").set(addresses as f64);
    gauge!("gatekeeper_subnet_blocks").set(subnets as f64);
}
