//! Metrics collection and exposition.
//!
//! # Metrics
//! - `capture_entries_total` (counter): entries handed to the sink
//! - `capture_publish_failures_total` (counter): sink refusals
//! - `capture_serialize_failures_total` (counter): entries that failed to encode
//! - `capture_failures_total` (counter): body materialization failures
//! - `capture_skipped_total` (counter): requests excluded from capture
//! - `capture_archived_total` (counter): entries filed under a mapping

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_enqueued() {
    counter!("capture_entries_total").increment(1);
}

pub fn record_publish_failure() {
    counter!("capture_publish_failures_total").increment(1);
}

pub fn record_serialize_failure() {
    counter!("capture_serialize_failures_total").increment(1);
}

pub fn record_capture_failure() {
    counter!("capture_failures_total").increment(1);
}

pub fn record_skipped() {
    counter!("capture_skipped_total").increment(1);
}

pub fn record_archived(outcome: &'static str) {
    counter!("capture_archived_total", "outcome" => outcome).increment(1);
}
