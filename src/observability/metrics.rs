//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_resolutions_total` (counter): resolutions by `outcome`
//!   (matched, fallback_404, invalid, error)
//! - `route_filter_blocks_total` (counter): blocked requests by filter `kind`
//! - `route_segment_lookups_total` (counter): dynamic segment lookups by
//!   `result` (hit, miss, error)
//! - `route_table_reloads_total` (counter): config reloads by `result`
//!
//! Recording is a no-op until a recorder is installed, so the routing core
//! can be used as a library without an exporter.

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_resolution(outcome: &'static str) {
    counter!("route_resolutions_total", "outcome" => outcome).increment(1);
}

pub fn record_filter_block(kind: &'static str) {
    counter!("route_filter_blocks_total", "kind" => kind).increment(1);
}

pub fn record_lookup(result: &'static str) {
    counter!("route_segment_lookups_total", "result" => result).increment(1);
}

pub fn record_reload(result: &'static str) {
    counter!("route_table_reloads_total", "result" => result).increment(1);
}
