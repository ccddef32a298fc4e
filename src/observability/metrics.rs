//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, kind
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_redirect_walks_total` (counter): walks by outcome
//! - `gateway_rewrites_total` (counter): HTML rewrites by outcome
//! - `gateway_upstream_errors_total` (counter): gateway-side failures by code
//!
//! No slot label: slots are client-chosen and unbounded.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// `kind` is `page`, `api` or `redirect`.
pub fn record_request(method: &str, status: u16, kind: &'static str, start: Instant) {
    let status = status.to_string();
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.clone(),
        "kind" => kind
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

/// `outcome` is `terminal`, `budget_exceeded` or `error`.
pub fn record_redirect_walk(outcome: &'static str, hops: u32) {
    counter!("gateway_redirect_walks_total", "outcome" => outcome).increment(1);
    histogram!("gateway_redirect_hops").record(f64::from(hops));
}

pub fn record_rewrite(outcome: &'static str) {
    counter!("gateway_rewrites_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_error(code: &'static str) {
    counter!("gateway_upstream_errors_total", "code" => code).increment(1);
}
