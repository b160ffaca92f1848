//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route, stage
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_token_validations_total` (counter): validations by outcome, cache hit
//! - `gateway_forward_retries_total` (counter): retried attempts by route
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder the
//!   calls are no-ops, so tests need no setup
//! - Prometheus exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, route: &str, stage: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
        ("stage", stage.to_string()),
    ];
    metrics::counter!("gateway_requests_total", &labels).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", &labels[..3])
        .record(start.elapsed().as_secs_f64());
}

/// Record a token validation outcome (`valid` or a rejection code).
pub fn record_token_validation(outcome: &'static str, cached: bool) {
    metrics::counter!(
        "gateway_token_validations_total",
        "outcome" => outcome,
        "cached" => if cached { "true" } else { "false" }
    )
    .increment(1);
}

/// Record a retried forward attempt.
pub fn record_forward_retry(route: &str, reason: &'static str) {
    metrics::counter!(
        "gateway_forward_retries_total",
        "route" => route.to_string(),
        "reason" => reason
    )
    .increment(1);
}
