//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, backend: &str, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];

    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

/// Update the per-target health gauge.
pub fn record_target_health(target: &str, healthy: bool) {
    let value = if healthy { 1.0 } else { 0.0 };
    gauge!("gateway_target_healthy", "target" => target.to_string()).set(value);
}

/// Count a 429 for the given tier.
pub fn record_rate_limited(tier: &str) {
    counter!("gateway_rate_limited_total", "tier" => tier.to_string()).increment(1);
}

/// Count a breaker rejection for the given route.
pub fn record_circuit_open(route: &str) {
    counter!("gateway_circuit_open_total", "route" => route.to_string()).increment(1);
}
