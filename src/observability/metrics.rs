//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, cache
//! - `proxy_request_duration_seconds` (histogram): latency by cache status
//! - `proxy_cache_lookups_total` (counter): store lookups by result
//! - `proxy_upstream_errors_total` (counter): forwarding failures by kind
//! - `proxy_cache_entries` (gauge): entries held by the store
//! - `proxy_single_flight_waiters_total` (counter): requests that waited on
//!   another request's fetch
//!
//! Without an installed recorder every call is a no-op, which is what the
//! tests rely on.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::response::CacheStatus;
use crate::upstream::ForwardErrorKind;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Label for `method`; extension methods share one bucket.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::OPTIONS => "OPTIONS",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => "OTHER",
    }
}

/// Record a completed request.
pub fn record_request(method: &Method, status: u16, cache: CacheStatus, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method_label(method),
        "status" => status.to_string(),
        "cache" => cache.as_str()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "cache" => cache.as_str())
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of a store lookup.
pub fn record_cache_lookup(cache: CacheStatus) {
    counter!("proxy_cache_lookups_total", "result" => cache.as_str()).increment(1);
}

/// Record a forwarding failure.
pub fn record_upstream_error(kind: ForwardErrorKind) {
    counter!("proxy_upstream_errors_total", "kind" => kind.as_str()).increment(1);
}

/// Update the store size gauge.
pub fn record_cache_size(entries: usize) {
    gauge!("proxy_cache_entries").set(entries as f64);
}

/// Count a request that reused another request's in-flight fetch.
pub fn record_single_flight_wait() {
    counter!("proxy_single_flight_waiters_total").increment(1);
}
