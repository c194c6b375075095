//! Prometheus metrics for observability.
//!
//! HTTP request metrics live here; resource and search metrics come from the
//! core crate and are registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "seedstream_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("seedstream_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "seedstream_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Throughput (collected dynamically)
// =============================================================================

pub static DOWNLOAD_SPEED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "seedstream_download_bytes_per_second",
        "Aggregate download speed across all resources",
    )
    .unwrap()
});

pub static UPLOAD_SPEED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "seedstream_upload_bytes_per_second",
        "Aggregate upload speed across all resources",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Throughput
    registry.register(Box::new(DOWNLOAD_SPEED.clone())).unwrap();
    registry.register(Box::new(UPLOAD_SPEED.clone())).unwrap();

    // Core metrics (resources, providers, streams)
    for metric in seedstream_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges that are read from live state rather than updated inline.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let stats = state.manager().stats().await;
    DOWNLOAD_SPEED.set(stats.download_speed as i64);
    UPLOAD_SPEED.set(stats.upload_speed as i64);
}

/// Normalize a path for metric labels.
///
/// Uris, file paths and queries are user-controlled; they are replaced with
/// placeholders to keep label cardinality bounded.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["stream", ..] => "/stream/{uri}/{file}".to_string(),
        ["torrent", _] => "/torrent/{uri}".to_string(),
        ["torrents", _] => "/torrents/{query}".to_string(),
        ["addon", "stream", kind @ ("movie" | "series"), _] => {
            format!("/addon/stream/{}/{{id}}", kind)
        }
        ["addon", "stream", ..] => "/addon/stream/{kind}/{id}".to_string(),
        ["health"] | ["config"] | ["stats"] | ["metrics"] => path.to_string(),
        _ => "/{other}".to_string(),
    }
}
