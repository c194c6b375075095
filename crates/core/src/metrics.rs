//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Resource lifecycle (acquires, open streams, evictions)
//! - Metadata fetches
//! - Search providers

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Resources
// =============================================================================

/// Streaming acquires by result.
pub static ACQUIRES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("seedstream_acquires_total", "Total streaming acquires"),
        &["result"], // "ok", "timeout", "error"
    )
    .unwrap()
});

/// Metadata-only fetches by result.
pub static METADATA_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "seedstream_metadata_fetches_total",
            "Total metadata-only fetches",
        ),
        &["result"], // "ok", "timeout", "error"
    )
    .unwrap()
});

/// Streams opened since start.
pub static STREAMS_OPENED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("seedstream_streams_opened_total", "Total streams opened").unwrap()
});

/// Streams currently open.
pub static OPEN_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("seedstream_open_streams", "Streams currently open").unwrap()
});

/// Known resources (active or seeding).
pub static KNOWN_RESOURCES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("seedstream_resources", "Resources currently managed").unwrap()
});

/// Evictions by reason.
pub static EVICTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("seedstream_evictions_total", "Total resource evictions"),
        &["reason"], // "timer", "sweep", "restore"
    )
    .unwrap()
});

// =============================================================================
// Search
// =============================================================================

/// Provider queries by provider and result.
pub static PROVIDER_QUERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "seedstream_provider_queries_total",
            "Total search provider queries",
        ),
        &["provider", "result"], // result: "ok", "error", "timeout"
    )
    .unwrap()
});

/// Provider query duration in seconds.
pub static PROVIDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "seedstream_provider_duration_seconds",
            "Duration of search provider queries",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]),
        &["provider"],
    )
    .unwrap()
});

/// Streams returned per addon request.
pub static STREAMS_RETURNED: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "seedstream_streams_returned",
            "Number of stream descriptors returned per request",
        )
        .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0]),
        &[],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ACQUIRES.clone()),
        Box::new(METADATA_FETCHES.clone()),
        Box::new(STREAMS_OPENED.clone()),
        Box::new(OPEN_STREAMS.clone()),
        Box::new(KNOWN_RESOURCES.clone()),
        Box::new(EVICTIONS.clone()),
        Box::new(PROVIDER_QUERIES.clone()),
        Box::new(PROVIDER_DURATION.clone()),
        Box::new(STREAMS_RETURNED.clone()),
    ]
}
