use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use seedstream_core::streams::readable_duration;
use seedstream_core::{ManagerStats, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Shorthand for the `(status, json)` error tuple handlers return.
    pub fn with_status(status: StatusCode, error: impl ToString) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                error: error.to_string(),
            }),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Human readable, e.g. "1h 2m 5s".
    pub uptime: String,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub manager: ManagerStats,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /stats
///
/// Throughput, uptime and every known resource.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let uptime = state.uptime();
    Json(StatsResponse {
        uptime: readable_duration(uptime),
        uptime_secs: uptime.as_secs(),
        manager: state.manager().stats().await,
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
