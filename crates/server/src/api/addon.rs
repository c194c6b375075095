//! Addon stream endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use seedstream_core::{MediaId, MediaKind, StreamsResponse};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// GET /addon/stream/{kind}/{id}
///
/// `kind` is `movie` or `series`; `id` is `tt…`, `tt…:season:episode` or
/// `tmdb:…:season:episode`, optionally with a `.json` suffix.
pub async fn get_streams(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<StreamsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let kind: MediaKind = kind
        .parse()
        .map_err(|e| ErrorResponse::with_status(StatusCode::BAD_REQUEST, e))?;
    let media = MediaId::parse(&id)
        .map_err(|e| ErrorResponse::with_status(StatusCode::BAD_REQUEST, e))?;

    let base_url = state.base_url(&headers);
    let streams = state.streams().streams_for(kind, &media, &base_url).await;

    Ok(Json(StreamsResponse { streams }))
}
