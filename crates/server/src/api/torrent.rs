//! Resource metadata handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use seedstream_core::streams::playback_url;
use tracing::warn;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TorrentFileResponse {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    /// Playback URL on this server.
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TorrentResponse {
    pub info_hash: String,
    pub name: String,
    pub total_size: u64,
    pub files: Vec<TorrentFileResponse>,
}

/// GET /torrent/{uri}
///
/// Resolve metadata without registering the resource for streaming.
pub async fn get_torrent(
    State(state): State<Arc<AppState>>,
    Path(uri): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TorrentResponse>, (StatusCode, Json<ErrorResponse>)> {
    let metadata = state
        .manager()
        .acquire_for_metadata_only(&uri)
        .await
        .map_err(|e| {
            warn!(uri = %uri, error = %e, "Metadata fetch failed");
            ErrorResponse::with_status(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;

    let base_url = state.base_url(&headers);
    let files = metadata
        .files
        .into_iter()
        .map(|f| TorrentFileResponse {
            url: playback_url(&base_url, &uri, &f.path),
            name: f.name,
            path: f.path,
            size_bytes: f.size_bytes,
        })
        .collect();

    Ok(Json(TorrentResponse {
        info_hash: metadata.info_hash,
        name: metadata.name,
        total_size: metadata.total_size,
        files,
    }))
}
