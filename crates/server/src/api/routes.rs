use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{addon, handlers, search, stream, torrent};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health, config and observability
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/stats", get(handlers::get_stats))
        .route("/metrics", get(handlers::get_metrics))
        // Ranked search
        .route(
            "/torrents/{query}",
            get(search::search_get).post(search::search_post),
        )
        // Metadata with playback URLs
        .route("/torrent/{uri}", get(torrent::get_torrent))
        // Streaming gateway
        .route("/stream/{uri}/{*file_path}", get(stream::stream_file))
        // Addon surface
        .route("/addon/stream/{kind}/{id}", get(addon::get_streams))
        .layer(middleware::from_fn(super::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
