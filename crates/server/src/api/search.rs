//! Raw torrent search handlers.
//!
//! Results are deduplicated across providers but not ranked or filtered;
//! ranking only happens on the addon path.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use seedstream_core::{Candidate, SearchCategory, SearchQuery};
use tracing::info;

use crate::state::AppState;

// ============================================================================
// Request types
// ============================================================================

/// Query-string filters for GET.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub category: Option<SearchCategory>,
    /// Comma-separated provider names.
    #[serde(default)]
    pub providers: Option<String>,
}

/// JSON body for POST.
#[derive(Debug, Default, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub categories: Option<Vec<SearchCategory>>,
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

impl From<SearchParams> for SearchBody {
    fn from(params: SearchParams) -> Self {
        Self {
            categories: params.category.map(|c| vec![c]),
            providers: params.providers.map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /torrents/{query}
pub async fn search_get(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Candidate>> {
    run_search(&state, query, params.into()).await
}

/// POST /torrents/{query}
///
/// Same as GET with filters in an optional JSON body.
pub async fn search_post(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
    body: Option<Json<SearchBody>>,
) -> Json<Vec<Candidate>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    run_search(&state, query, body).await
}

async fn run_search(
    state: &AppState,
    query: String,
    body: SearchBody,
) -> Json<Vec<Candidate>> {
    let query = SearchQuery {
        query,
        categories: body.categories,
        providers: body.providers,
    };

    let result = state.streams().aggregator().search(&query).await;

    info!(
        query = %query.query,
        results = result.candidates.len(),
        failed_providers = result.provider_errors.len(),
        duration_ms = result.duration_ms,
        "Search complete"
    );

    Json(result.candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_into_body() {
        let params = SearchParams {
            category: Some(SearchCategory::Show),
            providers: Some("ncore, jackett,,".to_string()),
        };
        let body: SearchBody = params.into();
        assert_eq!(body.categories, Some(vec![SearchCategory::Show]));
        assert_eq!(
            body.providers,
            Some(vec!["ncore".to_string(), "jackett".to_string()])
        );
    }
}
