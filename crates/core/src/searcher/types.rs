//! Types for the search provider system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::ranking::Candidate;

/// Query parameters for a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query, usually an IMDb id.
    pub query: String,
    /// Optional: limit to specific content categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<SearchCategory>>,
    /// Optional: limit to specific providers by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: SearchCategory) -> Self {
        self.categories.get_or_insert_with(Vec::new).push(category);
        self
    }

    /// Whether `provider` should be queried.
    pub fn wants_provider(&self, provider: &str) -> bool {
        self.providers
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n.eq_ignore_ascii_case(provider)))
    }
}

/// Content category for filtering search results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Movie,
    Show,
}

/// Aggregated result of a fan-out search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResult {
    /// Deduplicated candidates from all providers.
    pub candidates: Vec<Candidate>,
    /// How long the search took in milliseconds.
    pub duration_ms: u64,
    /// Providers that failed (name -> error message).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub provider_errors: HashMap<String, String>,
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Search backend API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// A third-party search provider.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging and result attribution.
    fn name(&self) -> &str;

    /// Run one query against this provider.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_minimal() {
        let parsed: SearchQuery = serde_json::from_str(r#"{"query": "tt0111161"}"#).unwrap();
        assert_eq!(parsed.query, "tt0111161");
        assert!(parsed.categories.is_none());
        assert!(parsed.providers.is_none());
    }

    #[test]
    fn test_search_category_serialization() {
        assert_eq!(
            serde_json::to_string(&SearchCategory::Movie).unwrap(),
            "\"movie\""
        );
        let parsed: SearchQuery =
            serde_json::from_str(r#"{"query": "x", "categories": ["show"]}"#).unwrap();
        assert_eq!(parsed.categories, Some(vec![SearchCategory::Show]));
    }

    #[test]
    fn test_wants_provider() {
        let all = SearchQuery::new("x");
        assert!(all.wants_provider("jackett"));

        let only = SearchQuery {
            providers: Some(vec!["Jackett".to_string()]),
            ..SearchQuery::new("x")
        };
        assert!(only.wants_provider("jackett"));
        assert!(!only.wants_provider("other"));
    }

    #[test]
    fn test_empty_errors_skipped() {
        let json = serde_json::to_string(&SearchResult::default()).unwrap();
        assert!(!json.contains("provider_errors"));
    }
}
