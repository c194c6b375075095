//! Mock search provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::ranking::Candidate;
use crate::searcher::{SearchError, SearchProvider, SearchQuery};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The query that was searched.
    pub query: SearchQuery,
    /// When the search was made.
    pub timestamp: Instant,
}

/// Mock implementation of the SearchProvider trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable results for every query
/// - Track search queries for assertions
/// - Simulate failures and delays
///
/// # Example
///
/// ```rust,ignore
/// use seedstream_core::testing::{MockProvider, fixtures};
///
/// let provider = MockProvider::new("ncore");
/// provider.set_results(vec![
///     fixtures::candidate("ncore", "Movie.2024.1080p.BluRay", 40),
/// ]).await;
///
/// let results = provider.search(&SearchQuery::new("tt1234567")).await?;
/// assert_eq!(results.len(), 1);
/// assert_eq!(provider.search_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    /// Configured results to return.
    results: Arc<RwLock<Vec<Candidate>>>,
    /// Recorded search queries.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// If set, the next search will fail with this error.
    next_error: Arc<RwLock<Option<SearchError>>>,
    /// Delay before answering.
    delay: Arc<RwLock<Duration>>,
}

impl MockProvider {
    /// Create a new mock provider with empty results.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Set the results to return for subsequent searches.
    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    /// Configure the next search to fail with the given error.
    pub async fn fail_next(&self, error: SearchError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Get recorded search queries.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }
}

#[async_trait]
impl SearchProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        self.searches.write().await.push(RecordedSearch {
            query: query.clone(),
            timestamp: Instant::now(),
        });

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(self.results.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_returns_results_and_records() {
        let provider = MockProvider::new("mock");
        provider
            .set_results(vec![fixtures::candidate("mock", "Movie 1080p", 5)])
            .await;

        let results = provider.search(&SearchQuery::new("tt1")).await.unwrap();
        assert_eq!(results.len(), 1);

        let searches = provider.recorded_searches().await;
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].query.query, "tt1");
    }

    #[tokio::test]
    async fn test_error_is_one_shot() {
        let provider = MockProvider::new("mock");
        provider.fail_next(SearchError::Timeout).await;

        assert!(provider.search(&SearchQuery::new("a")).await.is_err());
        assert!(provider.search(&SearchQuery::new("b")).await.is_ok());
        assert_eq!(provider.search_count().await, 2);
    }
}
