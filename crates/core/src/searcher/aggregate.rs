//! Bounded fan-out across search providers.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::metrics;
use crate::ranking::{deduplicate_candidates, Candidate};

use super::{SearchError, SearchProvider, SearchQuery, SearchResult};

/// Queries every provider concurrently and merges the results.
///
/// A slow or failing provider never fails the search; its error is recorded
/// in [`SearchResult::provider_errors`] and the others' results are kept.
pub struct SearchAggregator {
    providers: Vec<Arc<dyn SearchProvider>>,
    concurrency: usize,
    provider_timeout: Duration,
}

impl SearchAggregator {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        concurrency: usize,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            concurrency: concurrency.max(1),
            provider_timeout,
        }
    }

    pub fn from_config(providers: Vec<Arc<dyn SearchProvider>>, config: &SearchConfig) -> Self {
        Self::new(
            providers,
            config.concurrency,
            Duration::from_secs(config.provider_timeout_secs),
        )
    }

    /// Names of the configured providers.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    async fn query_provider(
        &self,
        provider: Arc<dyn SearchProvider>,
        query: &SearchQuery,
    ) -> (String, Result<Vec<Candidate>, SearchError>) {
        let name = provider.name().to_string();
        let start = Instant::now();

        let result = match tokio::time::timeout(self.provider_timeout, provider.search(query)).await
        {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout),
        };

        let label = match &result {
            Ok(_) => "ok",
            Err(SearchError::Timeout) => "timeout",
            Err(_) => "error",
        };
        metrics::PROVIDER_QUERIES
            .with_label_values(&[name.as_str(), label])
            .inc();
        metrics::PROVIDER_DURATION
            .with_label_values(&[name.as_str()])
            .observe(start.elapsed().as_secs_f64());

        (name, result)
    }

    /// Run `query` against all selected providers.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        let start = Instant::now();
        let selected: Vec<Arc<dyn SearchProvider>> = self
            .providers
            .iter()
            .filter(|p| query.wants_provider(p.name()))
            .cloned()
            .collect();

        debug!(
            providers = selected.len(),
            query = %query.query,
            "Starting provider fan-out"
        );

        // Collected first: a mapping closure here leaves the future non-Send.
        let queries: Vec<_> = selected
            .into_iter()
            .map(|provider| self.query_provider(provider, query))
            .collect();
        let results: Vec<_> = stream::iter(queries)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut all = Vec::new();
        let mut provider_errors = HashMap::new();
        for (name, result) in results {
            match result {
                Ok(mut candidates) => all.append(&mut candidates),
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider search failed");
                    provider_errors.insert(name, e.to_string());
                }
            }
        }

        let candidates = deduplicate_candidates(all);
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            results = candidates.len(),
            failed = provider_errors.len(),
            duration_ms = duration_ms,
            "Search complete"
        );

        SearchResult {
            candidates,
            duration_ms,
            provider_errors,
        }
    }
}
