//! Jackett search provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::JackettConfig;
use crate::ranking::Candidate;

use super::{SearchCategory, SearchError, SearchProvider, SearchQuery};

/// Queries every indexer configured in a Jackett instance at once.
pub struct JackettProvider {
    client: Client,
    config: JackettConfig,
}

impl JackettProvider {
    pub fn new(config: JackettConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::ConnectionFailed(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/all/results?apikey={}&Query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(&query.query)
        );

        if let Some(categories) = &query.categories {
            for cat in categories {
                url.push_str(&format!("&Category[]={}", category_to_jackett_id(cat)));
            }
        }

        url
    }
}

#[async_trait]
impl SearchProvider for JackettProvider {
    fn name(&self) -> &str {
        "jackett"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        let url = self.build_search_url(query);
        debug!(query = %query.query, "Searching Jackett");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else if e.is_connect() {
                SearchError::ConnectionFailed(e.to_string())
            } else {
                SearchError::ApiError(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let jackett_response: JackettResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ApiError(format!("Failed to parse response: {}", e)))?;

        let candidates: Vec<Candidate> = jackett_response
            .Results
            .into_iter()
            .filter_map(|r| r.into_candidate(self.name()))
            .collect();

        debug!(results = candidates.len(), "Jackett search complete");
        Ok(candidates)
    }
}

/// Map our categories to Jackett category IDs.
fn category_to_jackett_id(cat: &SearchCategory) -> i32 {
    match cat {
        SearchCategory::Movie => 2000,
        SearchCategory::Show => 5000,
    }
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    Peers: Option<i32>,
    CategoryDesc: Option<String>,
    DownloadVolumeFactor: Option<f64>,
}

impl JackettResult {
    /// Results with neither a magnet nor a download link are unusable.
    fn into_candidate(self, tracker: &str) -> Option<Candidate> {
        // Magnets carry the info hash, which lets acquires coalesce
        let uri = self.MagnetUri.or(self.Link).filter(|u| !u.is_empty())?;
        let seeds = self.Seeders.unwrap_or(0).max(0) as u32;
        Some(Candidate {
            tracker: tracker.to_string(),
            name: self.Title,
            uri,
            seeds,
            peers: self
                .Peers
                .unwrap_or(0)
                .saturating_sub(self.Seeders.unwrap_or(0))
                .max(0) as u32,
            size_bytes: self.Size.unwrap_or(0).max(0) as u64,
            category: self.CategoryDesc,
            freeleech: self.DownloadVolumeFactor.map(|f| f == 0.0),
        })
    }
}
