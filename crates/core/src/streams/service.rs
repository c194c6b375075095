//! Search, rank and synthesize in one call.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::metrics;
use crate::ranking::{rank, RankContext, ScoredCandidate};
use crate::searcher::{SearchAggregator, SearchQuery};

use super::media_id::{MediaId, MediaKind};
use super::synthesizer::StreamSynthesizer;
use super::types::StreamDescriptor;

/// Ranked search output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RankedSearch {
    pub candidates: Vec<ScoredCandidate>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub provider_errors: HashMap<String, String>,
}

pub struct StreamService {
    aggregator: Arc<SearchAggregator>,
    synthesizer: StreamSynthesizer,
    rank_context: RankContext,
}

impl StreamService {
    pub fn new(
        aggregator: Arc<SearchAggregator>,
        synthesizer: StreamSynthesizer,
        rank_context: RankContext,
    ) -> Self {
        Self {
            aggregator,
            synthesizer,
            rank_context,
        }
    }

    pub fn aggregator(&self) -> &Arc<SearchAggregator> {
        &self.aggregator
    }

    /// Search all providers and rank what comes back.
    pub async fn search_ranked(
        &self,
        query: &SearchQuery,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> RankedSearch {
        let result = self.aggregator.search(query).await;
        let ctx = self.rank_context.clone().with_episode(season, episode);
        RankedSearch {
            candidates: rank(result.candidates, &ctx),
            duration_ms: result.duration_ms,
            provider_errors: result.provider_errors,
        }
    }

    /// Streams for an addon request.
    ///
    /// TMDB ids yield nothing: resolving them needs a title lookup this
    /// service does not do.
    pub async fn streams_for(
        &self,
        kind: MediaKind,
        media: &MediaId,
        base_url: &str,
    ) -> Vec<StreamDescriptor> {
        let Some(imdb) = media.search_query() else {
            info!(id = %media, "No title lookup for TMDB ids, returning no streams");
            return Vec::new();
        };

        let query = SearchQuery::new(imdb).with_category(kind.category());
        let ranked = self
            .search_ranked(&query, media.season, media.episode)
            .await;
        let torrents = ranked.candidates.len();

        let streams = self
            .synthesizer
            .synthesize(ranked.candidates, media, base_url)
            .await;

        metrics::STREAMS_RETURNED
            .with_label_values(&[])
            .observe(streams.len() as f64);
        info!(
            id = %media,
            torrents = torrents,
            streams = streams.len(),
            "Streams resolved"
        );
        streams
    }
}
