//! Types for the ranking pipeline.

use serde::{Deserialize, Serialize};

use crate::classify::{EpisodeMatcher, Language, LanguageTags};
use crate::config::RankingConfig;

/// A raw search result from one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider/tracker that returned this result.
    pub tracker: String,
    /// Release name.
    pub name: String,
    /// Magnet link or descriptor (.torrent) URL.
    pub uri: String,
    pub seeds: u32,
    pub peers: u32,
    pub size_bytes: u64,
    /// Category as reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-leech flag, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeleech: Option<bool>,
}

impl Candidate {
    /// Identity used for deduplication.
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.tracker, &self.name)
    }
}

/// A candidate after scoring. Never mutated once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub composite_score: f64,
    pub quality_label: String,
    /// Quality score of the release name (negative infinity when unknown).
    #[serde(skip)]
    pub quality_score: f64,
    pub language_tags: LanguageTags,
    pub season_pack: bool,
}

/// Exclusions configured by the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityFilters {
    pub disable_hevc: bool,
    pub disable_4k: bool,
    pub disable_hdr: bool,
    pub disable_cam: bool,
    pub disable_3d: bool,
}

impl From<&RankingConfig> for QualityFilters {
    fn from(config: &RankingConfig) -> Self {
        Self {
            disable_hevc: config.disable_hevc,
            disable_4k: config.disable_4k,
            disable_hdr: config.disable_hdr,
            disable_cam: config.disable_cam,
            disable_3d: config.disable_3d,
        }
    }
}

/// Everything a ranking pass depends on besides the candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct RankContext {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub filters: QualityFilters,
    pub target_language: Language,
}

impl Default for RankContext {
    fn default() -> Self {
        Self {
            season: None,
            episode: None,
            filters: QualityFilters::default(),
            target_language: Language::Hun,
        }
    }
}

impl RankContext {
    /// Build a context from ranking configuration. Unknown language codes
    /// fall back to Hungarian; `validate_config` rejects them upfront.
    pub fn from_config(config: &RankingConfig) -> Self {
        Self {
            season: None,
            episode: None,
            filters: QualityFilters::from(config),
            target_language: Language::from_code(&config.target_language)
                .unwrap_or(Language::Hun),
        }
    }

    pub fn with_episode(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season = season;
        self.episode = episode;
        self
    }

    /// Both season and episode were requested.
    pub fn is_episode_query(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }

    /// Matcher for the requested episode, when both parts were given.
    pub fn episode_matcher(&self) -> Option<EpisodeMatcher> {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) => Some(EpisodeMatcher::new(season, episode)),
            _ => None,
        }
    }
}
