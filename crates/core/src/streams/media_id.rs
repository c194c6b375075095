//! Addon media identifiers.
//!
//! Accepted forms: `tt1234567`, `tt1234567:1:2` and `tmdb:1399:1:2`.
//! Anything else is treated as a bare query with optional season/episode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::searcher::SearchCategory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaIdError {
    #[error("Unknown media kind: {0}")]
    UnknownKind(String),

    #[error("Empty media id")]
    Empty,
}

/// Kind of media requested by the addon client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub fn category(&self) -> SearchCategory {
        match self {
            MediaKind::Movie => SearchCategory::Movie,
            MediaKind::Series => SearchCategory::Show,
        }
    }
}

impl FromStr for MediaKind {
    type Err = MediaIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "series" => Ok(MediaKind::Series),
            other => Err(MediaIdError::UnknownKind(other.to_string())),
        }
    }
}

/// Where the id came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Imdb(String),
    Tmdb(String),
}

/// A parsed media id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId {
    /// The id exactly as requested; the content hash is derived from it.
    pub raw: String,
    pub source: MediaSource,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaId {
    pub fn parse(id: &str) -> Result<Self, MediaIdError> {
        let id = id.trim();
        let id = id.strip_suffix(".json").unwrap_or(id);
        if id.is_empty() {
            return Err(MediaIdError::Empty);
        }

        let parts: Vec<&str> = id.split(':').collect();
        let (source, rest) = if parts[0] == "tmdb" {
            let tmdb = parts.get(1).copied().unwrap_or_default();
            if tmdb.is_empty() {
                return Err(MediaIdError::Empty);
            }
            (MediaSource::Tmdb(tmdb.to_string()), parts.get(2..).unwrap_or_default())
        } else {
            (MediaSource::Imdb(parts[0].to_string()), &parts[1..])
        };

        let number = |i: usize| rest.get(i).and_then(|s| s.parse::<u32>().ok());
        Ok(Self {
            raw: id.to_string(),
            source,
            season: number(0),
            episode: number(1),
        })
    }

    /// Search query for this id. TMDB ids need a title lookup first.
    pub fn search_query(&self) -> Option<&str> {
        match &self.source {
            MediaSource::Imdb(id) => Some(id),
            MediaSource::Tmdb(_) => None,
        }
    }

    /// Season and episode, only when both are present.
    pub fn episode_request(&self) -> Option<(u32, u32)> {
        self.season.zip(self.episode)
    }

    /// md5 hex of the raw id, used as the content hash hint.
    pub fn content_hash(&self) -> String {
        format!("{:x}", md5::compute(self.raw.as_bytes()))
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
