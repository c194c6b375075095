//! Stream descriptors in the addon wire shape.

use serde::Serialize;

use crate::classify::LanguageTags;

/// A subtitle file offered alongside a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleRef {
    pub id: String,
    pub url: String,
    pub lang: String,
}

/// Player hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    /// Groups streams from the same release for binge watching.
    pub binge_group: String,
    pub filename: String,
    pub video_hash: String,
    pub not_web_ready: bool,
    pub video_size: u64,
}

/// One playable file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    /// Quality label.
    pub name: String,
    pub description: String,
    /// Playback URL served by the streaming gateway.
    pub url: String,
    pub subtitles: Vec<SubtitleRef>,
    pub behavior_hints: BehaviorHints,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recommended: bool,

    #[serde(skip)]
    pub composite_score: f64,
    /// Composite score plus the per-file quality nudge.
    #[serde(skip)]
    pub score: f64,
    #[serde(skip)]
    pub file_name: String,
    #[serde(skip)]
    pub language_tags: LanguageTags,
}

/// Response body of the addon stream endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamDescriptor>,
}

/// Playback URL for a file: `{base}/stream/{uri}/{path}`, both percent-encoded.
pub fn playback_url(base_url: &str, uri: &str, file_path: &str) -> String {
    format!(
        "{}/stream/{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(uri),
        urlencoding::encode(file_path)
    )
}
