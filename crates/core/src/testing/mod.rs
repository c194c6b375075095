//! Testing utilities and mock implementations.
//!
//! Mock implementations of the external-facing traits, so the manager, the
//! aggregator and the HTTP surface can be exercised without a swarm or an
//! indexer.
//!
//! # Example
//!
//! ```rust,ignore
//! use seedstream_core::testing::{fixtures, MockEngine, MockProvider, MockTorrent};
//!
//! let engine = MockEngine::new();
//! let provider = MockProvider::new("ncore");
//!
//! let candidate = fixtures::candidate("ncore", "Movie.2024.1080p.BluRay", 40);
//! engine.register(candidate.uri.clone(), fixtures::movie_torrent("Movie.2024.1080p.BluRay")).await;
//! provider.set_results(vec![candidate]).await;
//! ```

mod mock_engine;
mod mock_provider;

pub use mock_engine::{MockEngine, MockTorrent};
pub use mock_provider::{MockProvider, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use super::MockTorrent;
    use crate::classify::{guess_languages, guess_quality, is_season_pack};
    use crate::ranking::{Candidate, ScoredCandidate};

    /// 40-char hex info hash derived from `name`.
    pub fn info_hash(name: &str) -> String {
        let hex = format!("{:x}", md5::compute(name.as_bytes()));
        format!("{}{}", hex, &hex[..8])
    }

    pub fn magnet(info_hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{}", info_hash)
    }

    /// Create a candidate with reasonable defaults and a magnet for `name`.
    pub fn candidate(tracker: &str, name: &str, seeds: u32) -> Candidate {
        Candidate {
            tracker: tracker.to_string(),
            name: name.to_string(),
            uri: magnet(&info_hash(name)),
            seeds,
            peers: seeds / 2,
            size_bytes: 4 * 1024 * 1024 * 1024, // 4 GB
            category: None,
            freeleech: None,
        }
    }

    /// Wrap a candidate as if the ranking pass produced `composite`.
    pub fn scored(candidate: Candidate, composite: f64) -> ScoredCandidate {
        let quality = guess_quality(&candidate.name);
        let language_tags = guess_languages(&candidate.name, candidate.category.as_deref());
        let season_pack = is_season_pack(&candidate.name);
        ScoredCandidate {
            candidate,
            composite_score: composite,
            quality_label: quality.label,
            quality_score: quality.score,
            language_tags,
            season_pack,
        }
    }

    /// A single-movie torrent: the feature, a sample and a subtitle.
    pub fn movie_torrent(name: &str) -> MockTorrent {
        MockTorrent::new(info_hash(name), name)
            .with_sized_file(format!("{name}/{name}.mkv"), 4 * 1024 * 1024 * 1024)
            .with_sized_file(format!("{name}/sample.mkv"), 30 * 1024 * 1024)
            .with_file(
                format!("{name}/{name}.hun.srt"),
                b"1\n00:00:01,000 --> 00:00:02,000\nSzia\n".to_vec(),
            )
    }

    /// A season pack with `episodes` episodes of season `season`.
    pub fn season_pack(name: &str, season: u32, episodes: u32) -> MockTorrent {
        (1..=episodes).fold(MockTorrent::new(info_hash(name), name), |torrent, e| {
            torrent.with_sized_file(
                format!("{name}/Show.S{:02}E{:02}.mkv", season, e),
                1024 * 1024 * 1024,
            )
        })
    }
}
