//! Turns ranked torrents into playable stream descriptors.

use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::classify::{guess_quality, EpisodeMatcher, Language};
use crate::config::RankingConfig;
use crate::ranking::{QualityFilters, ScoredCandidate};
use crate::resource::{FileEntry, Metadata, ResourceManager};

use super::files::{is_subtitle_file, is_video_file, readable_size};
use super::media_id::MediaId;
use super::types::{playback_url, BehaviorHints, StreamDescriptor, SubtitleRef};

/// Files smaller than this share of the largest video are treated as extras.
const EXTRAS_THRESHOLD: f64 = 0.7;

pub struct StreamSynthesizer {
    manager: ResourceManager,
    filters: QualityFilters,
    target_language: Language,
    hide_foreign_when_local: bool,
    concurrency: usize,
}

impl StreamSynthesizer {
    pub fn new(manager: ResourceManager, config: &RankingConfig) -> Self {
        Self {
            manager,
            filters: QualityFilters::from(config),
            target_language: Language::from_code(&config.target_language).unwrap_or(Language::Hun),
            hide_foreign_when_local: config.hide_foreign_when_local,
            concurrency: config.metadata_concurrency.max(1),
        }
    }

    async fn fetch_metadata(
        &self,
        candidate: ScoredCandidate,
    ) -> (ScoredCandidate, Option<Metadata>) {
        let metadata = match self
            .manager
            .acquire_for_metadata_only(&candidate.candidate.uri)
            .await
        {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(
                    name = %candidate.candidate.name,
                    error = %e,
                    "Dropping torrent without metadata"
                );
                None
            }
        };
        (candidate, metadata)
    }

    /// Build the final stream list for `ranked` torrents.
    ///
    /// Torrents whose metadata cannot be fetched in time are dropped. The
    /// result is sorted best first and the first entry is marked recommended.
    pub async fn synthesize(
        &self,
        ranked: Vec<ScoredCandidate>,
        media: &MediaId,
        base_url: &str,
    ) -> Vec<StreamDescriptor> {
        let fetches: Vec<_> = ranked
            .into_iter()
            .map(|candidate| self.fetch_metadata(candidate))
            .collect();
        let fetched: Vec<(ScoredCandidate, Option<Metadata>)> = stream::iter(fetches)
            .buffered(self.concurrency)
            .collect()
            .await;

        let content_hash = media.content_hash();
        let episode = media
            .episode_request()
            .map(|(season, ep)| EpisodeMatcher::new(season, ep));

        let mut streams: Vec<StreamDescriptor> = fetched
            .iter()
            .filter_map(|(candidate, metadata)| metadata.as_ref().map(|m| (candidate, m)))
            .flat_map(|(candidate, metadata)| {
                build_streams(candidate, metadata, episode.as_ref(), &content_hash, base_url)
            })
            .collect();

        streams.retain(|s| {
            self.filters.allows_format(&s.file_name) && self.filters.allows_quality(&s.name)
        });
        let mut streams = dedup_by_url(streams);
        if self.hide_foreign_when_local {
            hide_foreign(&mut streams, self.target_language);
        }
        streams.sort_by(compare_streams);
        if let Some(best) = streams.first_mut() {
            best.recommended = true;
        }

        debug!(
            torrents = fetched.len(),
            streams = streams.len(),
            "Streams synthesized"
        );
        streams
    }
}

/// Pick the video files worth offering.
///
/// With an episode request the single largest matching file wins. Without
/// one, or when nothing matches, files far smaller than the largest are
/// dropped.
pub fn select_videos<'a>(
    files: &'a [FileEntry],
    episode: Option<&EpisodeMatcher>,
) -> Vec<&'a FileEntry> {
    let mut videos: Vec<&FileEntry> = files.iter().filter(|f| is_video_file(&f.name)).collect();

    if let Some(matcher) = episode {
        let largest_match = videos
            .iter()
            .copied()
            .filter(|f| matcher.matches(&f.name))
            .max_by_key(|f| f.size_bytes);
        if let Some(file) = largest_match {
            return vec![file];
        }
    }

    if videos.len() > 1 {
        let largest = videos.iter().map(|f| f.size_bytes).max().unwrap_or(0);
        let threshold = largest as f64 * EXTRAS_THRESHOLD;
        videos.retain(|f| f.size_bytes as f64 >= threshold);
    }
    videos
}

fn build_streams(
    scored: &ScoredCandidate,
    metadata: &Metadata,
    episode: Option<&EpisodeMatcher>,
    content_hash: &str,
    base_url: &str,
) -> Vec<StreamDescriptor> {
    let candidate = &scored.candidate;
    let subtitles: Vec<SubtitleRef> = metadata
        .files
        .iter()
        .filter(|f| is_subtitle_file(&f.name))
        .enumerate()
        .map(|(i, f)| SubtitleRef {
            id: i.to_string(),
            url: playback_url(base_url, &candidate.uri, &f.path),
            lang: f.name.clone(),
        })
        .collect();

    let torrent_quality = guess_quality(&candidate.name);

    select_videos(&metadata.files, episode)
        .into_iter()
        .map(|file| {
            let file_quality = guess_quality(&file.name);
            let quality = if file_quality.score > torrent_quality.score {
                file_quality
            } else {
                torrent_quality.clone()
            };
            let nudge = if quality.score.is_finite() {
                quality.score / 1000.0
            } else {
                0.0
            };

            let mut description = vec![candidate.name.clone()];
            if let Some(matcher) = episode {
                description.push(format!(
                    "Season:{:02} Episode:{:02}",
                    matcher.season(),
                    matcher.episode()
                ));
            }
            description.push(format!(
                "{} {}",
                readable_size(file.size_bytes),
                scored.language_tags
            ));
            description.push(format!(
                "⚙️ {}  ⬆️ {}  ⬇️ {}",
                candidate.tracker, candidate.seeds, candidate.peers
            ));

            StreamDescriptor {
                name: quality.label,
                description: description.join("\n"),
                url: playback_url(base_url, &candidate.uri, &file.path),
                subtitles: subtitles.clone(),
                behavior_hints: BehaviorHints {
                    binge_group: candidate.name.clone(),
                    filename: file.name.clone(),
                    video_hash: content_hash.to_string(),
                    not_web_ready: true,
                    video_size: file.size_bytes,
                },
                recommended: false,
                composite_score: scored.composite_score,
                score: scored.composite_score + nudge,
                file_name: file.name.clone(),
                language_tags: scored.language_tags.clone(),
            }
        })
        .collect()
}

/// Keep one descriptor per playback URL, the higher-scoring one.
fn dedup_by_url(streams: Vec<StreamDescriptor>) -> Vec<StreamDescriptor> {
    let mut out: Vec<StreamDescriptor> = Vec::with_capacity(streams.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for stream in streams {
        match index.get(&stream.url) {
            Some(&i) => {
                if stream.score > out[i].score {
                    out[i] = stream;
                }
            }
            None => {
                index.insert(stream.url.clone(), out.len());
                out.push(stream);
            }
        }
    }
    out
}

/// Drop foreign-only streams when a target-language stream exists.
fn hide_foreign(streams: &mut Vec<StreamDescriptor>, target: Language) {
    if streams.iter().any(|s| s.language_tags.contains(target)) {
        streams.retain(|s| !s.language_tags.is_foreign_only(target));
    }
}

/// Torrent-level composite first; the file nudge only breaks ties.
fn compare_streams(a: &StreamDescriptor, b: &StreamDescriptor) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| b.score.total_cmp(&a.score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResumeStore;
    use crate::testing::{fixtures, MockEngine, MockTorrent};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const GB: u64 = 1024 * 1024 * 1024;
    const BASE: &str = "http://localhost:8080";

    struct Setup {
        _dir: TempDir,
        engine: Arc<MockEngine>,
        synthesizer: StreamSynthesizer,
    }

    async fn setup(config: RankingConfig) -> Setup {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let store = ResumeStore::open(dir.path()).await.unwrap();
        let manager = ResourceManager::with_timings(
            engine.clone(),
            store,
            Duration::from_secs(3600),
            Duration::from_secs(5),
            Duration::from_secs(3600),
        );
        Setup {
            _dir: dir,
            engine,
            synthesizer: StreamSynthesizer::new(manager, &config),
        }
    }

    /// Register a torrent and return its scored candidate.
    async fn add(
        engine: &MockEngine,
        tracker: &str,
        name: &str,
        composite: f64,
        files: &[(&str, u64)],
    ) -> ScoredCandidate {
        let hash = fixtures::info_hash(name);
        let mut torrent = MockTorrent::new(&hash, name);
        for (path, size) in files {
            torrent = torrent.with_sized_file(format!("{name}/{path}"), *size);
        }
        let candidate = fixtures::candidate(tracker, name, 20);
        engine.register(candidate.uri.clone(), torrent).await;
        fixtures::scored(candidate, composite)
    }

    fn file(name: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: format!("T/{name}"),
            size_bytes: size,
        }
    }

    #[test]
    fn test_select_drops_extras() {
        let files = vec![
            file("movie.mkv", 4 * GB),
            file("sample.mkv", 50_000_000),
            file("movie.cut.mkv", 3 * GB),
            file("cover.jpg", 100),
        ];
        let selected: Vec<&str> = select_videos(&files, None)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(selected, vec!["movie.mkv", "movie.cut.mkv"]);
    }

    #[test]
    fn test_select_single_largest_episode() {
        let files = vec![
            file("Show.S01E01.mkv", GB),
            file("Show.S01E02.720p.mkv", GB),
            file("Show.S01E02.1080p.mkv", 2 * GB),
            file("Show.S01E03.mkv", GB),
        ];
        let selected = select_videos(&files, Some(&EpisodeMatcher::new(1, 2)));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Show.S01E02.1080p.mkv");
    }

    #[test]
    fn test_select_episode_without_match_falls_back() {
        let files = vec![file("Part1.mkv", GB), file("Part2.mkv", GB)];
        assert_eq!(select_videos(&files, Some(&EpisodeMatcher::new(1, 5))).len(), 2);
    }

    #[tokio::test]
    async fn test_movie_streams() {
        let s = setup(RankingConfig::default()).await;
        let best = add(
            &s.engine,
            "ncore",
            "Movie.2024.1080p.BluRay",
            0.8,
            &[("movie.mkv", 8 * GB), ("sample.mkv", GB / 10), ("movie.hun.srt", 50_000)],
        )
        .await;
        let other = add(&s.engine, "yts", "Movie.2024.720p.WEB", 0.6, &[("m.mp4", 2 * GB)]).await;

        let media = MediaId::parse("tt0111161").unwrap();
        let streams = s.synthesizer.synthesize(vec![other, best], &media, BASE).await;

        assert_eq!(streams.len(), 2);
        let top = &streams[0];
        assert!(top.recommended);
        assert!(!streams[1].recommended);
        assert_eq!(top.name, "1080p BluRay");
        assert_eq!(top.behavior_hints.filename, "movie.mkv");
        assert_eq!(top.behavior_hints.video_hash, media.content_hash());
        assert_eq!(top.behavior_hints.binge_group, "Movie.2024.1080p.BluRay");
        assert_eq!(top.subtitles.len(), 1);
        assert_eq!(top.subtitles[0].lang, "movie.hun.srt");
        assert!(top.url.starts_with("http://localhost:8080/stream/magnet%3A"));
        assert!(top.url.ends_with("/Movie.2024.1080p.BluRay%2Fmovie.mkv"));
        assert!(top.description.lines().last().unwrap().contains("ncore"));
    }

    #[tokio::test]
    async fn test_episode_description_and_selection() {
        let s = setup(RankingConfig::default()).await;
        let pack = add(
            &s.engine,
            "ncore",
            "Show.S01.1080p.WEB",
            0.7,
            &[("Show.S01E01.mkv", GB), ("Show.S01E02.mkv", GB)],
        )
        .await;

        let media = MediaId::parse("tt1:1:2").unwrap();
        let streams = s.synthesizer.synthesize(vec![pack], &media, BASE).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].file_name, "Show.S01E02.mkv");
        assert!(streams[0].description.contains("Season:01 Episode:02"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_timeout_drops_torrent() {
        let s = setup(RankingConfig::default()).await;
        let slow = add(&s.engine, "a", "Slow.1080p.WEB", 0.9, &[("a.mkv", GB)]).await;
        let fast = add(&s.engine, "b", "Fast.720p.WEB", 0.5, &[("b.mkv", GB)]).await;
        s.engine
            .set_uri_delay(slow.candidate.uri.clone(), Duration::from_secs(60))
            .await;

        let media = MediaId::parse("tt1").unwrap();
        let streams = s.synthesizer.synthesize(vec![slow, fast], &media, BASE).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].file_name, "b.mkv");
    }

    #[tokio::test]
    async fn test_dedup_by_url_keeps_higher_score() {
        let s = setup(RankingConfig::default()).await;
        let a = add(&s.engine, "ncore", "Movie.1080p.BluRay", 0.4, &[("m.mkv", GB)]).await;
        let mut b = a.clone();
        b.candidate.tracker = "other".to_string();
        b.composite_score = 0.9;

        let media = MediaId::parse("tt1").unwrap();
        let streams = s.synthesizer.synthesize(vec![a, b], &media, BASE).await;
        assert_eq!(streams.len(), 1);
        assert!((streams[0].composite_score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_file_nudge_only_breaks_ties() {
        let s = setup(RankingConfig::default()).await;
        // same composite: the 2160p file wins on the nudge
        let a = add(&s.engine, "x", "Movie.A", 0.5, &[("a.1080p.mkv", GB)]).await;
        let b = add(&s.engine, "y", "Movie.B", 0.5, &[("b.2160p.mkv", GB)]).await;
        // higher composite beats a better file
        let c = add(&s.engine, "z", "Movie.C", 0.51, &[("c.480p.mkv", GB)]).await;

        let media = MediaId::parse("tt1").unwrap();
        let streams = s.synthesizer.synthesize(vec![a, b, c], &media, BASE).await;
        let order: Vec<&str> = streams.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(order, vec!["c.480p.mkv", "b.2160p.mkv", "a.1080p.mkv"]);
    }

    #[tokio::test]
    async fn test_per_file_filters() {
        let config = RankingConfig {
            disable_hevc: true,
            ..Default::default()
        };
        let s = setup(config).await;
        let t = add(
            &s.engine,
            "x",
            "Movie.1080p.WEB",
            0.5,
            &[("movie.x265.mkv", GB), ("movie.x264.mkv", GB)],
        )
        .await;

        let media = MediaId::parse("tt1").unwrap();
        let streams = s.synthesizer.synthesize(vec![t], &media, BASE).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].file_name, "movie.x264.mkv");
    }

    #[tokio::test]
    async fn test_hide_foreign_when_local_exists() {
        let config = RankingConfig {
            hide_foreign_when_local: true,
            ..Default::default()
        };
        let s = setup(config).await;
        let hun = add(&s.engine, "x", "Movie.1080p.WEB.HUN", 0.3, &[("a.mkv", GB)]).await;
        let ger = add(&s.engine, "y", "Movie.1080p.WEB.GER", 0.9, &[("b.mkv", GB)]).await;
        let unknown = add(&s.engine, "z", "Movie.1080p.WEB", 0.5, &[("c.mkv", GB)]).await;

        let media = MediaId::parse("tt1").unwrap();
        let streams = s
            .synthesizer
            .synthesize(vec![hun, ger, unknown], &media, BASE)
            .await;
        let names: Vec<&str> = streams.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["c.mkv", "a.mkv"]);
    }
}
