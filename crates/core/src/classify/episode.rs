//! Season/episode matching for release and file names.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Season/episode patterns compiled once for a request.
///
/// Recognised episode forms: `S01E02` (optional zero padding and
/// separator), `1x02`, `1.2.rész`, `1. évad 2. rész` and a bare `0102`
/// token.
#[derive(Debug, Clone)]
pub struct EpisodeMatcher {
    season: u32,
    episode: u32,
    episode_forms: Vec<Regex>,
    season_forms: Vec<Regex>,
}

fn compile(patterns: Vec<String>) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

impl EpisodeMatcher {
    pub fn new(season: u32, episode: u32) -> Self {
        let (s, e) = (season, episode);
        let s_pad = format!("{season:02}");
        let e_pad = format!("{episode:02}");

        let episode_forms = compile(vec![
            format!(r"s0?{s}[^a-z0-9]?e0?{e}(?:\D|$)"),
            format!(r"(?:^|\D){s}[^a-z0-9]?x0?{e}(?:\D|$)"),
            format!(r"(?:^|\D){s}\s*\.\s*{e}\s*\.\s*r(?:e|é)sz"),
            format!(r"(?:^|\D){s}\.?\s*(?:evad|évad)[^0-9]*0?{e}\.?\s*r(?:e|é)sz"),
            format!(r"\b{s_pad}{e_pad}\b"),
        ]);
        let season_forms = compile(vec![
            format!(r"(?:^|[^a-z0-9])s0?{s}(?:\D|$)"),
            format!(r"season\s*0?{s}(?:\D|$)"),
            format!(r"(?:^|\D){s}\.?\s*(?:evad|évad)"),
            format!(r"(?:evad|évad)\s*0?{s}(?:\D|$)"),
        ]);

        Self {
            season,
            episode,
            episode_forms,
            season_forms,
        }
    }

    pub fn season(&self) -> u32 {
        self.season
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Whether `name` refers to this season and episode.
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.episode_forms.iter().any(|re| re.is_match(&lower))
    }

    /// Whether the name carries a marker for this season specifically.
    pub fn has_season_token(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.season_forms.iter().any(|re| re.is_match(&lower))
    }

    /// Season pack for this season.
    pub fn is_matching_season_pack(&self, name: &str) -> bool {
        self.has_season_token(name) && !has_episode_token(name)
    }
}

static EPISODE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^a-z])(?:e|ep|episode\s*)\d{1,3}(?:\D|$)|\d{1,2}x\d{1,3}(?:\D|$)|r(?:e|é)sz")
        .expect("valid regex")
});
static ANY_SEASON_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^a-z0-9])s\d{1,2}(?:\D|$)|season\s*\d|(?:evad|évad)").expect("valid regex")
});
static PACK_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:complete|pack)\b").expect("valid regex"));

/// Whether the name carries a distinct episode marker.
pub fn has_episode_token(name: &str) -> bool {
    EPISODE_TOKEN.is_match(&name.to_lowercase())
}

/// Full-season release: a season marker without an episode marker, or
/// explicit "complete"/"pack" wording.
pub fn is_season_pack(name: &str) -> bool {
    let lower = name.to_lowercase();
    if PACK_WORD.is_match(&lower) {
        return true;
    }
    ANY_SEASON_TOKEN.is_match(&lower) && !EPISODE_TOKEN.is_match(&lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sxxexx_forms() {
        for name in [
            "Show.S01E02.1080p",
            "Show S1E2 720p",
            "Show.s01.e02.WEB",
            "Show_S01_E02",
            "Show.S1E02",
            "Show.S01E2.x264",
        ] {
            assert!(EpisodeMatcher::new(1, 2).matches(name), "{}", name);
        }
    }

    #[test]
    fn test_sxxexx_rejects_other_episodes() {
        assert!(!EpisodeMatcher::new(1, 1).matches("Show.S01E12.1080p"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Show.S01E20"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Show.S02E02"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Show.S11E02"));
    }

    #[test]
    fn test_x_form() {
        assert!(EpisodeMatcher::new(1, 2).matches("Show 1x02 HDTV"));
        assert!(EpisodeMatcher::new(1, 2).matches("Show 1x2 HDTV"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Show 11x02 HDTV"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Show 1x21 HDTV"));
    }

    #[test]
    fn test_hungarian_dotted_form() {
        assert!(EpisodeMatcher::new(1, 2).matches("Sorozat 1.2.rész"));
        assert!(EpisodeMatcher::new(1, 2).matches("Sorozat 1. 2. resz"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Sorozat 1.3.rész"));
    }

    #[test]
    fn test_hungarian_evad_form() {
        assert!(EpisodeMatcher::new(2, 5).matches("Sorozat 2. évad 5. rész"));
        assert!(EpisodeMatcher::new(2, 5).matches("Sorozat 2 evad 05 resz"));
        assert!(EpisodeMatcher::new(2, 5).matches("Sorozat 2.évad 05.rész"));
        assert!(!EpisodeMatcher::new(2, 5).matches("Sorozat 2. évad 6. rész"));
        assert!(!EpisodeMatcher::new(2, 5).matches("Sorozat 12. évad 5. rész"));
    }

    #[test]
    fn test_bare_padded_token() {
        assert!(EpisodeMatcher::new(1, 2).matches("Show 0102 720p"));
        assert!(!EpisodeMatcher::new(1, 2).matches("Show 20102 720p"));
    }

    #[test]
    fn test_matcher_reused_across_names() {
        let matcher = EpisodeMatcher::new(3, 7);
        assert_eq!((matcher.season(), matcher.episode()), (3, 7));

        let names = ["Show.S03E07.720p", "Show 3x07", "Show.S03E08", "Show.S04E07"];
        let hits: Vec<&str> = names.into_iter().filter(|n| matcher.matches(n)).collect();
        assert_eq!(hits, vec!["Show.S03E07.720p", "Show 3x07"]);
        assert!(matcher.has_season_token("Show.S03.Complete"));
        assert!(!matcher.has_season_token("Show.S13.Complete"));
    }

    #[test]
    fn test_double_digit_numbers() {
        assert!(EpisodeMatcher::new(10, 15).matches("Show.S10E15.1080p"));
        assert!(EpisodeMatcher::new(10, 15).matches("Show 10x15"));
        assert!(!EpisodeMatcher::new(1, 15).matches("Show.S10E15.1080p"));
    }

    #[test]
    fn test_episode_tokens() {
        assert!(has_episode_token("Show.S01E05.1080p"));
        assert!(has_episode_token("Show 1x05"));
        assert!(has_episode_token("Sorozat 1. évad 5. rész"));
        assert!(!has_episode_token("Show.S01.1080p.x264"));
        assert!(!has_episode_token("Show Season 1 DDP5.1 H.264"));
    }

    #[test]
    fn test_season_packs() {
        assert!(is_season_pack("Show.S01.1080p.WEB"));
        assert!(is_season_pack("Show Season 2 720p"));
        assert!(is_season_pack("Show Complete Series"));
        assert!(is_season_pack("Sorozat 3. évad"));
        assert!(!is_season_pack("Show.S01E01.1080p"));
        assert!(!is_season_pack("Movie.2020.1080p"));
    }

    #[test]
    fn test_matching_season_pack() {
        assert!(EpisodeMatcher::new(1, 1).is_matching_season_pack("Show.S01.1080p"));
        assert!(!EpisodeMatcher::new(1, 1).is_matching_season_pack("Show.S02.1080p"));
        assert!(!EpisodeMatcher::new(1, 1).is_matching_season_pack("Show.S01E03.1080p"));
        assert!(EpisodeMatcher::new(1, 1).is_matching_season_pack("Show Season 01 720p"));
    }
}
