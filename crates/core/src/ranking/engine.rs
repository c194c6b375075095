//! The ranking pass: dedup, score, sort, filter.

use std::cmp::Ordering;

use tracing::debug;

use crate::classify::{
    guess_languages, guess_quality, has_subtitle_hint, is_season_pack, tokenize, EpisodeMatcher,
};

use super::dedup::deduplicate_candidates;
use super::score::{composite_score, ScoreInput};
use super::{Candidate, RankContext, ScoredCandidate};

fn is_freeleech(candidate: &Candidate) -> bool {
    if candidate.freeleech == Some(true) {
        return true;
    }
    let tokens = tokenize(&candidate.name);
    tokens.iter().any(|t| t == "freeleech")
        || (tokens.iter().any(|t| t == "free") && tokens.iter().any(|t| t == "leech"))
}

/// Classify and score one candidate.
pub fn score_candidate(candidate: Candidate, ctx: &RankContext) -> ScoredCandidate {
    let quality = guess_quality(&candidate.name);
    let language_tags = guess_languages(&candidate.name, candidate.category.as_deref());
    let season_pack = is_season_pack(&candidate.name);

    let input = ScoreInput {
        name: &candidate.name,
        tracker: &candidate.tracker,
        seeds: candidate.seeds,
        size_bytes: candidate.size_bytes,
        resolution: quality.resolution,
        is_low_quality_capture: quality.is_low_quality_capture,
        has_target_audio: language_tags.contains(ctx.target_language),
        has_target_subtitle: has_subtitle_hint(&candidate.name, ctx.target_language),
        is_season_pack: season_pack,
        is_freeleech: is_freeleech(&candidate),
        is_episode: ctx.is_episode_query() && !season_pack,
    };
    let composite_score = composite_score(&input);

    ScoredCandidate {
        candidate,
        composite_score,
        quality_label: quality.label,
        quality_score: quality.score,
        language_tags,
        season_pack,
    }
}

/// Total order: composite score desc, seeds desc, then (tracker, name).
pub fn compare_scored(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then(b.candidate.seeds.cmp(&a.candidate.seeds))
        .then_with(|| a.candidate.dedup_key().cmp(&b.candidate.dedup_key()))
}

fn keep(scored: &ScoredCandidate, ctx: &RankContext, episode: Option<&EpisodeMatcher>) -> bool {
    let c = &scored.candidate;

    if c.seeds == 0 {
        return false;
    }
    if c.category.as_deref().is_some_and(|cat| cat.contains("DVD")) {
        return false;
    }
    if !ctx.filters.allows_format(&c.name) || !ctx.filters.allows_quality(&scored.quality_label) {
        return false;
    }

    if let Some(matcher) = episode {
        if matcher.is_matching_season_pack(&c.name) {
            return true;
        }
        if !matcher.matches(&c.name) {
            return false;
        }
    }

    true
}

/// Rank raw candidates. The first element is the best recommendation.
///
/// Pure: the result depends only on the set of inputs, never on their order.
pub fn rank(candidates: Vec<Candidate>, ctx: &RankContext) -> Vec<ScoredCandidate> {
    let total = candidates.len();

    let mut scored: Vec<ScoredCandidate> = deduplicate_candidates(candidates)
        .into_iter()
        .map(|c| score_candidate(c, ctx))
        .collect();
    scored.sort_by(compare_scored);
    let episode = ctx.episode_matcher();
    scored.retain(|s| keep(s, ctx, episode.as_ref()));

    debug!(
        input = total,
        ranked = scored.len(),
        season = ?ctx.season,
        episode = ?ctx.episode,
        "Ranked candidates"
    );

    scored
}
