//! Ranking pipeline.
//!
//! Turns raw provider candidates into an ordered, filtered, deduplicated list
//! of [`ScoredCandidate`]s. Each pass is a pure function of its inputs.

mod dedup;
mod engine;
mod filters;
pub mod score;
mod types;

pub use dedup::deduplicate_candidates;
pub use engine::{compare_scored, rank, score_candidate};
pub use types::*;
