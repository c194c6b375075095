//! Deduplication of candidates by (tracker, name).

use std::cmp::Ordering;
use std::collections::HashMap;

use super::Candidate;

/// Preference between two candidates sharing a dedup key.
///
/// More seeds wins, then more peers, then larger size, then the
/// lexicographically smaller uri. The winner never depends on input order.
fn prefer(a: &Candidate, b: &Candidate) -> Ordering {
    a.seeds
        .cmp(&b.seeds)
        .then(a.peers.cmp(&b.peers))
        .then(a.size_bytes.cmp(&b.size_bytes))
        .then_with(|| b.uri.cmp(&a.uri))
}

/// Collapse candidates with the same (tracker, name) into one entry.
///
/// The output is sorted by (tracker, name) so that repeated calls on any
/// permutation of the same input produce identical results.
pub fn deduplicate_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut by_key: HashMap<(String, String), Candidate> = HashMap::new();

    for candidate in candidates {
        let key = (candidate.tracker.clone(), candidate.name.clone());
        match by_key.get_mut(&key) {
            Some(existing) => {
                if prefer(&candidate, existing) == Ordering::Greater {
                    *existing = candidate;
                }
            }
            None => {
                by_key.insert(key, candidate);
            }
        }
    }

    let mut results: Vec<_> = by_key.into_values().collect();
    results.sort_by(|a, b| a.dedup_key().cmp(&b.dedup_key()));
    results
}
