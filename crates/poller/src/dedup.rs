//! Pure filtering of run candidates against the seen-run set.

use std::collections::HashSet;

use runwatch_leaderboard::RunCandidate;

/// Return the candidates whose ids are absent from `seen`, preserving
/// input order. Duplicate ids within the batch are kept once (first
/// occurrence wins), guarding against pagination overlap.
pub fn filter_new(
    candidates: Vec<RunCandidate>,
    seen: &HashSet<String>,
) -> Vec<RunCandidate> {
    let mut in_batch = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| {
            !seen.contains(&candidate.run_id) && in_batch.insert(candidate.run_id.clone())
        })
        .collect()
}
