//! Lexical similarity ranking over candidate snippets.
//!
//! Deterministic Jaccard-index ranking used by the retrieval-driven locator:
//! texts are tokenized into case-normalized word sets and scored by
//! `|intersection| / |union|`. Ties keep original candidate order, so the
//! ranking is stable and testable.

use std::collections::HashSet;

/// Case-normalized, punctuation-insensitive word set.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Jaccard index between two token sets. An empty union scores 0.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Rank candidate indices by lexical overlap with the query, best first.
///
/// Never fails: an empty candidate list yields an empty ranking.
pub fn rank(query: &str, candidates: &[String]) -> Vec<usize> {
    let query_tokens = tokenize(query);
    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| jaccard(&query_tokens, &tokenize(c)))
        .collect();

    let mut indices: Vec<usize> = (0..candidates.len()).collect();
    // Stable sort keeps original order for tied scores.
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices
}
