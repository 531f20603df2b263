//! Issue similarity ranking for cache lookups.
//!
//! Jaccard overlap of lowercase word tokens with common English stop-words
//! removed. Ordering is fully deterministic: score, then newest record, then id.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::CachedPlanRecord;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "for", "from", "has", "have", "i",
    "if", "in", "is", "it", "its", "of", "on", "or", "so", "that", "the", "there", "this", "to", "was", "we", "when",
    "with", "you",
];

/// Lowercase word tokens with stop-words removed
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// |A ∩ B| / |A ∪ B|, 0.0 when both are empty
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Records scored against `issue`, best first
pub fn rank<'a>(issue: &str, records: &'a [CachedPlanRecord]) -> Vec<(f64, &'a CachedPlanRecord)> {
    let query = tokenize(issue);
    let mut scored: Vec<(f64, &CachedPlanRecord)> = records
        .iter()
        .map(|r| (jaccard(&query, &tokenize(&r.issue)), r))
        .collect();

    scored.sort_by(|(sa, ra), (sb, rb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| rb.created_at.cmp(&ra.created_at))
            .then_with(|| ra.id.cmp(&rb.id))
    });
    scored
}

/// Best record whose score reaches `min_similarity`
pub fn best_match<'a>(
    issue: &str,
    records: &'a [CachedPlanRecord],
    min_similarity: f64,
) -> Option<(f64, &'a CachedPlanRecord)> {
    rank(issue, records)
        .into_iter()
        .next()
        .filter(|(score, _)| *score >= min_similarity)
}
