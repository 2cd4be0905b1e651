//! Textual similarity between error signatures.

use crate::models::ErrorSignature;

/// Minimum similarity for two singleton clusters to be fuzzy-merged.
pub const SIMILARITY_THRESHOLD: f64 = 0.80;

/// Similarity between two signatures in [0, 1].
///
/// A type mismatch disqualifies fuzzy matching entirely and scores 0.0
/// regardless of message content. Matching types score the
/// longest-common-subsequence ratio of the normalized messages, which is
/// symmetric and gives exactly 1.0 for identical strings.
pub fn similarity(a: &ErrorSignature, b: &ErrorSignature) -> f64 {
    if a.error_type != b.error_type {
        return 0.0;
    }
    sequence_ratio(&a.normalized_message, &b.normalized_message)
}

/// Char-level `2 * lcs / (|a| + |b|)`. Two empty strings are identical and
/// score 1.0.
fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2.0 * lcs_length(&a, &b) as f64) / total as f64
}

/// Longest common subsequence length, two-row dynamic programming.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
