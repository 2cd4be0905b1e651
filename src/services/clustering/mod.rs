//! Error clustering engine.
//!
//! Groups a batch of failed test results into clusters by exact signature
//! fingerprint, then fuzzy-merges the remaining singletons whose normalized
//! messages are textually close. Pure and synchronous: safe to call from any
//! number of parallel request handlers.

pub mod normalizer;
pub mod signature;
pub mod similarity;

pub use similarity::SIMILARITY_THRESHOLD;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::models::{ClusterSummary, ErrorCluster, FailureRecord, MatchType};

/// Cluster one batch of failures and compute summary statistics.
///
/// Records without a failure message count toward `total_failures` but join
/// no cluster. The fuzzy pass is O(n²) in the number of distinct singleton
/// signatures; fine at per-job failure volumes (tens to low hundreds), so
/// callers batching more than that should split by job first.
pub fn cluster_failures(failures: &[FailureRecord]) -> ClusterSummary {
    let total_failures = failures.len();
    if failures.is_empty() {
        return ClusterSummary {
            total_failures: 0,
            unique_clusters: 0,
            largest_cluster: 0,
            unclustered: 0,
            clusters: Vec::new(),
        };
    }

    // Exact grouping by fingerprint, preserving first-seen order.
    let mut clusters: Vec<ErrorCluster> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in failures {
        let Some(message) = record.failure_message.as_deref() else {
            continue;
        };
        let sig = signature::extract(message);
        let fingerprint = sig.fingerprint.clone();
        let idx = *index.entry(fingerprint).or_insert_with(|| {
            clusters.push(ErrorCluster::new(sig));
            clusters.len() - 1
        });
        clusters[idx].add_result(record);
    }

    // Multi-member clusters stay exact; singletons are fuzzy-merge candidates.
    let (mut combined, singles): (Vec<_>, Vec<_>) =
        clusters.into_iter().partition(|c| c.count > 1);

    combined.extend(merge_singletons(singles));
    // Stable sort keeps encounter order among equal counts.
    combined.sort_by(|a, b| b.count.cmp(&a.count));

    let unique_clusters = combined.len();
    let largest_cluster = combined.iter().map(|c| c.count).max().unwrap_or(0);
    let unclustered = combined.iter().filter(|c| c.count == 1).count();

    info!(
        "Clustered {} failures into {} clusters ({} unclustered)",
        total_failures, unique_clusters, unclustered
    );

    ClusterSummary {
        total_failures,
        unique_clusters,
        largest_cluster,
        unclustered,
        clusters: combined,
    }
}

/// Greedy fuzzy merge over singleton clusters in original order. Each
/// singleton joins exactly one fuzzy cluster; a cluster that absorbs no peer
/// stays exact with count 1.
fn merge_singletons(singles: Vec<ErrorCluster>) -> Vec<ErrorCluster> {
    let mut consumed = vec![false; singles.len()];
    let mut merged = Vec::new();

    for i in 0..singles.len() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        let mut current = singles[i].clone();

        for (j, candidate) in singles.iter().enumerate().skip(i + 1) {
            if consumed[j] {
                continue;
            }
            let score = similarity::similarity(&current.signature, &candidate.signature);
            if score >= SIMILARITY_THRESHOLD {
                debug!(
                    "Fuzzy merge ({:.2}): {} <- {}",
                    score, current.signature.fingerprint, candidate.signature.fingerprint
                );
                current.match_type = MatchType::Fuzzy;
                current.absorb(candidate);
                consumed[j] = true;
            }
        }
        merged.push(current);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(name: &str, message: &str) -> FailureRecord {
        FailureRecord::new(name, message)
    }

    #[test]
    fn test_identical_messages_form_one_exact_cluster() {
        let failures = vec![
            failure("test_a", "KeyError: 'replica'"),
            failure("test_b", "KeyError: 'replica'"),
            failure("test_c", "KeyError: 'replica'"),
        ];
        let summary = cluster_failures(&failures);
        assert_eq!(summary.unique_clusters, 1);
        assert_eq!(summary.clusters[0].count, 3);
        assert_eq!(summary.clusters[0].match_type, MatchType::Exact);
        assert_eq!(summary.unclustered, 0);
    }

    #[test]
    fn test_close_singletons_merge_fuzzily() {
        let failures = vec![
            failure("test_a", "RuntimeError: replication lag exceeded on 10.0.0.1"),
            failure("test_b", "RuntimeError: replication lag detected on 10.0.0.2"),
        ];
        let summary = cluster_failures(&failures);
        assert_eq!(summary.unique_clusters, 1);
        assert_eq!(summary.clusters[0].count, 2);
        assert_eq!(summary.clusters[0].match_type, MatchType::Fuzzy);
    }

    #[test]
    fn test_type_mismatch_blocks_fuzzy_merge() {
        let failures = vec![
            failure("test_a", "TimeoutError: node unreachable"),
            failure("test_b", "ConnectionError: node unreachable"),
        ];
        let summary = cluster_failures(&failures);
        assert_eq!(summary.unique_clusters, 2);
        assert_eq!(summary.unclustered, 2);
    }

    #[test]
    fn test_missing_messages_counted_but_not_clustered() {
        let mut no_message = failure("test_a", "ignored");
        no_message.failure_message = None;
        let failures = vec![no_message, failure("test_b", "KeyError: 'x'")];

        let summary = cluster_failures(&failures);
        assert_eq!(summary.total_failures, 2);
        assert_eq!(summary.unique_clusters, 1);
        let member_total: usize = summary.clusters.iter().map(|c| c.count).sum();
        assert_eq!(member_total, 1);
    }

    #[test]
    fn test_clusters_sorted_by_count_descending() {
        let failures = vec![
            failure("test_a", "KeyError: 'alpha'"),
            failure("test_b", "IndexError: list index out of range"),
            failure("test_c", "IndexError: list index out of range"),
        ];
        let summary = cluster_failures(&failures);
        assert_eq!(summary.clusters[0].signature.error_type, "IndexError");
        assert_eq!(summary.largest_cluster, 2);
    }

    #[test]
    fn test_empty_input_short_circuits() {
        let summary = cluster_failures(&[]);
        assert_eq!(summary.total_failures, 0);
        assert_eq!(summary.unique_clusters, 0);
        assert_eq!(summary.largest_cluster, 0);
        assert_eq!(summary.unclustered, 0);
        assert!(summary.clusters.is_empty());
    }

    #[test]
    fn test_sample_message_is_first_raw_message() {
        let failures = vec![
            failure("test_a", "AssertionError: Expected 200 but got 404"),
            failure("test_b", "AssertionError: Expected 200 but got 500"),
        ];
        let summary = cluster_failures(&failures);
        assert_eq!(summary.unique_clusters, 1);
        assert_eq!(
            summary.clusters[0].sample_message.as_deref(),
            Some("AssertionError: Expected 200 but got 404")
        );
    }
}
