//! End-to-end tests for the error clustering engine.

use test_insights::models::{FailureRecord, MatchType};
use test_insights::services::clustering::{self, normalizer, signature, similarity};

fn failure(name: &str, message: &str) -> FailureRecord {
    FailureRecord::new(name, message)
}

#[test]
fn identical_failures_collapse_into_one_exact_cluster() {
    let failures: Vec<FailureRecord> = (0..10)
        .map(|i| failure(&format!("test_{}", i), "TimeoutError: node edge-1 unreachable"))
        .collect();

    let summary = clustering::cluster_failures(&failures);
    assert_eq!(summary.total_failures, 10);
    assert_eq!(summary.unique_clusters, 1);
    assert_eq!(summary.largest_cluster, 10);
    assert_eq!(summary.unclustered, 0);
    assert_eq!(summary.clusters[0].match_type, MatchType::Exact);
}

#[test]
fn disjoint_error_types_never_cluster() {
    let failures = vec![
        failure("test_a", "KeyError: 'alpha'"),
        failure("test_b", "IndexError: list index out of range"),
        failure("test_c", "TimeoutError: operation timed out"),
        failure("test_d", "ValueError: invalid literal"),
    ];

    let summary = clustering::cluster_failures(&failures);
    assert_eq!(summary.unique_clusters, 4);
    assert_eq!(summary.unclustered, 4);
    assert!(summary.clusters.iter().all(|c| c.count == 1));
}

#[test]
fn cluster_counts_account_for_every_message_bearing_failure() {
    let mut without_message = failure("test_x", "ignored");
    without_message.failure_message = None;

    let failures = vec![
        failure("test_a", "KeyError: 'alpha'"),
        failure("test_b", "KeyError: 'alpha'"),
        failure("test_c", "ValueError: bad input"),
        without_message,
    ];

    let summary = clustering::cluster_failures(&failures);
    let member_total: usize = summary.clusters.iter().map(|c| c.count).sum();
    assert_eq!(member_total, 3);
    assert_eq!(summary.total_failures, 4);
}

#[test]
fn assertion_failures_with_variable_status_codes_cluster_together() {
    let failures = vec![
        failure("test_login", "AssertionError: Expected 200 but got 404"),
        failure("test_logout", "AssertionError: Expected 200 but got 500"),
        failure("test_signup", "AssertionError: Expected 200 but got 403"),
    ];

    let summary = clustering::cluster_failures(&failures);
    assert_eq!(summary.unique_clusters, 1);
    assert_eq!(summary.clusters[0].count, 3);
    assert_eq!(summary.clusters[0].match_type, MatchType::Exact);
    assert_eq!(
        summary.clusters[0].signature.normalized_message,
        "Expected {N} but got {N}"
    );
}

#[test]
fn clusters_carry_topology_and_priority_rollups() {
    let mut a = failure("test_a", "KeyError: 'alpha'");
    a.topology = Some("3-site".to_string());
    a.priority = Some("P0".to_string());
    let mut b = failure("test_b", "KeyError: 'alpha'");
    b.topology = Some("5-site".to_string());
    b.priority = Some("P0".to_string());

    let summary = clustering::cluster_failures(&[a, b]);
    let cluster = &summary.clusters[0];
    assert!(cluster.affected_topologies.contains("3-site"));
    assert!(cluster.affected_topologies.contains("5-site"));
    assert_eq!(cluster.affected_priorities.len(), 1);
}

#[test]
fn normalization_is_idempotent() {
    let messages = [
        "connection to 10.0.0.1:8080 refused",
        "object at 0x7f3a2b1c missing for job 550e8400-e29b-41d4-a716-446655440000",
        "read /var/log/app/current.log failed after 30 seconds",
    ];
    for message in messages {
        let once = normalizer::normalize(message);
        assert_eq!(normalizer::normalize(&once), once);
    }
}

#[test]
fn fingerprints_are_deterministic_across_extractions() {
    let message = concat!(
        "RuntimeError: replication stalled on node edge-17\n",
        "  File \"tests/ha/test_repl.py\", line 88, in test_repl\n",
    );
    let a = signature::extract(message);
    let b = signature::extract(message);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.fingerprint.len(), 64);
}

#[test]
fn similarity_is_symmetric_and_type_gated() {
    let a = signature::extract("RuntimeError: replication lag exceeded on 10.0.0.1");
    let b = signature::extract("RuntimeError: replication lag detected on 10.0.0.2");
    let c = signature::extract("TimeoutError: replication lag exceeded on 10.0.0.1");

    assert_eq!(
        similarity::similarity(&a, &b),
        similarity::similarity(&b, &a)
    );
    assert_eq!(similarity::similarity(&a, &c), 0.0);
}
