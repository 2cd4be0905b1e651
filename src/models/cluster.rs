//! Error cluster aggregates produced by one clustering run.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ErrorSignature, FailureRecord};

/// How a cluster's members were grouped together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// All members share the same signature fingerprint
    Exact,
    /// Members were merged by normalized-message similarity
    Fuzzy,
}

/// Reference to one test result that joined a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredResult {
    pub test_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One group of failures sharing a root cause.
///
/// Created empty with a signature, populated by repeated [`add_result`]
/// calls during a single clustering run, and discarded afterwards.
///
/// [`add_result`]: ErrorCluster::add_result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCluster {
    /// Representative signature (the first member's)
    pub signature: ErrorSignature,
    /// Members in the order they were added
    pub results: Vec<ClusteredResult>,
    /// Always equal to `results.len()`
    pub count: usize,
    pub affected_topologies: BTreeSet<String>,
    pub affected_priorities: BTreeSet<String>,
    /// First member's raw, unnormalized message; immutable once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_message: Option<String>,
    pub match_type: MatchType,
}

impl ErrorCluster {
    /// Create an empty exact cluster around a signature.
    pub fn new(signature: ErrorSignature) -> Self {
        ErrorCluster {
            signature,
            results: Vec::new(),
            count: 0,
            affected_topologies: BTreeSet::new(),
            affected_priorities: BTreeSet::new(),
            sample_message: None,
            match_type: MatchType::Exact,
        }
    }

    /// Add one failed result, accumulating topology/priority sets and
    /// capturing the first raw message as the sample.
    pub fn add_result(&mut self, record: &FailureRecord) {
        self.results.push(ClusteredResult {
            test_name: record.test_name.clone(),
            created_at: record.created_at,
        });
        self.count = self.results.len();

        if let Some(topology) = &record.topology {
            self.affected_topologies.insert(topology.clone());
        }
        if let Some(priority) = &record.priority {
            self.affected_priorities.insert(priority.clone());
        }
        if self.sample_message.is_none() {
            self.sample_message = record.failure_message.clone();
        }
    }

    /// Merge another cluster's members into this one. The representative
    /// signature and sample message stay this cluster's own.
    pub fn absorb(&mut self, other: &ErrorCluster) {
        self.results.extend(other.results.iter().cloned());
        self.count = self.results.len();
        self.affected_topologies
            .extend(other.affected_topologies.iter().cloned());
        self.affected_priorities
            .extend(other.affected_priorities.iter().cloned());
    }
}

/// Result of one clustering invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Input length, including results without a failure message
    pub total_failures: usize,
    /// Number of final clusters
    pub unique_clusters: usize,
    /// Size of the biggest cluster (0 when there are none)
    pub largest_cluster: usize,
    /// Final clusters with exactly one member
    pub unclustered: usize,
    /// Clusters ordered by count descending
    pub clusters: Vec<ErrorCluster>,
}
