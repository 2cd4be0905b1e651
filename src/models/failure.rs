//! Read-only projection of a failed test result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fields of a test result the clustering engine reads.
///
/// Supplied by the test-result provider per job; every field except the test
/// key may be absent in older ingested data, so they are explicit options
/// rather than probed attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Test key/name as ingested from the JUnit report
    pub test_name: String,
    /// Raw failure message, absent for results ingested without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    /// Declared priority at execution time (e.g. "P1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Topology the job ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<String>,
    /// Result ingestion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl FailureRecord {
    /// Create a record carrying only a name and a failure message.
    pub fn new(test_name: impl Into<String>, failure_message: impl Into<String>) -> Self {
        FailureRecord {
            test_name: test_name.into(),
            failure_message: Some(failure_message.into()),
            priority: None,
            topology: None,
            created_at: None,
        }
    }
}
