//! Audit models for metadata sync runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of one sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the sync was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Manual,
    Scheduled,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row per sync invocation. Created before any I/O, finalized exactly
/// once at sync end, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSyncLog {
    pub id: Uuid,
    pub status: SyncStatus,
    pub sync_type: SyncType,
    pub release_id: Option<String>,
    pub tests_discovered: usize,
    pub tests_added: usize,
    pub tests_updated: usize,
    pub tests_removed: usize,
    pub git_commit_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Serialized detail, e.g. the list of files that failed to parse
    pub error_details: Option<String>,
}

impl MetadataSyncLog {
    /// Open a new in-progress log row.
    pub fn begin(sync_type: SyncType, release_id: Option<&str>) -> Self {
        MetadataSyncLog {
            id: Uuid::new_v4(),
            status: SyncStatus::InProgress,
            sync_type,
            release_id: release_id.map(str::to_string),
            tests_discovered: 0,
            tests_added: 0,
            tests_updated: 0,
            tests_removed: 0,
            git_commit_hash: None,
            started_at: Utc::now(),
            finished_at: None,
            error_message: None,
            error_details: None,
        }
    }
}

/// Kind of individual metadata decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Updated,
    Removed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        }
    }
}

/// Append-only audit record for one add/update/remove decision, linked to
/// its sync log row with before/after value snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestcaseMetadataChange {
    pub sync_id: Uuid,
    pub change_type: ChangeType,
    pub testcase_name: String,
    pub release_id: Option<String>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}
