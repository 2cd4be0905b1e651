//! Storage seams for the reconciliation engine.
//!
//! The sync orchestrator only sees these traits; production wires a SQL
//! backend, tests and the preview tooling wire the in-memory store.

pub mod memory;

pub use memory::{InMemoryAuditSink, InMemoryMetadataStore};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{DiscoveredTest, MetadataSyncLog, TestcaseMetadata, TestcaseMetadataChange};

/// Row counts from one applied change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Testcase metadata persistence.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Effective metadata view for one sync scope, keyed by stored testcase
    /// name. For a release scope, release rows shadow global rows of the
    /// same name; rows scoped to other releases are excluded. Soft-deleted
    /// rows are included so the caller can restore or skip them.
    async fn fetch_existing(
        &self,
        release_id: Option<&str>,
    ) -> AppResult<HashMap<String, TestcaseMetadata>>;

    /// Apply one diff atomically: either every change lands or none do.
    /// Adds are scoped by `release_id`; removes are soft-deletes.
    async fn apply_changes(
        &self,
        release_id: Option<&str>,
        adds: &[DiscoveredTest],
        updates: &[TestcaseMetadata],
        removes: &[TestcaseMetadata],
    ) -> AppResult<ApplyCounts>;
}

/// Append-only audit output for sync runs.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn create_sync_log(&self, log: &MetadataSyncLog) -> AppResult<()>;
    async fn finalize_sync_log(&self, log: &MetadataSyncLog) -> AppResult<()>;
    async fn record_changes(&self, changes: &[TestcaseMetadataChange]) -> AppResult<()>;
}
