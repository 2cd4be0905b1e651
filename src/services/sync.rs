//! Metadata sync orchestration.
//!
//! One sync run: refresh the test repository, discover tests, diff against
//! the stored view, apply the diff, and leave a full audit trail. Every run
//! is logged, including failed ones.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::db::{AuditSink, MetadataStore};
use crate::error::AppResult;
use crate::models::{
    ChangeType, DiscoveredTest, MetadataSyncLog, SyncStatus, SyncType, TestcaseMetadata,
    TestcaseMetadataChange,
};
use crate::repo::RepositorySource;
use crate::services::differ::{self, MetadataDiff};
use crate::services::discovery::{self, DiscoveryLimits, DiscoveryOutcome};

/// Serializes working-copy access across concurrent syncs in this process.
/// Held only around refresh and discovery, not the storage phase.
static REPO_LOCK: Mutex<()> = Mutex::const_new(());

/// Filesystem layout and parse limits for discovery runs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Local checkout of the test repository
    pub workdir: PathBuf,
    /// Tests directory, relative to the checkout root
    pub tests_path: PathBuf,
    /// Staging roster, relative to the checkout root
    pub staging_config: PathBuf,
    pub limits: DiscoveryLimits,
}

/// Runs metadata syncs against pluggable repository, store, and audit
/// backends.
pub struct SyncEngine<R, S, A> {
    repo: R,
    store: S,
    audit: A,
    settings: SyncSettings,
    progress: Option<mpsc::UnboundedSender<String>>,
}

impl<R, S, A> SyncEngine<R, S, A>
where
    R: RepositorySource,
    S: MetadataStore,
    A: AuditSink,
{
    pub fn new(repo: R, store: S, audit: A, settings: SyncSettings) -> Self {
        SyncEngine {
            repo,
            store,
            audit,
            settings,
            progress: None,
        }
    }

    /// Attach a channel that receives human-readable progress lines.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<String>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    fn report(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        if let Some(sender) = &self.progress {
            // A closed receiver just means nobody is watching.
            let _ = sender.send(message);
        }
    }

    /// Run one sync end to end. Returns the finalized log row on success.
    /// Repository, discovery, and persistence failures are recorded in the
    /// log, the log is finalized as failed, and the error then propagates.
    pub async fn run(
        &self,
        release_id: Option<&str>,
        branch: &str,
        sync_type: SyncType,
    ) -> AppResult<MetadataSyncLog> {
        let mut log = MetadataSyncLog::begin(sync_type, release_id);
        self.audit.create_sync_log(&log).await?;
        self.report(format!(
            "Starting {} metadata sync (release: {}, branch: {})",
            sync_type,
            release_id.unwrap_or("global"),
            branch
        ));

        let outcome = self.execute(release_id, branch, &mut log).await;
        match &outcome {
            Ok(()) => {
                log.status = SyncStatus::Success;
                self.report(format!(
                    "Sync complete: {} discovered, {} added, {} updated, {} removed",
                    log.tests_discovered, log.tests_added, log.tests_updated, log.tests_removed
                ));
            }
            Err(e) => {
                error!("Metadata sync {} failed: {}", log.id, e);
                log.status = SyncStatus::Failed;
                log.error_message = Some(e.to_string());
            }
        }
        log.finished_at = Some(Utc::now());
        self.audit.finalize_sync_log(&log).await?;
        outcome.map(|()| log)
    }

    async fn execute(
        &self,
        release_id: Option<&str>,
        branch: &str,
        log: &mut MetadataSyncLog,
    ) -> AppResult<()> {
        // Working-copy phase under the process lock; storage work happens
        // after release so a slow database does not serialize discovery.
        let outcome = {
            let _guard = REPO_LOCK.lock().await;
            let commit = self.repo.refresh(branch).await?;
            log.git_commit_hash = Some(commit);
            self.report("Repository refreshed, discovering tests");
            discovery::discover(
                &self.settings.workdir,
                &self.settings.tests_path,
                &self.settings.staging_config,
                self.settings.limits,
            )?
        };

        let DiscoveryOutcome {
            tests,
            failed_files,
        } = outcome;
        log.tests_discovered = tests.len();
        if !failed_files.is_empty() {
            warn!("{} test files failed to parse", failed_files.len());
            log.error_details = Some(serde_json::to_string(&failed_files)?);
        }
        self.report(format!("Discovered {} tests", tests.len()));

        let existing = self.store.fetch_existing(release_id).await?;
        let diff = differ::compare(&tests, &existing, release_id);
        if diff.is_empty() {
            self.report("Metadata already up to date");
            return Ok(());
        }

        self.apply(release_id, &existing, diff, log).await
    }

    async fn apply(
        &self,
        release_id: Option<&str>,
        existing: &HashMap<String, TestcaseMetadata>,
        diff: MetadataDiff,
        log: &mut MetadataSyncLog,
    ) -> AppResult<()> {
        let changes = build_change_records(log, release_id, existing, &diff);
        let updates: Vec<TestcaseMetadata> = diff
            .to_update
            .iter()
            .map(|(row, test)| row.apply_discovery(test))
            .collect();

        let counts = self
            .store
            .apply_changes(release_id, &diff.to_add, &updates, &diff.to_remove)
            .await?;
        self.audit.record_changes(&changes).await?;

        log.tests_added = counts.added;
        log.tests_updated = counts.updated;
        log.tests_removed = counts.removed;
        Ok(())
    }
}

/// Audit rows with before/after snapshots for every planned change.
fn build_change_records(
    log: &MetadataSyncLog,
    release_id: Option<&str>,
    existing: &HashMap<String, TestcaseMetadata>,
    diff: &MetadataDiff,
) -> Vec<TestcaseMetadataChange> {
    let mut changes = Vec::new();
    let mut push = |change_type: ChangeType,
                    name: &str,
                    row_release: Option<&str>,
                    before: Option<&TestcaseMetadata>,
                    after: Option<&TestcaseMetadata>| {
        changes.push(TestcaseMetadataChange {
            sync_id: log.id,
            change_type,
            testcase_name: name.to_string(),
            release_id: row_release.map(str::to_string),
            before: before.and_then(|r| serde_json::to_value(r).ok()),
            after: after.and_then(|r| serde_json::to_value(r).ok()),
            changed_at: Utc::now(),
        });
    };

    for test in &diff.to_add {
        let after = test.to_metadata(release_id);
        // A shadow add records the global row it supersedes as `before`.
        let before = existing.get(&test.name).filter(|r| r.release_id.is_none());
        push(ChangeType::Added, &test.name, release_id, before, Some(&after));
    }
    for (row, test) in &diff.to_update {
        let after = row.apply_discovery(test);
        push(
            ChangeType::Updated,
            &row.testcase_name,
            row.release_id.as_deref(),
            Some(row),
            Some(&after),
        );
    }
    for row in &diff.to_remove {
        let mut after = row.clone();
        after.is_removed = true;
        push(
            ChangeType::Removed,
            &row.testcase_name,
            row.release_id.as_deref(),
            Some(row),
            Some(&after),
        );
    }
    changes
}
