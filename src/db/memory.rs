//! In-memory store and audit sink.
//!
//! Backs the sync integration tests and the preview binary. Mirrors the SQL
//! backend's semantics: one row per `(testcase_name, release_id)`, soft
//! deletes, all-or-nothing change application.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::{ApplyCounts, AuditSink, MetadataStore};
use crate::error::{AppError, AppResult};
use crate::models::{DiscoveredTest, MetadataSyncLog, TestcaseMetadata, TestcaseMetadataChange};

type RowKey = (String, Option<String>);

/// Metadata store backed by a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    rows: Mutex<HashMap<RowKey, TestcaseMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows directly, bypassing sync. Test setup only.
    pub fn seed(&self, rows: Vec<TestcaseMetadata>) {
        let mut guard = self.lock();
        for row in rows {
            guard.insert((row.testcase_name.clone(), row.release_id.clone()), row);
        }
    }

    /// All rows, sorted by name then release, including soft-deleted ones.
    pub fn snapshot(&self) -> Vec<TestcaseMetadata> {
        let mut rows: Vec<TestcaseMetadata> = self.lock().values().cloned().collect();
        rows.sort_by(|a, b| {
            (a.testcase_name.as_str(), &a.release_id).cmp(&(b.testcase_name.as_str(), &b.release_id))
        });
        rows
    }

    pub fn get(&self, name: &str, release_id: Option<&str>) -> Option<TestcaseMetadata> {
        self.lock()
            .get(&(name.to_string(), release_id.map(str::to_string)))
            .cloned()
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RowKey, TestcaseMetadata>> {
        self.rows.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn fetch_existing(
        &self,
        release_id: Option<&str>,
    ) -> AppResult<HashMap<String, TestcaseMetadata>> {
        let guard = self.lock();
        let mut view: HashMap<String, TestcaseMetadata> = HashMap::new();

        // Release rows first so they win; global rows fill the gaps.
        if let Some(release) = release_id {
            for row in guard.values() {
                if row.release_id.as_deref() == Some(release) {
                    view.insert(row.testcase_name.clone(), row.clone());
                }
            }
        }
        for row in guard.values() {
            if row.release_id.is_none() {
                view.entry(row.testcase_name.clone()).or_insert_with(|| row.clone());
            }
        }
        Ok(view)
    }

    async fn apply_changes(
        &self,
        release_id: Option<&str>,
        adds: &[DiscoveredTest],
        updates: &[TestcaseMetadata],
        removes: &[TestcaseMetadata],
    ) -> AppResult<ApplyCounts> {
        let mut guard = self.lock();

        // Validate everything before mutating anything.
        for test in adds {
            let key = (test.name.clone(), release_id.map(str::to_string));
            if guard.contains_key(&key) {
                return Err(AppError::Persistence(format!(
                    "Duplicate metadata row for {} ({:?})",
                    test.name, release_id
                )));
            }
        }
        for row in updates.iter().chain(removes) {
            let key = (row.testcase_name.clone(), row.release_id.clone());
            if !guard.contains_key(&key) {
                return Err(AppError::Persistence(format!(
                    "Missing metadata row for {} ({:?})",
                    row.testcase_name, row.release_id
                )));
            }
        }

        for test in adds {
            let row = test.to_metadata(release_id);
            guard.insert((row.testcase_name.clone(), row.release_id.clone()), row);
        }
        for row in updates {
            guard.insert((row.testcase_name.clone(), row.release_id.clone()), row.clone());
        }
        for row in removes {
            let mut removed = row.clone();
            removed.is_removed = true;
            guard.insert(
                (removed.testcase_name.clone(), removed.release_id.clone()),
                removed,
            );
        }

        Ok(ApplyCounts {
            added: adds.len(),
            updated: updates.len(),
            removed: removes.len(),
        })
    }
}

/// Audit sink that collects logs and change rows in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    logs: Mutex<Vec<MetadataSyncLog>>,
    changes: Mutex<Vec<TestcaseMetadataChange>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    pub fn logs(&self) -> Vec<MetadataSyncLog> {
        self.logs.lock().expect("audit mutex poisoned").clone()
    }

    #[allow(clippy::expect_used)]
    pub fn changes(&self) -> Vec<TestcaseMetadataChange> {
        self.changes.lock().expect("audit mutex poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    #[allow(clippy::expect_used)]
    async fn create_sync_log(&self, log: &MetadataSyncLog) -> AppResult<()> {
        self.logs.lock().expect("audit mutex poisoned").push(log.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn finalize_sync_log(&self, log: &MetadataSyncLog) -> AppResult<()> {
        let mut guard = self.logs.lock().expect("audit mutex poisoned");
        match guard.iter_mut().find(|l| l.id == log.id) {
            Some(slot) => *slot = log.clone(),
            None => guard.push(log.clone()),
        }
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn record_changes(&self, changes: &[TestcaseMetadataChange]) -> AppResult<()> {
        self.changes
            .lock()
            .expect("audit mutex poisoned")
            .extend_from_slice(changes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestState;

    fn discovered(name: &str) -> DiscoveredTest {
        DiscoveredTest {
            name: name.to_string(),
            module: "m".to_string(),
            topology: "t".to_string(),
            test_state: TestState::Prod,
            class_name: None,
            path: "p.py".to_string(),
            case_id: None,
            testrail_id: None,
            priority: None,
        }
    }

    #[tokio::test]
    async fn test_release_rows_shadow_global_in_effective_view() {
        let store = InMemoryMetadataStore::new();
        let mut global = discovered("test_a").to_metadata(None);
        global.topology = "global".to_string();
        let mut scoped = discovered("test_a").to_metadata(Some("r1"));
        scoped.topology = "scoped".to_string();
        store.seed(vec![global, scoped, discovered("test_b").to_metadata(Some("r2"))]);

        let view = store.fetch_existing(Some("r1")).await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view["test_a"].topology, "scoped");

        let global_view = store.fetch_existing(None).await.unwrap();
        assert_eq!(global_view["test_a"].topology, "global");
        assert!(!global_view.contains_key("test_b"));
    }

    #[tokio::test]
    async fn test_apply_changes_is_all_or_nothing() {
        let store = InMemoryMetadataStore::new();
        store.seed(vec![discovered("test_a").to_metadata(None)]);

        // Second add collides with the seeded row; the first must not land.
        let adds = vec![discovered("test_new"), discovered("test_a")];
        let err = store.apply_changes(None, &adds, &[], &[]).await;
        assert!(err.is_err());
        assert!(store.get("test_new", None).is_none());
    }

    #[tokio::test]
    async fn test_remove_is_a_soft_delete() {
        let store = InMemoryMetadataStore::new();
        let row = discovered("test_a").to_metadata(None);
        store.seed(vec![row.clone()]);

        let counts = store.apply_changes(None, &[], &[], &[row]).await.unwrap();
        assert_eq!(counts.removed, 1);
        assert!(store.get("test_a", None).unwrap().is_removed);
    }
}
