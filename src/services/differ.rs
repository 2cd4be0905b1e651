//! Diffing discovered tests against stored metadata.
//!
//! Produces the add/update/remove plan for one sync run without touching
//! storage: pure input, pure output, so every reconciliation rule is
//! testable in isolation.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{DiscoveredTest, TestcaseMetadata};
use crate::services::test_names;

/// Planned changes for one sync run.
#[derive(Debug, Default)]
pub struct MetadataDiff {
    /// New rows to create, scoped by the sync's release
    pub to_add: Vec<DiscoveredTest>,
    /// Existing row paired with the discovery that updates it
    pub to_update: Vec<(TestcaseMetadata, DiscoveredTest)>,
    /// Rows to soft-delete
    pub to_remove: Vec<TestcaseMetadata>,
}

impl MetadataDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Compare one discovery run against the stored view for the sync's scope.
///
/// `existing` is the effective view keyed by stored (possibly parametrized)
/// testcase name, including soft-deleted rows. Matching is by base name, so
/// one discovered test can update several parametrized variants.
///
/// Release-scoped runs never mutate global rows: a global match that needs
/// changes yields a release-specific shadow add instead, and unmatched
/// global rows are left alone.
pub fn compare(
    discovered: &[DiscoveredTest],
    existing: &HashMap<String, TestcaseMetadata>,
    release_id: Option<&str>,
) -> MetadataDiff {
    let by_base: HashMap<&str, &DiscoveredTest> = discovered
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect();

    let mut diff = MetadataDiff::default();
    let mut existing_bases: HashSet<&str> = HashSet::new();
    let mut shadowed: HashSet<&str> = HashSet::new();

    // Deterministic plan order regardless of map iteration order.
    let mut rows: Vec<&TestcaseMetadata> = existing.values().collect();
    rows.sort_by(|a, b| a.testcase_name.cmp(&b.testcase_name));

    for row in rows {
        let base = test_names::normalize_test_name(&row.testcase_name);
        let Some(test) = by_base.get(base) else {
            if row.is_removed {
                continue;
            }
            if release_id.is_some() && row.release_id.is_none() {
                // Out of scope for a release-scoped run
                continue;
            }
            diff.to_remove.push(row.clone());
            continue;
        };
        existing_bases.insert(base);

        if !needs_update(row, test) {
            continue;
        }
        if release_id.is_some() && row.release_id.is_none() {
            if shadowed.insert(base) {
                debug!("Shadowing global row {} for release scope", base);
                diff.to_add.push((*test).clone());
            }
            continue;
        }
        diff.to_update.push((row.clone(), (*test).clone()));
    }

    for test in discovered {
        if !existing_bases.contains(test.name.as_str()) && !shadowed.contains(test.name.as_str()) {
            diff.to_add.push(test.clone());
        }
    }

    diff
}

/// True when discovery would change the stored row. A soft-deleted match
/// always needs an update (the restore). Priority only counts when the
/// stored value is unset and discovery supplies one.
fn needs_update(row: &TestcaseMetadata, test: &DiscoveredTest) -> bool {
    if row.is_removed {
        return true;
    }
    row.module != test.module
        || row.topology != test.topology
        || row.test_state != test.test_state
        || row.test_class_name != test.class_name
        || row.test_path != test.path
        || row.test_case_id != test.case_id
        || row.testrail_id != test.testrail_id
        || (row.priority.is_none() && test.priority.is_some())
}
