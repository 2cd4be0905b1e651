//! Testcase metadata models owned by the reconciliation engine.

use serde::{Deserialize, Serialize};

/// Whether a test is considered stable enough to gate releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestState {
    Prod,
    Staging,
}

impl TestState {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "PROD",
            Self::Staging => "STAGING",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PROD" => Some(Self::Prod),
            "STAGING" => Some(Self::Staging),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Test priority, P0 (highest) through P3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted metadata for one testcase.
///
/// At most one row exists per `(testcase_name, release_id)` pair, including
/// at most one global row (`release_id = None`). A release-specific row
/// strictly shadows the global row of the same name for that release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestcaseMetadata {
    /// Base, unparametrized test name (historical rows may carry
    /// parametrized variants)
    pub testcase_name: String,
    /// None means global: applies to all releases absent a more specific row
    pub release_id: Option<String>,
    pub module: String,
    pub topology: String,
    pub test_state: TestState,
    pub test_class_name: Option<String>,
    pub test_path: String,
    pub test_case_id: Option<String>,
    pub testrail_id: Option<String>,
    /// Unset until discovery or an operator assigns one
    pub priority: Option<Priority>,
    /// Soft-delete flag; rows are never physically deleted
    pub is_removed: bool,
}

impl TestcaseMetadata {
    /// Produce the updated row for a discovery-driven update.
    ///
    /// Identity fields (stored name, release scope) are preserved; all
    /// discovered fields replace the stored ones except priority, where an
    /// operator-assigned value is never overwritten. A soft-deleted row is
    /// restored.
    pub fn apply_discovery(&self, discovered: &DiscoveredTest) -> TestcaseMetadata {
        TestcaseMetadata {
            testcase_name: self.testcase_name.clone(),
            release_id: self.release_id.clone(),
            module: discovered.module.clone(),
            topology: discovered.topology.clone(),
            test_state: discovered.test_state,
            test_class_name: discovered.class_name.clone(),
            test_path: discovered.path.clone(),
            test_case_id: discovered.case_id.clone(),
            testrail_id: discovered.testrail_id.clone(),
            priority: self.priority.or(discovered.priority),
            is_removed: false,
        }
    }
}

/// One test definition found by static discovery. Names are always base
/// names, since discovery reads definitions rather than parametrized
/// invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTest {
    pub name: String,
    pub module: String,
    pub topology: String,
    pub test_state: TestState,
    pub class_name: Option<String>,
    pub path: String,
    pub case_id: Option<String>,
    pub testrail_id: Option<String>,
    pub priority: Option<Priority>,
}

impl DiscoveredTest {
    /// Materialize a metadata row for the given release scope.
    pub fn to_metadata(&self, release_id: Option<&str>) -> TestcaseMetadata {
        TestcaseMetadata {
            testcase_name: self.name.clone(),
            release_id: release_id.map(str::to_string),
            module: self.module.clone(),
            topology: self.topology.clone(),
            test_state: self.test_state,
            test_class_name: self.class_name.clone(),
            test_path: self.path.clone(),
            test_case_id: self.case_id.clone(),
            testrail_id: self.testrail_id.clone(),
            priority: self.priority,
            is_removed: false,
        }
    }
}
