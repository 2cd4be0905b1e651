//! Discovery tests against a synthetic test tree on disk.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use test_insights::error::AppError;
use test_insights::models::{DiscoveredTest, Priority, TestState};
use test_insights::services::discovery::{self, DiscoveryLimits};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run(root: &Path) -> discovery::DiscoveryOutcome {
    discovery::discover(
        root,
        Path::new("tests"),
        Path::new("config/staging.cfg"),
        DiscoveryLimits::default(),
    )
    .unwrap()
}

fn by_name<'a>(tests: &'a [DiscoveredTest], name: &str) -> &'a DiscoveredTest {
    tests
        .iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("test {} not discovered", name))
}

#[test]
fn class_level_annotations_apply_to_every_method() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/ha/test_failover.py",
        r#"
@pytest.mark.topology("5-site")
@pytest.mark.test_meta(case_id="C100", priority="P1")
class TestFailover:
    def test_primary_down(self):
        pass

    def test_replica_down(self):
        pass

    def helper(self):
        pass
"#,
    );

    let outcome = run(dir.path());
    assert_eq!(outcome.tests.len(), 2);

    let test = by_name(&outcome.tests, "test_primary_down");
    assert_eq!(test.topology, "5-site");
    assert_eq!(test.case_id.as_deref(), Some("C100"));
    assert_eq!(test.priority, Some(Priority::P1));
    assert_eq!(test.class_name.as_deref(), Some("TestFailover"));
    assert_eq!(test.module, "ha.test_failover");
    assert_eq!(test.path, "ha/test_failover.py");
}

#[test]
fn method_level_topology_overrides_class_level() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_mixed.py",
        r#"
@pytest.mark.topology("3-site")
class TestMixed:
    def test_default(self):
        pass

    @pytest.mark.topology("single")
    def test_override(self):
        pass
"#,
    );

    let outcome = run(dir.path());
    assert_eq!(by_name(&outcome.tests, "test_default").topology, "3-site");
    assert_eq!(by_name(&outcome.tests, "test_override").topology, "single");
}

#[test]
fn method_meta_replaces_class_meta_wholesale() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_meta.py",
        r#"
@pytest.mark.topology("single")
@pytest.mark.test_meta(case_id="C1", testrail_id="TR-1", priority="P0")
class TestMeta:
    @pytest.mark.test_meta(case_id="C2")
    def test_own_block(self):
        pass
"#,
    );

    let outcome = run(dir.path());
    let test = by_name(&outcome.tests, "test_own_block");
    assert_eq!(test.case_id.as_deref(), Some("C2"));
    // Not merged per field: the class block's testrail_id and priority drop
    assert_eq!(test.testrail_id, None);
    assert_eq!(test.priority, None);
}

#[test]
fn standalone_functions_and_multiline_decorators_are_discovered() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_standalone.py",
        r#"
@pytest.mark.topology(
    "5-site"
)
def test_solo():
    pass

def test_unannotated():
    pass
"#,
    );

    let outcome = run(dir.path());
    // No topology means excluded, not failed
    assert_eq!(outcome.tests.len(), 1);
    let test = by_name(&outcome.tests, "test_solo");
    assert_eq!(test.topology, "5-site");
    assert_eq!(test.class_name, None);
    assert!(outcome.failed_files.is_empty());
}

#[test]
fn parens_inside_decorator_strings_do_not_break_parsing() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_parens.py",
        r#"
@pytest.mark.topology("ring (3 nodes)")
def test_ring():
    pass

@pytest.mark.topology("half open )")
def test_half_open():
    pass
"#,
    );

    let outcome = run(dir.path());
    assert!(outcome.failed_files.is_empty());
    assert_eq!(by_name(&outcome.tests, "test_ring").topology, "ring (3 nodes)");
    assert_eq!(
        by_name(&outcome.tests, "test_half_open").topology,
        "half open )"
    );
}

#[test]
fn non_test_classes_and_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_helpers.py",
        r#"
@pytest.mark.topology("single")
class Fixtures:
    def test_looks_like_a_test(self):
        pass
"#,
    );
    write(dir.path(), "tests/conftest.py", "def test_ignored(): pass\n");

    let outcome = run(dir.path());
    assert!(outcome.tests.is_empty());
}

#[test]
fn staging_config_drives_test_state() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "config/staging.cfg",
        "[staging]\nnew_tests = test_fresh\n",
    );
    write(
        dir.path(),
        "tests/test_states.py",
        r#"
@pytest.mark.topology("single")
class TestStates:
    def test_fresh(self):
        pass

    def test_stable(self):
        pass
"#,
    );

    let outcome = run(dir.path());
    assert_eq!(
        by_name(&outcome.tests, "test_fresh").test_state,
        TestState::Staging
    );
    assert_eq!(
        by_name(&outcome.tests, "test_stable").test_state,
        TestState::Prod
    );
}

#[test]
fn missing_staging_config_defaults_everything_to_prod() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_a.py",
        "@pytest.mark.topology(\"single\")\ndef test_a():\n    pass\n",
    );

    let outcome = run(dir.path());
    assert_eq!(by_name(&outcome.tests, "test_a").test_state, TestState::Prod);
}

#[test]
fn unterminated_decorator_fails_only_that_file() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tests/test_broken.py",
        "@pytest.mark.topology(\"single\"\n",
    );
    write(
        dir.path(),
        "tests/test_ok.py",
        "@pytest.mark.topology(\"single\")\ndef test_ok():\n    pass\n",
    );
    write(
        dir.path(),
        "tests/test_ok_too.py",
        "@pytest.mark.topology(\"single\")\ndef test_ok_too():\n    pass\n",
    );

    // 1 of 3 files failing stays under the default 0.5 ratio.
    let outcome = run(dir.path());
    assert_eq!(outcome.tests.len(), 2);
    assert_eq!(outcome.failed_files.len(), 1);
    assert_eq!(outcome.failed_files[0].path, "test_broken.py");
}

#[test]
fn excessive_parse_failures_abort_the_run() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tests/test_bad.py", "@pytest.mark.topology(\"x\"\n");
    write(
        dir.path(),
        "tests/test_good.py",
        "@pytest.mark.topology(\"single\")\ndef test_good():\n    pass\n",
    );

    // One of two files failing hits a 0.5 ratio threshold.
    let err = discovery::discover(
        dir.path(),
        Path::new("tests"),
        Path::new("config/staging.cfg"),
        DiscoveryLimits {
            failure_rate_threshold: 0.5,
            max_failed_files: 25,
        },
    )
    .unwrap_err();

    match err {
        AppError::DiscoveryFailureRate { failed, total } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
        }
        other => panic!("expected DiscoveryFailureRate, got {:?}", other),
    }
}

#[test]
fn missing_tests_directory_is_a_discovery_error() {
    let dir = TempDir::new().unwrap();
    let err = discovery::discover(
        dir.path(),
        Path::new("tests"),
        Path::new("config/staging.cfg"),
        DiscoveryLimits::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Discovery(_)));
}
