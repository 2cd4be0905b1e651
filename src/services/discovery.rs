//! Static discovery of test definitions from a source tree.
//!
//! Walks the tests directory for pytest-style files, extracts test classes
//! (`Test*`) and test functions (`test_*`) with their declared topology and
//! test-management annotations, and classifies each test as staging or
//! production. The parse is a structural scan of decorator call-expressions;
//! it never executes the source.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{DiscoveredTest, Priority, TestState};

#[allow(clippy::expect_used)]
static RE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^class\s+(\w+)\s*[:(]").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)def\s+(\w+)\s*\(").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_DECORATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@([\w.]+)\s*(?:\((.*)\))?\s*$").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_STRING_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_KWARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex"));

/// Thresholds above which a discovery run is treated as systemically broken
/// instead of returning a false "everything removed" view of the tree.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryLimits {
    /// Fatal once failed/total parsed files reaches this ratio.
    pub failure_rate_threshold: f64,
    /// Fatal once this many files fail outright, regardless of ratio.
    pub max_failed_files: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        DiscoveryLimits {
            failure_rate_threshold: 0.5,
            max_failed_files: 25,
        }
    }
}

/// One file the static parser could not process.
#[derive(Debug, Clone, Serialize)]
pub struct ParseFailure {
    pub path: String,
    pub error: String,
}

/// Result of one discovery run.
#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub tests: Vec<DiscoveredTest>,
    /// Files skipped because they failed to parse; below-threshold failures
    /// are non-fatal and reported here
    pub failed_files: Vec<ParseFailure>,
}

/// Walk the tests tree under `repo_root` and extract test definitions.
///
/// Per-file parse failures are logged and skipped; the run only fails when
/// the tests directory is unreadable or the failure rate crosses `limits`.
pub fn discover(
    repo_root: &Path,
    tests_path: &Path,
    staging_config: &Path,
    limits: DiscoveryLimits,
) -> AppResult<DiscoveryOutcome> {
    let staging = load_staging_set(&repo_root.join(staging_config));
    let tests_root = repo_root.join(tests_path);

    let mut files = Vec::new();
    collect_test_files(&tests_root, &mut files)?;
    files.sort();

    let mut tests = Vec::new();
    let mut failed_files = Vec::new();
    for file in &files {
        let rel = file
            .strip_prefix(&tests_root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        match parse_test_file(file, &rel, &staging) {
            Ok(mut found) => tests.append(&mut found),
            Err(e) => {
                warn!("Skipping test file {}: {}", rel, e);
                failed_files.push(ParseFailure {
                    path: rel,
                    error: e.to_string(),
                });
            }
        }
    }

    let total = files.len();
    let failed = failed_files.len();
    if total > 0
        && (failed as f64 / total as f64 >= limits.failure_rate_threshold
            || failed >= limits.max_failed_files)
    {
        return Err(AppError::DiscoveryFailureRate { failed, total });
    }

    info!(
        "Discovered {} tests across {} files ({} failed to parse)",
        tests.len(),
        total,
        failed
    );
    Ok(DiscoveryOutcome {
        tests,
        failed_files,
    })
}

/// Load the staging test-name set. Missing or unreadable config is not
/// fatal: every test is then classified PROD.
fn load_staging_set(path: &Path) -> HashSet<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Staging config {} unavailable ({}); classifying all tests as PROD",
                path.display(),
                e
            );
            return HashSet::new();
        }
    };
    parse_staging_config(&content)
}

/// Parse the `[staging]` section: every key's value is a comma-separated
/// list of test names.
fn parse_staging_config(content: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut in_staging = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_staging = line.eq_ignore_ascii_case("[staging]");
            continue;
        }
        if !in_staging {
            continue;
        }
        if let Some((_, value)) = line.split_once('=') {
            for name in value.split(',') {
                let name = name.trim();
                if !name.is_empty() {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names
}

fn collect_test_files(dir: &Path, out: &mut Vec<PathBuf>) -> AppResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::Discovery(format!(
            "Failed to read tests directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_test_files(&path, out)?;
        } else if is_test_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name.strip_suffix(".py") else {
        return false;
    };
    stem.starts_with("test_") || stem.ends_with("_test")
}

#[derive(Debug, thiserror::Error)]
enum FileParseError {
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error("unterminated decorator arguments starting at line {0}")]
    UnterminatedDecorator(usize),
}

/// Annotations accumulated from decorators above a class or function.
#[derive(Debug, Default, Clone)]
struct Annotations {
    topology: Option<String>,
    meta: Option<TestMeta>,
}

/// Test-management metadata block from a `test_meta` decorator.
#[derive(Debug, Default, Clone)]
struct TestMeta {
    case_id: Option<String>,
    testrail_id: Option<String>,
    priority: Option<Priority>,
}

enum Scope {
    Module,
    TestClass(String, Annotations),
    /// A class not named `Test*`; its methods are helpers, not tests
    OtherClass,
}

fn parse_test_file(
    path: &Path,
    rel_path: &str,
    staging: &HashSet<String>,
) -> Result<Vec<DiscoveredTest>, FileParseError> {
    let content = fs::read_to_string(path)?;
    let module = module_name(rel_path);
    let lines: Vec<&str> = content.lines().collect();

    let mut tests = Vec::new();
    let mut pending = Annotations::default();
    let mut scope = Scope::Module;

    let mut i = 0;
    while i < lines.len() {
        let raw = lines[i];
        let trimmed = raw.trim();

        if trimmed.starts_with('@') {
            // Join continuation lines until the argument parens balance.
            let start_line = i + 1;
            let mut text = trimmed.to_string();
            while !parens_balanced(&text) {
                i += 1;
                let Some(next) = lines.get(i) else {
                    return Err(FileParseError::UnterminatedDecorator(start_line));
                };
                text.push(' ');
                text.push_str(next.trim());
            }
            apply_decorator(&text, &mut pending);
            i += 1;
            continue;
        }

        if let Some(caps) = RE_CLASS.captures(raw) {
            let name = caps[1].to_string();
            scope = if name.starts_with("Test") {
                Scope::TestClass(name, std::mem::take(&mut pending))
            } else {
                pending = Annotations::default();
                Scope::OtherClass
            };
            i += 1;
            continue;
        }

        if let Some(caps) = RE_DEF.captures(raw) {
            let indent = caps[1].len();
            let name = caps[2].to_string();
            let own = std::mem::take(&mut pending);
            if indent == 0 {
                scope = Scope::Module;
            }
            if name.starts_with("test_") {
                match &scope {
                    Scope::TestClass(class_name, class_anns) => push_test(
                        &mut tests, &name, Some(class_name), class_anns, &own, &module, rel_path,
                        staging,
                    ),
                    Scope::Module => push_test(
                        &mut tests,
                        &name,
                        None,
                        &Annotations::default(),
                        &own,
                        &module,
                        rel_path,
                        staging,
                    ),
                    Scope::OtherClass => {}
                }
            }
            i += 1;
            continue;
        }

        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            // Any other statement detaches pending decorators; a top-level
            // one also closes the current class scope.
            pending = Annotations::default();
            if !raw.starts_with(' ') && !raw.starts_with('\t') {
                scope = Scope::Module;
            }
        }
        i += 1;
    }

    Ok(tests)
}

#[allow(clippy::too_many_arguments)]
fn push_test(
    tests: &mut Vec<DiscoveredTest>,
    name: &str,
    class_name: Option<&str>,
    class_anns: &Annotations,
    own: &Annotations,
    module: &str,
    rel_path: &str,
    staging: &HashSet<String>,
) {
    // Method-level topology overrides class-level; a method-level meta block
    // replaces the class block wholesale rather than merging per field.
    let Some(topology) = own.topology.clone().or_else(|| class_anns.topology.clone()) else {
        debug!("Skipping {} ({}): no topology declared", name, rel_path);
        return;
    };
    let meta = own
        .meta
        .clone()
        .or_else(|| class_anns.meta.clone())
        .unwrap_or_default();

    let test_state = if staging.contains(name) {
        TestState::Staging
    } else {
        TestState::Prod
    };

    tests.push(DiscoveredTest {
        name: name.to_string(),
        module: module.to_string(),
        topology,
        test_state,
        class_name: class_name.map(str::to_string),
        path: rel_path.to_string(),
        case_id: meta.case_id,
        testrail_id: meta.testrail_id,
        priority: meta.priority,
    });
}

fn apply_decorator(text: &str, pending: &mut Annotations) {
    let Some(caps) = RE_DECORATOR.captures(text) else {
        return;
    };
    let dotted = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let short = dotted.rsplit('.').next().unwrap_or(dotted);
    let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    match short {
        "topology" => {
            if let Some(sc) = RE_STRING_ARG.captures(args) {
                let value = sc.get(1).or_else(|| sc.get(2)).map(|m| m.as_str());
                if let Some(value) = value {
                    pending.topology = Some(value.to_string());
                }
            }
        }
        "test_meta" => {
            let mut meta = TestMeta::default();
            for kc in RE_KWARG.captures_iter(args) {
                let key = kc.get(1).map(|m| m.as_str()).unwrap_or("");
                let value = kc.get(2).or_else(|| kc.get(3)).map(|m| m.as_str());
                match (key, value) {
                    ("case_id", Some(v)) => meta.case_id = Some(v.to_string()),
                    ("testrail_id", Some(v)) => meta.testrail_id = Some(v.to_string()),
                    ("priority", Some(v)) => match Priority::parse(v) {
                        Some(p) => meta.priority = Some(p),
                        None => warn!("Ignoring unknown priority {:?} in decorator", v),
                    },
                    _ => {}
                }
            }
            pending.meta = Some(meta);
        }
        _ => {}
    }
}

/// Parens inside quoted string arguments do not count toward nesting; an
/// unterminated string leaves the line unbalanced.
fn parens_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            },
        }
    }
    depth == 0 && quote.is_none()
}

fn module_name(rel_path: &str) -> String {
    rel_path.trim_end_matches(".py").replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_naming_conventions() {
        assert!(is_test_file(Path::new("test_failover.py")));
        assert!(is_test_file(Path::new("failover_test.py")));
        assert!(!is_test_file(Path::new("conftest.py")));
        assert!(!is_test_file(Path::new("test_helpers.txt")));
    }

    #[test]
    fn test_staging_config_parsing() {
        let content = "\
# staging roster
[staging]
batch_a = test_one, test_two
batch_b = test_three

[other]
ignored = test_four
";
        let names = parse_staging_config(content);
        assert_eq!(names.len(), 3);
        assert!(names.contains("test_one"));
        assert!(names.contains("test_three"));
        assert!(!names.contains("test_four"));
    }

    #[test]
    fn test_module_name_from_relative_path() {
        assert_eq!(module_name("ha/test_failover.py"), "ha.test_failover");
        assert_eq!(module_name("test_smoke.py"), "test_smoke");
    }

    #[test]
    fn test_decorator_argument_extraction() {
        let mut pending = Annotations::default();
        apply_decorator("@pytest.mark.topology(\"5-site\")", &mut pending);
        assert_eq!(pending.topology.as_deref(), Some("5-site"));

        apply_decorator(
            "@pytest.mark.test_meta(case_id=\"C7\", testrail_id='TR-9', priority=\"p1\")",
            &mut pending,
        );
        let meta = pending.meta.expect("meta block");
        assert_eq!(meta.case_id.as_deref(), Some("C7"));
        assert_eq!(meta.testrail_id.as_deref(), Some("TR-9"));
        assert_eq!(meta.priority, Some(Priority::P1));
    }

    #[test]
    fn test_paren_counting_skips_string_contents() {
        assert!(parens_balanced(r#"@pytest.mark.test_meta(case_id="C(1)")"#));
        assert!(parens_balanced(r#"@pytest.mark.topology("a)")"#));
        assert!(parens_balanced(r#"@pytest.mark.topology('don\'t(')"#));
        assert!(!parens_balanced("@pytest.mark.topology("));
        assert!(!parens_balanced(r#"@pytest.mark.topology("open"#));
    }

    #[test]
    fn test_unrecognized_decorators_are_ignored() {
        let mut pending = Annotations::default();
        apply_decorator("@pytest.mark.slow", &mut pending);
        apply_decorator("@retry(attempts=3)", &mut pending);
        assert!(pending.topology.is_none());
        assert!(pending.meta.is_none());
    }
}
