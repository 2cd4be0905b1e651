//! Test identifier helpers for parametrized test names.
//!
//! Historical result rows carry names like `test_foo[1-True-xyz]`; metadata
//! rows are keyed by the base name `test_foo`.

/// Strip a trailing bracketed parameter suffix, returning the base name.
/// Names without brackets (and empty input) are returned unchanged.
pub fn normalize_test_name(test_name: &str) -> &str {
    match test_name.find('[') {
        Some(idx) => &test_name[..idx],
        None => test_name,
    }
}

/// Split a test name into its base name and parameter text, if any. The
/// parameter is the text between the first `[` and the last `]`.
pub fn extract_parameter(test_name: &str) -> (&str, Option<&str>) {
    let base = normalize_test_name(test_name);
    if let Some(open) = test_name.find('[')
        && let Some(close) = test_name.rfind(']')
        && close > open
    {
        return (base, Some(&test_name[open + 1..close]));
    }
    (base, None)
}

/// True iff the name carries a bracketed parameter suffix.
pub fn is_parameterized(test_name: &str) -> bool {
    extract_parameter(test_name).1.is_some()
}
