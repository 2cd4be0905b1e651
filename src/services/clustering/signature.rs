//! Signature extraction from free-text failure messages.

use std::sync::LazyLock;

use regex::Regex;

use super::normalizer;
use crate::models::ErrorSignature;

#[allow(clippy::expect_used)]
static RE_STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "([^"]+)", line (\d+)"#).expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid regex"));

/// Parse one failure message into a structured signature.
///
/// Never fails: malformed input degrades to `error_type = "Unknown"` with a
/// valid fingerprint, and empty input yields an empty normalized message.
pub fn extract(failure_message: &str) -> ErrorSignature {
    if failure_message.is_empty() {
        return ErrorSignature::new("Unknown".to_string(), None, None, String::new());
    }

    let lines: Vec<&str> = failure_message.lines().collect();
    let first_line = lines.first().map(|l| l.trim()).unwrap_or("");

    let error_type = extract_error_type(first_line);
    let (file_path, line_number) = extract_stack_frame(&lines);
    let raw_message = message_text(&error_type, first_line, &lines);
    let normalized = normalizer::normalize(&raw_message);

    ErrorSignature::new(error_type, file_path, line_number, normalized)
}

/// Error type: the token before the first colon when it looks like an
/// identifier, else the first whitespace-delimited token, else "Unknown".
fn extract_error_type(first_line: &str) -> String {
    if let Some((head, _)) = first_line.split_once(':') {
        let head = head.trim();
        if RE_IDENTIFIER.is_match(head) {
            return head.to_string();
        }
    }
    match first_line.split_whitespace().next() {
        Some(token) => token.to_string(),
        None => "Unknown".to_string(),
    }
}

/// First stack-frame match scanning from the top of the trace.
fn extract_stack_frame(lines: &[&str]) -> (Option<String>, Option<u32>) {
    for line in lines {
        if let Some(caps) = RE_STACK_FRAME.captures(line) {
            let path = caps.get(1).map(|m| m.as_str().to_string());
            let number = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
            return (path, number);
        }
    }
    (None, None)
}

/// Message body to normalize. AssertionError prefers the assertion text on
/// the first line, falling back to the second line; other types take the
/// substring after the first colon, or the whole first line without one.
fn message_text(error_type: &str, first_line: &str, lines: &[&str]) -> String {
    if error_type == "AssertionError" {
        if let Some((_, rest)) = first_line.split_once("AssertionError:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
        if let Some(second) = lines.get(1) {
            return second.trim().to_string();
        }
        return String::new();
    }

    match first_line.split_once(':') {
        Some((_, rest)) => rest.trim().to_string(),
        None => first_line.to_string(),
    }
}
