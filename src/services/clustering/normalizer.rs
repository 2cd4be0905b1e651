//! Failure message normalization.
//!
//! Rewrites variable substrings (numbers, IPs, hex, UUIDs, device ids,
//! paths) into stable placeholders so semantically-identical errors produce
//! identical text. Substitution order matters: later passes must not
//! re-match already-replaced placeholders.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static RE_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
    )
    .expect("valid regex")
});
#[allow(clippy::expect_used)]
static RE_DEVICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(edge|device|node|host)-\d+\b").expect("valid regex"));
// The component class includes {} so placeholders substituted by earlier
// passes collapse into the surrounding path.
#[allow(clippy::expect_used)]
static RE_POSIX_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/[\w.{}\-]+){2,}/?").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z]:\\(?:[\w.{}\- ]+\\)*[\w.{}\-]+").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize a failure message into placeholder form.
///
/// Deterministic and pure; never fails on malformed input. Empty input
/// yields an empty string.
pub fn normalize(message: &str) -> String {
    if message.is_empty() {
        return String::new();
    }

    let text = RE_HEX.replace_all(message, "{HEX}");
    let text = RE_IP.replace_all(&text, "{IP}");
    let text = RE_UUID.replace_all(&text, "{UUID}");
    let text = RE_DEVICE_ID.replace_all(&text, "$1-{ID}");
    let text = mask_standalone_integers(&text);
    let text = RE_POSIX_PATH.replace_all(&text, "{PATH}");
    let text = RE_WINDOWS_PATH.replace_all(&text, "{PATH}");
    let text = RE_WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Replace digit runs not adjacent to letters, colons, or other digits with
/// `{N}`. Hand-rolled because the regex crate has no lookaround.
fn mask_standalone_integers(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let glued = |c: Option<char>| matches!(c, Some(c) if c.is_ascii_alphanumeric() || c == ':');

    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let prev = if start == 0 { None } else { Some(chars[start - 1]) };
            let next = chars.get(i).copied();
            if glued(prev) || glued(next) {
                out.extend(chars[start..i].iter());
            } else {
                out.push_str("{N}");
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_addresses_are_masked() {
        assert_eq!(
            normalize("segfault at 0xDEADBEEF in worker"),
            "segfault at {HEX} in worker"
        );
    }

    #[test]
    fn test_ip_addresses_are_masked() {
        assert_eq!(
            normalize("connection to 10.22.0.17 refused"),
            "connection to {IP} refused"
        );
    }

    #[test]
    fn test_uuids_are_masked() {
        assert_eq!(
            normalize("volume 123e4567-e89b-42d3-A456-426614174000 missing"),
            "volume {UUID} missing"
        );
    }

    #[test]
    fn test_device_ids_keep_their_prefix() {
        assert_eq!(
            normalize("edge-42 lost contact with node-7"),
            "edge-{ID} lost contact with node-{ID}"
        );
        assert_eq!(normalize("host-123 down"), "host-{ID} down");
    }

    #[test]
    fn test_standalone_integers_are_masked() {
        assert_eq!(
            normalize("Expected 200 but got 404"),
            "Expected {N} but got {N}"
        );
    }

    #[test]
    fn test_integers_glued_to_letters_or_colons_survive() {
        assert_eq!(normalize("retry5 failed"), "retry5 failed");
        assert_eq!(normalize("listening on port:8080"), "listening on port:8080");
    }

    #[test]
    fn test_absolute_paths_are_masked() {
        assert_eq!(
            normalize("cannot open /var/log/app/current.log"),
            "cannot open {PATH}"
        );
        assert_eq!(
            normalize(r"cannot open C:\logs\app\current.log"),
            "cannot open {PATH}"
        );
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(normalize("  a \t b\n c  "), "a b c");
    }

    #[test]
    fn test_empty_input_yields_empty_string() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let messages = [
            "Expected 200 but got 404",
            "connection to 10.0.0.1 refused at 0xFF",
            "edge-42 wrote /tmp/run/output.log",
            "volume 123e4567-e89b-42d3-a456-426614174000   gone",
            "",
        ];
        for message in messages {
            let once = normalize(message);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", message);
        }
    }
}
