//! Structured signature derived from a free-text failure message.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Structured, hashable signature of one failure message.
///
/// Two signatures with identical fingerprints are considered identical for
/// exact clustering. The fingerprint is a pure function of the other four
/// fields, so recomputing it is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignature {
    /// Extracted error class/category name (e.g. "AssertionError")
    pub error_type: String,
    /// Source file from the first stack frame, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Line number from the first stack frame, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    /// Message text with variable substrings replaced by placeholders
    pub normalized_message: String,
    /// Hex SHA-256 digest over the four fields above
    pub fingerprint: String,
}

impl ErrorSignature {
    /// Build a signature, deriving the fingerprint from the given fields.
    pub fn new(
        error_type: String,
        file_path: Option<String>,
        line_number: Option<u32>,
        normalized_message: String,
    ) -> Self {
        let fingerprint = Self::compute_fingerprint(
            &error_type,
            file_path.as_deref(),
            line_number,
            &normalized_message,
        );
        ErrorSignature {
            error_type,
            file_path,
            line_number,
            normalized_message,
            fingerprint,
        }
    }

    /// Deterministic hash of the signature fields, stable across runs and
    /// processes. Absent fields encode as empty strings.
    pub fn compute_fingerprint(
        error_type: &str,
        file_path: Option<&str>,
        line_number: Option<u32>,
        normalized_message: &str,
    ) -> String {
        let line = line_number.map(|n| n.to_string()).unwrap_or_default();
        let material = format!(
            "{}|{}|{}|{}",
            error_type,
            file_path.unwrap_or(""),
            line,
            normalized_message
        );
        hex::encode(Sha256::digest(material.as_bytes()))
    }
}
