//! Domain error types for the test insights engines.
//!
//! Uses thiserror for ergonomic error handling with automatic Display
//! implementations. Data-quality problems (unparseable failure messages,
//! missing fields) never surface here; only infrastructure-class failures do.

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Repository access failed (clone, fetch, checkout, pull, timeout)
    #[error("Repository error: {0}")]
    Repository(String),

    /// Test discovery could not run at all
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Too many test files failed to parse for the discovery result to be trusted
    #[error("Discovery failure rate too high: {failed} of {total} test files failed to parse")]
    DiscoveryFailureRate { failed: usize, total: usize },

    /// Metadata store operation failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Discovery(format!("I/O error: {}", err))
    }
}
