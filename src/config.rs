//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::discovery::DiscoveryLimits;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_REPO_URL: &str = "file:///tmp/test-insights/tests-repo";
    pub const DEV_REPO_WORKDIR: &str = "/tmp/test-insights/workdir";
    pub const DEV_REPO_BRANCH: &str = "master";
    pub const DEV_TESTS_PATH: &str = "tests";
    pub const DEV_STAGING_CONFIG: &str = "config/staging.cfg";
    pub const DEV_PARSE_FAILURE_THRESHOLD: f64 = 0.5; // half the tree broken = systemic
    pub const DEV_MAX_FAILED_FILES: usize = 25; // absolute ceiling regardless of ratio
    pub const DEV_GIT_TIMEOUT_SECS: u64 = 120; // bounds the global repo lock hold time
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// URL of the test-source repository
    pub repo_url: String,
    /// Local working copy location (one per process, guarded by the sync lock)
    pub repo_workdir: PathBuf,
    /// Default branch to sync when a release does not name one
    pub repo_branch: String,
    /// Tests directory, relative to the repository root
    pub tests_path: PathBuf,
    /// Staging test list config file, relative to the repository root
    pub staging_config: PathBuf,
    /// Fraction of unparseable test files at which discovery is aborted
    pub parse_failure_threshold: f64,
    /// Absolute count of unparseable test files at which discovery is aborted
    pub max_failed_files: usize,
    /// Timeout applied to each git network operation
    pub git_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development) all variables have
    /// defaults; only RUST_ENV is required. In production mode the server
    /// will not start while the repository URL still matches the
    /// development default.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `TI_REPO_URL`: Test-source repository URL
    /// - `TI_REPO_WORKDIR`: Local working copy path
    /// - `TI_REPO_BRANCH`: Default branch (default: master)
    /// - `TI_TESTS_PATH`: Tests directory relative to the repo root (default: tests)
    /// - `TI_STAGING_CONFIG`: Staging config path relative to the repo root
    /// - `TI_PARSE_FAILURE_THRESHOLD`: Fatal parse-failure ratio (default: 0.5)
    /// - `TI_MAX_FAILED_FILES`: Fatal parse-failure count (default: 25)
    /// - `TI_GIT_TIMEOUT_SECS`: Timeout per git network operation (default: 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let repo_url =
            env::var("TI_REPO_URL").unwrap_or_else(|_| defaults::DEV_REPO_URL.to_string());

        let repo_workdir = PathBuf::from(
            env::var("TI_REPO_WORKDIR").unwrap_or_else(|_| defaults::DEV_REPO_WORKDIR.to_string()),
        );

        let repo_branch =
            env::var("TI_REPO_BRANCH").unwrap_or_else(|_| defaults::DEV_REPO_BRANCH.to_string());

        let tests_path = PathBuf::from(
            env::var("TI_TESTS_PATH").unwrap_or_else(|_| defaults::DEV_TESTS_PATH.to_string()),
        );

        let staging_config = PathBuf::from(
            env::var("TI_STAGING_CONFIG")
                .unwrap_or_else(|_| defaults::DEV_STAGING_CONFIG.to_string()),
        );

        let parse_failure_threshold = env::var("TI_PARSE_FAILURE_THRESHOLD")
            .unwrap_or_else(|_| defaults::DEV_PARSE_FAILURE_THRESHOLD.to_string())
            .parse::<f64>()
            .map_err(|_| {
                ConfigError::InvalidValue("TI_PARSE_FAILURE_THRESHOLD must be a valid number")
            })?;

        if !(0.0..=1.0).contains(&parse_failure_threshold) || parse_failure_threshold == 0.0 {
            return Err(ConfigError::InvalidValue(
                "TI_PARSE_FAILURE_THRESHOLD must be in (0, 1]",
            ));
        }

        let max_failed_files = env::var("TI_MAX_FAILED_FILES")
            .unwrap_or_else(|_| defaults::DEV_MAX_FAILED_FILES.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("TI_MAX_FAILED_FILES must be a valid number"))?;

        let git_timeout_secs = env::var("TI_GIT_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults::DEV_GIT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("TI_GIT_TIMEOUT_SECS must be a valid number"))?;

        let config = Config {
            environment,
            repo_url,
            repo_workdir,
            repo_branch,
            tests_path,
            staging_config,
            parse_failure_threshold,
            max_failed_files,
            git_timeout_secs,
        };

        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.repo_url == defaults::DEV_REPO_URL {
            errors.push(format!(
                "TI_REPO_URL is using development default '{}'. Set the production test-source repository.",
                defaults::DEV_REPO_URL
            ));
        }

        if self.repo_workdir == PathBuf::from(defaults::DEV_REPO_WORKDIR) {
            errors.push(
                "TI_REPO_WORKDIR is using development default under /tmp. Set a persistent working copy path."
                    .to_string(),
            );
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Discovery abort thresholds derived from this configuration.
    pub fn discovery_limits(&self) -> DiscoveryLimits {
        DiscoveryLimits {
            failure_rate_threshold: self.parse_failure_threshold,
            max_failed_files: self.max_failed_files,
        }
    }

    /// Timeout applied to each git network operation.
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
