//! Test repository access.
//!
//! Discovery reads test definitions from a git checkout; this module owns
//! cloning and refreshing that checkout via the system `git` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// Source of the test tree. The orchestrator only needs "make the working
/// copy current and tell me the commit".
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Bring the working copy up to date with `branch` and return the
    /// resulting HEAD commit hash.
    async fn refresh(&self, branch: &str) -> AppResult<String>;
}

/// Git-backed repository source shelling out to the system git client.
#[derive(Debug, Clone)]
pub struct GitRepository {
    url: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl GitRepository {
    pub fn new(url: impl Into<String>, workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        GitRepository {
            url: url.into(),
            workdir: workdir.into(),
            timeout,
        }
    }

    /// Local checkout path that discovery should read from.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run_git(&self, args: &[&str], cwd: Option<&Path>) -> AppResult<String> {
        debug!("Running git {}", args.join(" "));
        let mut command = tokio::process::Command::new("git");
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AppError::Repository(format!(
                    "git {} timed out after {:?}",
                    args.join(" "),
                    self.timeout
                ))
            })?
            .map_err(|e| AppError::Repository(format!("Failed to spawn git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Repository(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl RepositorySource for GitRepository {
    async fn refresh(&self, branch: &str) -> AppResult<String> {
        if self.workdir.join(".git").is_dir() {
            info!("Updating {} at {}", branch, self.workdir.display());
            self.run_git(&["fetch", "origin", branch], Some(&self.workdir))
                .await?;
            self.run_git(&["checkout", branch], Some(&self.workdir))
                .await?;
            self.run_git(&["pull", "--ff-only", "origin", branch], Some(&self.workdir))
                .await?;
        } else {
            if let Some(parent) = self.workdir.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Repository(format!(
                        "Failed to create workdir parent {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            info!("Cloning {} ({}) into {}", self.url, branch, self.workdir.display());
            let workdir = self.workdir.to_string_lossy();
            self.run_git(
                &["clone", "--branch", branch, &self.url, workdir.as_ref()],
                None,
            )
            .await?;
        }

        let commit = self
            .run_git(&["rev-parse", "HEAD"], Some(&self.workdir))
            .await?;
        info!("Test repository at commit {}", commit);
        Ok(commit)
    }
}
