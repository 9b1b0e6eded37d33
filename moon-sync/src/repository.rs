//! Repository sync protocol: clone with bounded readiness wait, and remote
//! freshness checks.
//!
//! The git backend may return from a clone before every file is on disk, so a
//! clone is followed by a readiness poll:
//!
//! 1. Issue the clone request.
//! 2. Up to [`CloneWait::attempts`] times, [`CloneWait::interval`] apart, fetch
//!    the branch and ask whether the checkout is at the remote tip.
//! 3. Only [`FetchStatus::UpToDate`] ends the wait successfully. A missing
//!    checkout, a checkout behind its remote, or a failed fetch all mean
//!    "not ready yet".
//! 4. Exhausting the attempts is [`SyncError::CloneTimeout`].
//!
//! Outside of cloning, [`Remote::is_up_to_date`] performs a single fetch and
//! surfaces fetch failures to the caller without retrying.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use moon_core::Settings;

use crate::error::SyncError;
use crate::workspace::Workspace;

/// Result of fetching the tracked branch into a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Local checkout is at the tip of the remote branch.
    UpToDate,
    /// The remote branch has commits the checkout does not.
    Behind,
    /// No checkout exists at the path (yet).
    Missing,
}

/// Git operations the sync protocol depends on.
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Request a clone of `branch` from `url` into `path`. Returning does not
    /// guarantee the checkout is fully materialized.
    async fn clone_branch(&self, path: &Path, url: &str, branch: &str) -> Result<(), SyncError>;

    /// Fetch `branch` from the checkout's origin and compare it with `HEAD`.
    async fn fetch(&self, path: &Path, branch: &str) -> Result<FetchStatus, SyncError>;
}

/// Bound on the post-clone readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneWait {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for CloneWait {
    fn default() -> Self {
        Self {
            attempts: moon_core::settings::DEFAULT_CLONE_ATTEMPTS,
            interval: moon_core::settings::DEFAULT_CLONE_INTERVAL,
        }
    }
}

impl From<&Settings> for CloneWait {
    fn from(settings: &Settings) -> Self {
        Self {
            attempts: settings.clone_attempts,
            interval: settings.clone_interval,
        }
    }
}

/// The remote branch an app checkout tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Remote {
    pub url: String,
    pub branch: String,
}

impl Remote {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
        }
    }

    /// Clone into `workspace` and block until the checkout reports up to date.
    pub async fn clone_into(
        &self,
        git: &dyn GitBackend,
        workspace: &Workspace,
        wait: CloneWait,
    ) -> Result<(), SyncError> {
        let path = workspace.path();
        tracing::info!(
            url = %self.url,
            branch = %self.branch,
            path = %path.display(),
            "cloning repository",
        );
        git.clone_branch(path, &self.url, &self.branch).await?;

        tracing::info!(path = %path.display(), "waiting for clone to finish");
        for attempt in 1..=wait.attempts {
            match git.fetch(path, &self.branch).await {
                Ok(FetchStatus::UpToDate) => {
                    tracing::info!(path = %path.display(), attempt, "clone finished");
                    return Ok(());
                }
                Ok(status) => {
                    tracing::debug!(path = %path.display(), attempt, ?status, "checkout not ready");
                }
                Err(err) => {
                    tracing::debug!(path = %path.display(), attempt, error = %err, "checkout not ready");
                }
            }
            if attempt < wait.attempts {
                tokio::time::sleep(wait.interval).await;
            }
        }

        tracing::error!(
            url = %self.url,
            branch = %self.branch,
            path = %path.display(),
            attempts = wait.attempts,
            "clone timed out",
        );
        Err(SyncError::CloneTimeout {
            url: self.url.clone(),
            branch: self.branch.clone(),
            path: path.to_path_buf(),
            attempts: wait.attempts,
        })
    }

    /// Single fetch-and-compare. Fetch failures propagate unchanged.
    pub async fn is_up_to_date(
        &self,
        git: &dyn GitBackend,
        workspace: &Workspace,
    ) -> Result<bool, SyncError> {
        let status = git.fetch(workspace.path(), &self.branch).await?;
        Ok(status == FetchStatus::UpToDate)
    }
}
