//! [`GitBackend`] backed by the `git` command line.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{io_err, SyncError};
use crate::repository::{FetchStatus, GitBackend};

/// Shells out to `git`. Never prompts for credentials.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(moon_core::settings::DEFAULT_GIT_BINARY)
    }
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    async fn run_in(&self, path: &Path, args: &[&str]) -> Result<String, SyncError> {
        let output = self
            .command()
            .arg("-C")
            .arg(path)
            .args(args)
            .output()
            .await
            .map_err(|err| SyncError::RemoteCheck {
                path: path.to_path_buf(),
                message: format!("failed to run {} {}: {err}", self.binary, args.join(" ")),
            })?;

        if !output.status.success() {
            return Err(SyncError::RemoteCheck {
                path: path.to_path_buf(),
                message: format!(
                    "{} {} exited with {}: {}",
                    self.binary,
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim(),
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn clone_branch(&self, path: &Path, url: &str, branch: &str) -> Result<(), SyncError> {
        let output = self
            .command()
            .args(["clone", "-b", branch, url])
            .arg(path)
            .output()
            .await
            .map_err(|err| SyncError::Runner {
                command: format!("{} clone", self.binary),
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        // Success is decided by the readiness poll, not by the exit status.
        if !output.status.success() {
            tracing::warn!(
                url,
                branch,
                path = %path.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git clone reported failure",
            );
        }
        Ok(())
    }

    async fn fetch(&self, path: &Path, branch: &str) -> Result<FetchStatus, SyncError> {
        match tokio::fs::metadata(path.join(".git")).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FetchStatus::Missing),
            Err(err) => return Err(io_err(path, err)),
        }

        self.run_in(path, &["fetch", "--quiet", "origin", branch])
            .await?;
        let local = self.run_in(path, &["rev-parse", "HEAD"]).await?;
        let remote = self.run_in(path, &["rev-parse", "FETCH_HEAD"]).await?;

        if local == remote {
            Ok(FetchStatus::UpToDate)
        } else {
            tracing::debug!(path = %path.display(), %local, %remote, "checkout behind remote");
            Ok(FetchStatus::Behind)
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    /// Run `git` synchronously in `dir`, with a fixed identity.
    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(["-c", "user.name=moon", "-c", "user.email=moon@example.com"])
            .arg("-C")
            .arg(dir)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("git available");
        assert!(status.success(), "git {args:?} failed");
    }

    fn commit(repo: &Path, file: &str, content: &str) {
        std::fs::write(repo.join(file), content).unwrap();
        git(repo, &["add", file]);
        git(repo, &["commit", "-q", "-m", file]);
    }

    /// An upstream repository with one commit on `main`.
    fn upstream(root: &Path) -> std::path::PathBuf {
        let repo = root.join("upstream");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["checkout", "-q", "-b", "main"]);
        commit(&repo, "docker-compose.yml", "services: {}\n");
        repo
    }

    #[tokio::test]
    async fn fetch_compares_head_with_remote_tip() {
        let root = TempDir::new().unwrap();
        let repo = upstream(root.path());
        let url = repo.to_string_lossy().into_owned();
        let checkout = root.path().join("apps").join("app1");
        let git_cli = GitCli::default();

        git_cli.clone_branch(&checkout, &url, "main").await.unwrap();
        assert_eq!(
            git_cli.fetch(&checkout, "main").await.unwrap(),
            FetchStatus::UpToDate
        );

        commit(&repo, "README", "new upstream commit\n");
        assert_eq!(
            git_cli.fetch(&checkout, "main").await.unwrap(),
            FetchStatus::Behind
        );
        // Fetching does not move HEAD, so the checkout stays behind.
        assert_eq!(
            git_cli.fetch(&checkout, "main").await.unwrap(),
            FetchStatus::Behind
        );
    }

    #[tokio::test]
    async fn fetch_of_unknown_branch_is_a_remote_check_error() {
        let root = TempDir::new().unwrap();
        let repo = upstream(root.path());
        let checkout = root.path().join("app1");
        let git_cli = GitCli::default();
        git_cli
            .clone_branch(&checkout, &repo.to_string_lossy(), "main")
            .await
            .unwrap();

        let err = git_cli.fetch(&checkout, "no-such-branch").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteCheck { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn fetch_reports_missing_for_absent_checkout() {
        let root = TempDir::new().unwrap();
        let status = GitCli::default()
            .fetch(&root.path().join("app1"), "main")
            .await
            .unwrap();
        assert_eq!(status, FetchStatus::Missing);
    }

    #[tokio::test]
    async fn fetch_reports_missing_while_git_dir_not_materialized() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("app1")).unwrap();
        let status = GitCli::default()
            .fetch(&root.path().join("app1"), "main")
            .await
            .unwrap();
        assert_eq!(status, FetchStatus::Missing);
    }

    #[tokio::test]
    async fn clone_with_unknown_binary_is_a_runner_error() {
        let root = TempDir::new().unwrap();
        let git = GitCli::new("moon-no-such-git-binary");
        let err = git
            .clone_branch(&root.path().join("app1"), "u1", "main")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Runner { .. }), "got: {err}");
    }
}
