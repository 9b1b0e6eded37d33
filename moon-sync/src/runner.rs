//! Deployment runner: start and stop the compose project in a workspace.
//!
//! Start is fire-and-forget. [`ComposeRunner::start`] returns as soon as
//! `compose up` has been spawned; a detached task reaps the child and logs
//! how it exited. Stop is awaited and never fails the caller.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::SyncError;

/// Base compose descriptor written into every workspace.
pub const BASE_DESCRIPTOR: &str = "docker-compose.yml";
/// Override descriptor; same content as the base file.
pub const OVERRIDE_DESCRIPTOR: &str = "docker-compose.override.yml";
pub const DESCRIPTOR_FILES: [&str; 2] = [BASE_DESCRIPTOR, OVERRIDE_DESCRIPTOR];

#[async_trait]
pub trait DeploymentRunner: Send + Sync {
    /// Launch the unit described in `path`. May return before it is healthy.
    async fn start(&self, path: &Path) -> Result<(), SyncError>;

    /// Gracefully stop, then force-remove, the unit in `path`. Must tolerate
    /// a unit that was never started.
    async fn stop(&self, path: &Path) -> Result<(), SyncError>;
}

/// Drives `docker-compose` (or any compatible command, e.g. `docker compose`).
#[derive(Debug, Clone)]
pub struct ComposeRunner {
    program: String,
    leading_args: Vec<String>,
}

impl Default for ComposeRunner {
    fn default() -> Self {
        Self::new(&[moon_core::settings::DEFAULT_COMPOSE_COMMAND.to_string()])
    }
}

impl ComposeRunner {
    /// `command` is the program followed by any leading arguments.
    pub fn new(command: &[String]) -> Self {
        match command.split_first() {
            Some((program, rest)) => Self {
                program: program.clone(),
                leading_args: rest.to_vec(),
            },
            None => Self {
                program: moon_core::settings::DEFAULT_COMPOSE_COMMAND.to_string(),
                leading_args: Vec::new(),
            },
        }
    }

    fn command(&self, path: &Path, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .current_dir(path)
            .stdin(Stdio::null());
        command
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.leading_args.iter().map(String::as_str));
        parts.extend(args);
        parts.join(" ")
    }
}

#[async_trait]
impl DeploymentRunner for ComposeRunner {
    async fn start(&self, path: &Path) -> Result<(), SyncError> {
        let args = ["up", "--build", "-d"];
        let described = self.describe(&args);
        tracing::info!(path = %path.display(), command = %described, "running compose up");

        let child = self
            .command(path, &args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SyncError::Runner {
                command: described.clone(),
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        let path = path.to_path_buf();
        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    tracing::info!(path = %path.display(), "compose up finished");
                }
                Ok(output) => {
                    tracing::warn!(
                        path = %path.display(),
                        status = %output.status,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "compose up failed",
                    );
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "compose up could not be awaited");
                }
            }
        });
        Ok(())
    }

    async fn stop(&self, path: &Path) -> Result<(), SyncError> {
        tracing::info!(path = %path.display(), "running compose stop/rm");
        for args in [&["stop"][..], &["rm", "-f"][..]] {
            let described = self.describe(args);
            match self.command(path, args).output().await {
                Ok(output) if output.status.success() => {
                    tracing::debug!(path = %path.display(), command = %described, "compose command finished");
                }
                Ok(output) => {
                    tracing::warn!(
                        path = %path.display(),
                        command = %described,
                        status = %output.status,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "compose command failed",
                    );
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), command = %described, error = %err, "compose command could not run");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn runner(command: &[&str]) -> ComposeRunner {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        ComposeRunner::new(&command)
    }

    #[test]
    fn empty_command_falls_back_to_docker_compose() {
        let runner = ComposeRunner::new(&[]);
        assert_eq!(runner.describe(&["stop"]), "docker-compose stop");
    }

    #[test]
    fn leading_args_are_kept() {
        let runner = runner(&["docker", "compose"]);
        assert_eq!(runner.describe(&["rm", "-f"]), "docker compose rm -f");
    }

    #[tokio::test]
    async fn start_returns_without_waiting_for_the_unit() {
        let root = TempDir::new().unwrap();
        let runner = runner(&["sh", "-c", "sleep 2", "compose"]);
        let started = std::time::Instant::now();
        runner.start(root.path()).await.expect("start");
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[tokio::test]
    async fn start_with_unknown_program_is_a_runner_error() {
        let root = TempDir::new().unwrap();
        let err = runner(&["moon-no-such-compose"])
            .start(root.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Runner { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn stop_tolerates_failures_and_missing_workspace() {
        let root = TempDir::new().unwrap();
        runner(&["false"]).stop(root.path()).await.expect("failing command");
        runner(&["true"])
            .stop(&root.path().join("never-started"))
            .await
            .expect("missing workspace");
    }
}
