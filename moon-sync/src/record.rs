//! One app: its workspace, the remote it tracks, and its deployment
//! descriptor, plus the start/kill/restart lifecycle.
//!
//! Records are rebuilt from configuration on every pass and never mutated.
//! Equality is defined on the content [`Fingerprint`] alone, so two records
//! built from the same desired state are interchangeable no matter whether
//! the deployment behind them is actually healthy.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use moon_core::{AppName, AppSpec};

use crate::error::SyncError;
use crate::repository::{CloneWait, GitBackend, Remote};
use crate::runner::{DeploymentRunner, DESCRIPTOR_FILES};
use crate::workspace::Workspace;

/// SHA-256 over the workspace path, remote URL, branch and canonical
/// descriptor, each length-prefixed so field boundaries cannot shift.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(path: &Path, url: &str, branch: &str, descriptor: &str) -> Self {
        let path = path.to_string_lossy();
        let mut hasher = Sha256::new();
        for field in [path.as_bytes(), url.as_bytes(), branch.as_bytes(), descriptor.as_bytes()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        Self(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// External collaborators shared by every record.
#[derive(Clone)]
pub struct Backends {
    pub git: Arc<dyn GitBackend>,
    pub runner: Arc<dyn DeploymentRunner>,
    pub clone_wait: CloneWait,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("clone_wait", &self.clone_wait)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppRecord {
    name: AppName,
    workspace: Workspace,
    remote: Remote,
    /// Canonical YAML of the compose descriptor.
    descriptor: String,
    fingerprint: Fingerprint,
}

impl AppRecord {
    /// Build the record for `name`, rooted at `<apps_root>/<name>`.
    pub fn new(apps_root: &Path, name: AppName, spec: &AppSpec) -> Result<Self, SyncError> {
        let workspace = Workspace::new(apps_root.join(name.as_str()));
        let remote = Remote::new(spec.url.clone(), spec.branch.clone());
        let descriptor = spec.canonical_compose()?;
        let fingerprint =
            Fingerprint::compute(workspace.path(), &remote.url, &remote.branch, &descriptor);
        Ok(Self {
            name,
            workspace,
            remote,
            descriptor,
            fingerprint,
        })
    }

    pub fn name(&self) -> &AppName {
        &self.name
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Clear the workspace, clone, write both descriptor files, launch.
    ///
    /// A clone timeout aborts before any descriptor is written.
    pub async fn start(&self, backends: &Backends) -> Result<(), SyncError> {
        let path = self.workspace.path();
        tracing::info!(app = %self.name, path = %path.display(), "starting app");

        self.workspace.delete().await?;
        self.remote
            .clone_into(backends.git.as_ref(), &self.workspace, backends.clone_wait)
            .await?;
        for file in DESCRIPTOR_FILES {
            self.workspace.overwrite(file, &self.descriptor).await?;
        }
        backends.runner.start(path).await?;

        tracing::info!(app = %self.name, "app started");
        Ok(())
    }

    /// Tear down the deployment, then remove the workspace it ran from.
    pub async fn kill(&self, backends: &Backends) -> Result<(), SyncError> {
        let path = self.workspace.path();
        tracing::info!(app = %self.name, path = %path.display(), "killing app");

        backends.runner.stop(path).await?;
        self.workspace.delete().await?;

        tracing::info!(app = %self.name, "app killed");
        Ok(())
    }

    /// `kill` then `start`. Not atomic: a failed start leaves nothing running.
    pub async fn restart(&self, backends: &Backends) -> Result<(), SyncError> {
        self.kill(backends).await?;
        self.start(backends).await
    }

    /// Whether the checkout is at the tip of its remote branch.
    pub async fn is_up_to_date(&self, backends: &Backends) -> Result<bool, SyncError> {
        self.remote
            .is_up_to_date(backends.git.as_ref(), &self.workspace)
            .await
    }
}

impl PartialEq for AppRecord {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for AppRecord {}
