//! Per-app workspace directory.
//!
//! ## `overwrite`: atomic replace
//!
//! 1. Write the content to `<file>.moon.tmp` in the same directory.
//! 2. Rename over the final path (atomic on POSIX).
//! 3. On rename failure, remove the `.tmp` sibling and report the error.
//!
//! `delete` is idempotent: an already-absent workspace is not an error, so a
//! kill racing with a previous crash cleanup never fails the pass.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// A directory owned by exactly one app, `<apps_root>/<app_name>/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Replace `filename` inside the workspace with `content`.
    pub async fn overwrite(&self, filename: &str, content: &str) -> Result<PathBuf, SyncError> {
        let target = self.path.join(filename);
        let tmp = PathBuf::from(format!("{}.moon.tmp", target.display()));
        write_atomic(&target, &tmp, content).await?;
        tracing::info!(path = %target.display(), "overwrote descriptor file");
        Ok(target)
    }

    /// Recursively delete the workspace and everything in it.
    pub async fn delete(&self) -> Result<(), SyncError> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "deleted workspace");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "workspace already absent");
                Ok(())
            }
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    /// Every subdirectory directly under `root`, sorted by path.
    ///
    /// Plain files are ignored. A missing root yields no workspaces.
    pub async fn scan(root: &Path) -> Result<Vec<Workspace>, SyncError> {
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(root, err)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(root, e))? {
            let ty = entry.file_type().await.map_err(|e| io_err(entry.path(), e))?;
            if ty.is_dir() {
                found.push(Workspace::new(entry.path()));
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}

async fn write_atomic(target: &Path, tmp: &Path, content: &str) -> Result<(), SyncError> {
    tokio::fs::write(tmp, content)
        .await
        .map_err(|e| io_err(tmp, e))?;

    if let Err(err) = tokio::fs::rename(tmp, target).await {
        let _ = tokio::fs::remove_file(tmp).await;
        return Err(io_err(target, err));
    }
    Ok(())
}
