//! Error types for moon-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while syncing a repository checkout or driving a
/// deployment.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkout never reported itself up to date within the clone-wait bound.
    #[error("cloning {url}#{branch} into {path} timed out after {attempts} attempts")]
    CloneTimeout {
        url: String,
        branch: String,
        path: PathBuf,
        attempts: u32,
    },

    /// Fetching the remote branch status failed.
    #[error("remote check failed for {path}: {message}")]
    RemoteCheck { path: PathBuf, message: String },

    /// A deployment command could not be started or reported failure.
    #[error("`{command}` failed in {path}: {message}")]
    Runner {
        command: String,
        path: PathBuf,
        message: String,
    },

    /// The compose descriptor could not be serialized.
    #[error("descriptor serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
