//! Error types for moon-core.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while reading the desired-state document or
/// resolving daemon settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configuration file does not exist.
    #[error("configuration not found at {path}")]
    NotFound { path: PathBuf },

    /// Underlying I/O failure other than a missing file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML, including line context from serde_yaml.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An `apps` entry is present but does not have the expected shape.
    #[error("invalid definition for app '{name}': {source}")]
    InvalidApp {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// An app name cannot be used as a workspace directory name.
    #[error("invalid app name '{name}': {reason}")]
    InvalidAppName { name: String, reason: &'static str },

    /// An environment override could not be interpreted.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
