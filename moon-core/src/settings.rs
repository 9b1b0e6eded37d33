//! Daemon settings: compiled-in defaults, optionally overridden through the
//! environment. There are no command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigurationError;

pub const DEFAULT_CONFIG_FILE: &str = "/var/moon/configuration.yml";
pub const DEFAULT_APPS_ROOT: &str = "/var/moon/repository";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CLONE_ATTEMPTS: u32 = 300;
pub const DEFAULT_CLONE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_COMPOSE_COMMAND: &str = "docker-compose";
pub const DEFAULT_GIT_BINARY: &str = "git";

pub const ENV_CONFIG_FILE: &str = "MOON_CONFIG_FILE";
pub const ENV_APPS_ROOT: &str = "MOON_APPS_ROOT";
pub const ENV_POLL_INTERVAL_SECS: &str = "MOON_POLL_INTERVAL_SECS";
pub const ENV_CLONE_ATTEMPTS: &str = "MOON_CLONE_ATTEMPTS";
pub const ENV_CLONE_INTERVAL_SECS: &str = "MOON_CLONE_INTERVAL_SECS";
pub const ENV_COMPOSE_COMMAND: &str = "MOON_COMPOSE_COMMAND";
pub const ENV_GIT_BINARY: &str = "MOON_GIT_BINARY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Desired-state document, re-read every pass.
    pub config_file: PathBuf,
    /// One workspace directory per app lives directly under this root.
    pub apps_root: PathBuf,
    pub poll_interval: Duration,
    /// Bound on the post-clone readiness poll.
    pub clone_attempts: u32,
    pub clone_interval: Duration,
    /// Program plus leading arguments, e.g. `["docker", "compose"]`.
    pub compose_command: Vec<String>,
    pub git_binary: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            apps_root: PathBuf::from(DEFAULT_APPS_ROOT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            clone_attempts: DEFAULT_CLONE_ATTEMPTS,
            clone_interval: DEFAULT_CLONE_INTERVAL,
            compose_command: vec![DEFAULT_COMPOSE_COMMAND.to_string()],
            git_binary: DEFAULT_GIT_BINARY.to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `MOON_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(path) = non_empty(&lookup, ENV_CONFIG_FILE) {
            settings.config_file = PathBuf::from(path);
        }
        if let Some(path) = non_empty(&lookup, ENV_APPS_ROOT) {
            settings.apps_root = PathBuf::from(path);
        }
        if let Some(raw) = non_empty(&lookup, ENV_POLL_INTERVAL_SECS) {
            settings.poll_interval = Duration::from_secs(positive(ENV_POLL_INTERVAL_SECS, raw)?);
        }
        if let Some(raw) = non_empty(&lookup, ENV_CLONE_ATTEMPTS) {
            let attempts = positive(ENV_CLONE_ATTEMPTS, raw.clone())?;
            settings.clone_attempts =
                u32::try_from(attempts).map_err(|_| ConfigurationError::InvalidSetting {
                    key: ENV_CLONE_ATTEMPTS,
                    value: raw,
                    reason: "value is too large",
                })?;
        }
        if let Some(raw) = non_empty(&lookup, ENV_CLONE_INTERVAL_SECS) {
            settings.clone_interval =
                Duration::from_secs(positive(ENV_CLONE_INTERVAL_SECS, raw)?);
        }
        if let Some(raw) = non_empty(&lookup, ENV_COMPOSE_COMMAND) {
            settings.compose_command = raw.split_whitespace().map(str::to_string).collect();
        }
        if let Some(raw) = non_empty(&lookup, ENV_GIT_BINARY) {
            settings.git_binary = raw;
        }

        Ok(settings)
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive(key: &'static str, raw: String) -> Result<u64, ConfigurationError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigurationError::InvalidSetting {
            key,
            value: raw,
            reason: "must be greater than zero",
        }),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigurationError::InvalidSetting {
            key,
            value: raw,
            reason: "expected a whole number",
        }),
    }
}
