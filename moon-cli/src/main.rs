//! Moon: keeps a host's compose deployments in line with a YAML file.
//!
//! # Usage
//!
//! ```text
//! moon
//! ```
//!
//! There are no flags. Settings come from compiled-in defaults, overridable
//! through the environment:
//!
//! | variable                   | default                       |
//! |----------------------------|-------------------------------|
//! | `MOON_CONFIG_FILE`         | `/var/moon/configuration.yml` |
//! | `MOON_APPS_ROOT`           | `/var/moon/repository`        |
//! | `MOON_POLL_INTERVAL_SECS`  | `30`                          |
//! | `MOON_CLONE_ATTEMPTS`      | `300`                         |
//! | `MOON_CLONE_INTERVAL_SECS` | `2`                           |
//! | `MOON_COMPOSE_COMMAND`     | `docker-compose`              |
//! | `MOON_GIT_BINARY`          | `git`                         |
//!
//! `RUST_LOG` filters log output; `MOON_LOG_FORMAT=json` emits JSON lines.

use anyhow::{Context, Result};

use moon_core::Settings;

fn main() -> Result<()> {
    let settings = Settings::from_env().context("invalid daemon settings")?;
    moon_daemon::start_blocking(settings).context("moon daemon exited with an error")
}
