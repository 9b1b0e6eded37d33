//! Moon core library: desired-state types, configuration loading, daemon settings.
//!
//! - [`types`]: [`AppName`], [`AppSpec`], [`Configuration`]
//! - [`config`]: load the desired-state document from disk
//! - [`settings`]: compiled-in daemon defaults with environment overrides
//! - [`error`]: [`ConfigurationError`]

pub mod config;
pub mod error;
pub mod settings;
pub mod types;

pub use error::ConfigurationError;
pub use settings::Settings;
pub use types::{AppName, AppSpec, Configuration};
