//! # moon-sync
//!
//! Repository checkouts, deployments and the app lifecycle.
//!
//! Build an [`AppBank`] from a [`moon_core::Configuration`], diff it against
//! the running bank with [`AppBank::plan`], then drive each [`AppRecord`]
//! through [`AppRecord::start`] / [`AppRecord::kill`] using a set of
//! [`Backends`].

pub mod bank;
pub mod error;
pub mod git;
pub mod record;
pub mod repository;
pub mod runner;
pub mod workspace;

pub use bank::{AppBank, Plan};
pub use error::SyncError;
pub use git::GitCli;
pub use record::{AppRecord, Backends, Fingerprint};
pub use repository::{CloneWait, FetchStatus, GitBackend, Remote};
pub use runner::{ComposeRunner, DeploymentRunner, DESCRIPTOR_FILES};
pub use workspace::Workspace;
