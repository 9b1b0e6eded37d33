//! Moon daemon runtime: reconciliation loop + configuration watcher.

mod error;
mod runtime;
pub mod watcher;

pub use error::{error_chain, DaemonError};
pub use runtime::{init_tracing, run, start_blocking, Pass, PassReport, Reconciler};
