use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use moon_core::{config, Settings};
use moon_sync::{AppBank, Backends, CloneWait, ComposeRunner, GitCli, Workspace};

use crate::error::{error_chain, io_err, DaemonError};
use crate::watcher;

/// Which convergence pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// First pass after bootstrap; every desired app is started.
    Initial,
    /// Periodic pass; only the diff against the running bank is applied.
    Poll,
}

/// Counts of lifecycle operations one pass performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub killed: usize,
    pub started: usize,
    pub restarted: usize,
}

impl PassReport {
    pub fn is_empty(&self) -> bool {
        self.killed == 0 && self.started == 0 && self.restarted == 0
    }

    fn merge(self, other: PassReport) -> PassReport {
        PassReport {
            killed: self.killed + other.killed,
            started: self.started + other.started,
            restarted: self.restarted + other.restarted,
        }
    }
}

/// Owns the running bank and drives it towards the configuration file.
///
/// All state transitions happen through `&mut self`, one at a time.
#[derive(Debug)]
pub struct Reconciler {
    settings: Settings,
    backends: Backends,
    running: AppBank,
}

impl Reconciler {
    pub fn new(settings: Settings, backends: Backends) -> Self {
        Self {
            settings,
            backends,
            running: AppBank::new(),
        }
    }

    /// Reconciler wired to the `git` CLI and the configured compose command.
    pub fn from_settings(settings: Settings) -> Self {
        let backends = Backends {
            git: std::sync::Arc::new(GitCli::new(settings.git_binary.clone())),
            runner: std::sync::Arc::new(ComposeRunner::new(&settings.compose_command)),
            clone_wait: CloneWait::from(&settings),
        };
        Self::new(settings, backends)
    }

    /// Apps believed to be running.
    pub fn running(&self) -> &AppBank {
        &self.running
    }

    /// Stop and delete every workspace left under the apps root.
    ///
    /// Creates the root when absent. Returns how many workspaces were removed.
    pub async fn bootstrap(&mut self) -> Result<usize, DaemonError> {
        let root = &self.settings.apps_root;
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| io_err(root, e))?;

        let dangling = Workspace::scan(root).await?;
        for workspace in &dangling {
            tracing::info!(path = %workspace.path().display(), "removing dangling workspace");
            self.backends.runner.stop(workspace.path()).await?;
            workspace.delete().await?;
        }

        self.running = AppBank::new();
        tracing::info!(root = %root.display(), removed = dangling.len(), "bootstrap finished");
        Ok(dangling.len())
    }

    /// Read the configuration and apply the diff against the running bank.
    ///
    /// Kills go first. Each successful kill or start updates the running
    /// bank immediately, so an aborted pass leaves it accurate.
    pub async fn converge(&mut self, pass: Pass) -> Result<PassReport, DaemonError> {
        let configuration = config::load_at(&self.settings.config_file)?;
        let desired = AppBank::from_configuration(&self.settings.apps_root, &configuration)?;

        let plan = match pass {
            Pass::Initial => AppBank::new().plan(&desired),
            Pass::Poll => self.running.plan(&desired),
        };
        let mut report = PassReport::default();
        if plan.is_empty() {
            tracing::debug!(apps = desired.len(), "configuration unchanged");
            return Ok(report);
        }

        for record in &plan.to_kill {
            record.kill(&self.backends).await?;
            self.running.remove(record);
            report.killed += 1;
        }
        for record in plan.to_start {
            record.start(&self.backends).await?;
            self.running.insert(record);
            report.started += 1;
        }

        self.running = desired;
        Ok(report)
    }

    /// Restart every running app whose checkout is behind its remote.
    ///
    /// A failed freshness check counts as up to date. A failed restart
    /// drops the app from the running bank and aborts the pass.
    pub async fn poll_freshness(&mut self) -> Result<PassReport, DaemonError> {
        let mut report = PassReport::default();
        let snapshot: Vec<_> = self.running.iter().cloned().collect();

        for record in snapshot {
            match record.is_up_to_date(&self.backends).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(app = %record.name(), "checkout is stale, restarting");
                    if let Err(err) = record.restart(&self.backends).await {
                        self.running.remove(&record);
                        return Err(err.into());
                    }
                    report.restarted += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        app = %record.name(),
                        error = %error_chain(&err),
                        "freshness check failed, treating as up to date",
                    );
                }
            }
        }
        Ok(report)
    }

    /// One loop iteration: converge, then check freshness.
    pub async fn tick(&mut self) -> Result<PassReport, DaemonError> {
        let converged = self.converge(Pass::Poll).await?;
        let refreshed = self.poll_freshness().await?;
        Ok(converged.merge(refreshed))
    }

    /// Bootstrap, run the initial pass, then tick until `shutdown` fires.
    ///
    /// A pass in flight is never cancelled; shutdown takes effect between
    /// passes. Only a bootstrap failure ends the loop with an error. Failed passes
    /// are logged and retried on the next tick.
    pub async fn run_until(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), DaemonError> {
        self.bootstrap().await?;

        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _watcher = match watcher::spawn(&self.settings.config_file, wake_tx) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(
                    path = %self.settings.config_file.display(),
                    error = %error_chain(&err),
                    "configuration watcher unavailable, polling only",
                );
                None
            }
        };

        let started = Instant::now();
        let outcome = self.converge(Pass::Initial).await;
        log_outcome(Pass::Initial, started, outcome);
        if shutdown_requested(&mut shutdown) {
            return Ok(());
        }

        let interval = self.settings.poll_interval;
        loop {
            let started = Instant::now();
            let outcome = self.tick().await;
            log_outcome(Pass::Poll, started, outcome);

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(interval) => {}
                Some(()) = wake_rx.recv() => {}
            }
        }

        tracing::info!(running = self.running.len(), "reconciliation loop stopped");
        Ok(())
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(broadcast::error::TryRecvError::Empty))
}

fn log_outcome(pass: Pass, started: Instant, outcome: Result<PassReport, DaemonError>) {
    let elapsed_ms = started.elapsed().as_millis();
    match outcome {
        Ok(report) if report.is_empty() => {
            tracing::debug!(?pass, elapsed_ms, "pass finished, nothing to do");
        }
        Ok(report) => {
            tracing::info!(
                ?pass,
                killed = report.killed,
                started = report.started,
                restarted = report.restarted,
                elapsed_ms,
                "pass finished",
            );
        }
        Err(err) => {
            tracing::error!(?pass, error = %error_chain(&err), elapsed_ms, "pass failed");
        }
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(settings: Settings) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings))
}

/// Run the reconciliation loop until Ctrl-C.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    tracing::info!(
        config = %settings.config_file.display(),
        apps_root = %settings.apps_root.display(),
        poll_interval_secs = settings.poll_interval.as_secs(),
        "moon daemon starting",
    );
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let reconciler = {
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(Reconciler::from_settings(settings).run_until(shutdown))
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, shutting down daemon");
                    let _ = shutdown.send(());
                    Ok(())
                }
                Err(err) => Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}"))),
            }
        })
    };

    let result = handle_join("reconciler", reconciler.await);
    signal_handle.abort();
    result
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` filters (default `info`);
/// `MOON_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("MOON_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
