//! Configuration file watcher.
//!
//! Watches the directory holding the configuration file and nudges the
//! reconciliation loop when the file is created or modified. The nudge only
//! shortens the sleep between ticks; passes still run one at a time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{io_err, DaemonError};

/// Editors often emit several events per save.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Keeps the OS watch alive; dropping it stops watching.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching `config_file`. Each relevant change sends one `()` on
/// `wake`; pending wake-ups coalesce when the channel is full.
pub fn spawn(config_file: &Path, wake: mpsc::Sender<()>) -> Result<ConfigWatcher, DaemonError> {
    let dir = match config_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // Canonicalize so event paths (which arrive resolved) share a prefix with it.
    let dir = std::fs::canonicalize(&dir).map_err(|e| io_err(&dir, e))?;
    let file_name = config_file
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| {
            DaemonError::Runtime(format!(
                "configuration path has no file name: {}",
                config_file.display()
            ))
        })?;
    let target = dir.join(file_name);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %target.display(), "watching configuration file");

    let task = tokio::spawn(async move {
        let mut debounce = Debounce::new(DEBOUNCE_WINDOW);
        while let Some(event) = event_rx.recv().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "configuration watcher event error");
                    continue;
                }
            };
            if !is_relevant_event_kind(&event.kind) {
                continue;
            }
            if !event.paths.iter().any(|path| is_config_file(path, &target)) {
                continue;
            }
            if !debounce.admit(Instant::now()) {
                continue;
            }
            tracing::info!(path = %target.display(), "configuration changed");
            let _ = wake.try_send(());
        }
    });

    Ok(ConfigWatcher {
        _watcher: watcher,
        task,
    })
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn is_config_file(path: &Path, target: &Path) -> bool {
    path == target || path.file_name() == target.file_name()
}

/// Leading-edge debounce for the single watched file.
struct Debounce {
    window: Duration,
    last_wake: Option<Instant>,
}

impl Debounce {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_wake: None,
        }
    }

    /// Whether an event seen at `now` should wake the loop.
    fn admit(&mut self, now: Instant) -> bool {
        match self.last_wake {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last_wake = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use tempfile::TempDir;
    use tokio::time::advance;

    use super::*;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_events() {
        let mut debounce = Debounce::new(Duration::from_millis(100));

        let mut wakeups = 0usize;
        for _ in 0..5 {
            if debounce.admit(Instant::now()) {
                wakeups += 1;
            }
            advance(Duration::from_millis(10)).await;
        }
        assert_eq!(wakeups, 1, "rapid saves collapse to one wake-up");

        advance(Duration::from_millis(150)).await;
        assert!(debounce.admit(Instant::now()));
        assert!(!debounce.admit(Instant::now()));
    }

    #[test]
    fn only_create_and_modify_are_relevant() {
        assert!(is_relevant_event_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event_kind(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant_event_kind(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn sibling_files_are_ignored() {
        let target = Path::new("/var/moon/configuration.yml");
        assert!(is_config_file(target, target));
        assert!(!is_config_file(Path::new("/var/moon/other.yml"), target));
    }

    #[tokio::test]
    async fn spawn_fails_for_missing_directory() {
        let root = TempDir::new().unwrap();
        let (wake_tx, _wake_rx) = mpsc::channel(1);
        let result = spawn(&root.path().join("nope").join("configuration.yml"), wake_tx);
        assert!(matches!(result, Err(DaemonError::Io { .. })));
    }
}
