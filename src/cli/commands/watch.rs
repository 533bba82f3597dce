//! Watch command - file-system changes in, refresh lines out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::coalescer::{ChangeSource, CoalesceError, CoalescerBuilder};
use crate::config::Settings;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub path: PathBuf,
    pub heartbeat_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
    pub non_recursive: bool,
}

/// Change source backed by a `notify` watcher.
///
/// Read-only access events are dropped at the callback; everything else is
/// forwarded as a bare "changed" notification.
pub struct FsSource {
    rx: mpsc::Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl FsSource {
    /// Start watching `path`.
    pub fn start(path: &Path, recursive: bool, buffer: usize) -> Result<Self, CoalesceError> {
        let (tx, rx) = mpsc::channel(buffer.max(1));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_change(&event.kind) => {
                // Full buffer means the coalescer is already dirty.
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("[watch] file watch error: {e}"),
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher
            .watch(path, mode)
            .map_err(|e| CoalesceError::WatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("watch", "watching", "{} ({mode:?})", path.display());

        Ok(Self {
            rx,
            _watcher: watcher,
        })
    }
}

#[async_trait]
impl ChangeSource for FsSource {
    async fn next_change(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Run the watch command until Ctrl-C.
pub async fn run(args: WatchArgs, mut config: Settings) -> anyhow::Result<()> {
    let WatchArgs {
        path,
        heartbeat_ms,
        debounce_ms,
        non_recursive,
    } = args;

    if let Some(ms) = heartbeat_ms {
        config.coalescer.heartbeat_ms = ms;
    }
    if let Some(ms) = debounce_ms {
        config.coalescer.debounce_ms = ms;
    }
    let recursive = config.watch.recursive && !non_recursive;

    let source = FsSource::start(&path, recursive, config.watch.event_buffer)?;

    let cancel = CancellationToken::new();
    let (coalescer, mut signals) =
        CoalescerBuilder::from_config(&config.coalescer).spawn(cancel.clone(), source)?;

    crate::log_event!(
        "watch",
        "started",
        "{} (heartbeat: {:?}, debounce: {:?})",
        path.display(),
        coalescer.heartbeat(),
        coalescer.debounce()
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            crate::log_event!("watch", "interrupt received");
            shutdown.cancel();
        }
    });

    let mut count: u64 = 0;
    while signals.recv().await.is_some() {
        count += 1;
        println!(
            "{} refresh #{count}",
            chrono::Local::now().format("%H:%M:%S%.3f")
        );
    }

    let stats = coalescer.stats();
    let reason = coalescer.join().await?;
    crate::log_event!(
        "watch",
        "finished",
        "{reason}: {} events coalesced into {} signals",
        stats.input_events,
        stats.signals_sent()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const EVENT_WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_access_events_are_not_changes() {
        assert!(!is_change(&EventKind::Access(AccessKind::Any)));
        assert!(is_change(&EventKind::Create(CreateKind::File)));
        assert!(is_change(&EventKind::Modify(ModifyKind::Any)));
    }

    #[tokio::test]
    async fn test_missing_path_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");

        let err = FsSource::start(&missing, true, 8).err().unwrap();
        match err {
            CoalesceError::WatchFailed { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_file_write_reaches_source() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = FsSource::start(temp_dir.path(), true, 8).unwrap();

        std::fs::write(temp_dir.path().join("deployment.yaml"), "replicas: 3").unwrap();

        let change = timeout(EVENT_WAIT, source.next_change()).await;
        assert_eq!(change, Ok(Some(())));
    }

    #[tokio::test]
    async fn test_full_buffer_still_reports_change() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = FsSource::start(temp_dir.path(), true, 1).unwrap();

        for i in 0..10 {
            let file = temp_dir.path().join(format!("pod-{i}.yaml"));
            std::fs::write(&file, format!("revision: {i}")).unwrap();
        }

        // Overflowing notifications are dropped, not turned into errors.
        let change = timeout(EVENT_WAIT, source.next_change()).await;
        assert_eq!(change, Ok(Some(())));
    }
}
