//! Core file system watcher built on `notify`

use crate::{debouncer::EventDebouncer, events::FileChange, ignore::IgnoreFilter};
use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stylepipe_core::config::WatcherConfig;
use stylepipe_core::error::{Error, Result};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Capacity of the raw and debounced event channels
const EVENT_QUEUE_SIZE: usize = 10_000;

/// Recursive watcher emitting debounced [`FileChange`]s
pub struct FileWatcher {
    debounce: Duration,
    ignore_filter: Arc<IgnoreFilter>,
    watchers: Vec<RecommendedWatcher>,
    watched_paths: Arc<RwLock<Vec<PathBuf>>>,
    cancellation_token: CancellationToken,
}

impl FileWatcher {
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        let ignore_filter = IgnoreFilter::from_patterns(&config.ignore_patterns)
            .map_err(|e| Error::watcher(format!("Failed to create ignore filter: {e}")))?;

        Ok(Self {
            debounce: Duration::from_millis(config.debounce_ms),
            ignore_filter: Arc::new(ignore_filter),
            watchers: Vec::new(),
            watched_paths: Arc::new(RwLock::new(Vec::new())),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Start watching `path` recursively
    pub async fn watch(&mut self, path: impl AsRef<Path>) -> Result<mpsc::Receiver<FileChange>> {
        let path = path.as_ref().to_path_buf();

        let (notify_tx, notify_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let (debounced_tx, debounced_rx) = mpsc::channel(EVENT_QUEUE_SIZE);

        let debouncer = EventDebouncer::new(self.debounce, debounced_tx);
        self.start_event_processor(notify_rx, debouncer);

        let mut watcher = Self::create_notify_watcher(notify_tx)?;
        watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| Error::watcher(format!("Failed to watch path {path:?}: {e}")))?;
        info!("Watching path: {:?}", path);

        self.watchers.push(watcher);
        self.watched_paths.write().await.push(path);

        Ok(debounced_rx)
    }

    fn create_notify_watcher(tx: mpsc::Sender<NotifyEvent>) -> Result<RecommendedWatcher> {
        let config = NotifyConfig::default().with_compare_contents(false);

        RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if let Err(e) = tx.try_send(event) {
                        error!("Failed to send notify event: {}", e);
                    }
                }
                Err(e) => error!("Notify error: {}", e),
            },
            config,
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))
    }

    fn start_event_processor(
        &self,
        mut notify_rx: mpsc::Receiver<NotifyEvent>,
        debouncer: EventDebouncer,
    ) {
        let ignore_filter = Arc::clone(&self.ignore_filter);
        let cancel = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debouncer.flush().await;
                        break;
                    }
                    event = notify_rx.recv() => {
                        let Some(event) = event else { break };
                        trace!("Received notify event: {:?}", event);
                        for change in convert_notify_event(event, &ignore_filter) {
                            debouncer.process_event(change);
                        }
                    }
                }
            }
            debug!("Event processor stopped");
        });
    }

    /// Stop watching all paths
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation_token.cancel();
        if !self.watchers.is_empty() {
            self.watchers.clear();
            self.watched_paths.write().await.clear();
            info!("File watcher stopped");
        }
        Ok(())
    }

    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.read().await.clone()
    }

    pub async fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths
            .read()
            .await
            .iter()
            .any(|p| path.starts_with(p))
    }
}

/// Map a raw notify event to pipeline changes, dropping ignored paths
fn convert_notify_event(event: NotifyEvent, ignore_filter: &IgnoreFilter) -> Vec<FileChange> {
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        if let [from, to] = event.paths.as_slice() {
            if ignore_filter.should_ignore(to) {
                return Vec::new();
            }
            return vec![FileChange::Renamed {
                from: from.clone(),
                to: to.clone(),
            }];
        }
    }

    event
        .paths
        .into_iter()
        .filter(|path| !ignore_filter.should_ignore(path))
        .filter_map(|path| match event.kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    Some(FileChange::Created(path))
                } else {
                    Some(FileChange::Deleted(path))
                }
            }
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Deleted(path)),
            _ => None,
        })
        .collect()
}
