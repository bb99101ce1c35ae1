//! Event debouncing
//!
//! Editors typically write a file several times per save. Events are held
//! per path until the path has been quiet for the debounce window, then a
//! single aggregated event is emitted.

use crate::events::{DebouncedEvent, FileChange};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Per-path debouncer feeding an output channel
pub struct EventDebouncer {
    debounce_duration: Duration,
    pending_events: Arc<DashMap<PathBuf, DebouncedEvent>>,
    output_tx: mpsc::Sender<FileChange>,
}

impl EventDebouncer {
    pub fn new(debounce_duration: Duration, output_tx: mpsc::Sender<FileChange>) -> Self {
        Self {
            debounce_duration,
            pending_events: Arc::new(DashMap::new()),
            output_tx,
        }
    }

    /// Record an event, starting the quiet-period timer for new paths
    pub fn process_event(&self, event: FileChange) {
        let path = event.path().clone();

        self.pending_events
            .entry(path.clone())
            .and_modify(|pending| {
                trace!("Updating pending event for {:?}", path);
                pending.update(event.clone());
            })
            .or_insert_with(|| {
                debug!("New event for {:?}", path);
                let pending_events = Arc::clone(&self.pending_events);
                let output_tx = self.output_tx.clone();
                let window = self.debounce_duration;
                let path = path.clone();

                tokio::spawn(async move {
                    let mut wait = window;
                    loop {
                        sleep(wait).await;
                        let quiet_for = match pending_events.get(&path) {
                            Some(pending) => pending.last_updated.elapsed(),
                            None => return,
                        };
                        if quiet_for >= window {
                            break;
                        }
                        wait = window - quiet_for;
                    }

                    if let Some((_, pending)) = pending_events.remove(&path) {
                        debug!(
                            "Emitting debounced event for {:?} (aggregated {} times)",
                            path, pending.occurrence_count
                        );
                        let _ = output_tx.send(pending.event).await;
                    }
                });

                DebouncedEvent::new(event.clone())
            });
    }

    /// Emit every pending event now
    pub async fn flush(&self) {
        debug!("Flushing {} pending events", self.pending_events.len());

        let paths: Vec<PathBuf> = self
            .pending_events
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for path in paths {
            if let Some((_, pending)) = self.pending_events.remove(&path) {
                let _ = self.output_tx.send(pending.event).await;
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending_events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_for_one_path_are_aggregated() {
        let (tx, mut rx) = mpsc::channel(10);
        let debouncer = EventDebouncer::new(Duration::from_millis(50), tx);
        let path = PathBuf::from("client/web/a.module.scss");

        debouncer.process_event(FileChange::Created(path.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        debouncer.process_event(FileChange::Modified(path.clone()));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let received = rx.try_recv().expect("debounced event");
        assert_eq!(received, FileChange::Created(path));
        assert!(rx.try_recv().is_err());
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_paths_emit_separately() {
        let (tx, mut rx) = mpsc::channel(10);
        let debouncer = EventDebouncer::new(Duration::from_millis(20), tx);

        debouncer.process_event(FileChange::Modified(PathBuf::from("a.scss")));
        debouncer.process_event(FileChange::Modified(PathBuf::from("b.scss")));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut paths = vec![
            rx.try_recv().expect("first").path().clone(),
            rx.try_recv().expect("second").path().clone(),
        ];
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("a.scss"), PathBuf::from("b.scss")]);
    }

    #[tokio::test]
    async fn test_flush_emits_pending() {
        let (tx, mut rx) = mpsc::channel(10);
        let debouncer = EventDebouncer::new(Duration::from_secs(60), tx);

        debouncer.process_event(FileChange::Deleted(PathBuf::from("gone.css")));
        assert_eq!(debouncer.pending_count(), 1);

        debouncer.flush().await;
        assert_eq!(
            rx.try_recv().expect("flushed"),
            FileChange::Deleted(PathBuf::from("gone.css"))
        );
        assert_eq!(debouncer.pending_count(), 0);
    }
}
