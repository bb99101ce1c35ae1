//! Rebuild loop driven by file changes

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use stylepipe_compiler::BuildContext;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::FileChange;

/// Result of handling one debounced change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildOutcome {
    pub change: Option<FileChange>,
    /// Sources rebuilt successfully
    pub rebuilt: Vec<PathBuf>,
    /// Sources whose rebuild failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

impl RebuildOutcome {
    pub fn is_noop(&self) -> bool {
        self.rebuilt.is_empty() && self.failed.is_empty()
    }
}

/// Rebuilds every style source whose artifact depends on a changed file
#[derive(Debug, Clone)]
pub struct RebuildLoop {
    ctx: Arc<BuildContext>,
}

impl RebuildLoop {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }

    /// Sources affected by `change`, sorted and deduplicated
    pub fn affected_sources(&self, change: &FileChange) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = change
            .paths()
            .into_iter()
            .flat_map(|path| self.ctx.sources_affected_by(path))
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Rebuild the sources affected by one change
    ///
    /// Distinct sources rebuild concurrently. A failed rebuild leaves that
    /// source's previous artifact and class map in place.
    pub async fn handle(&self, change: FileChange) -> RebuildOutcome {
        let sources = self.affected_sources(&change);
        if sources.is_empty() {
            debug!("No style sources depend on {:?}", change.path());
            return RebuildOutcome {
                change: Some(change),
                ..RebuildOutcome::default()
            };
        }

        let builds = sources.iter().map(|source| self.ctx.build_style(source));
        let results = join_all(builds).await;

        let mut outcome = RebuildOutcome {
            change: Some(change),
            ..RebuildOutcome::default()
        };
        for (source, result) in sources.into_iter().zip(results) {
            match result {
                Ok(_) => outcome.rebuilt.push(source),
                Err(e) => {
                    warn!("Rebuild of {} failed: {e}", source.display());
                    outcome.failed.push((source, e.to_string()));
                }
            }
        }

        info!(
            "Rebuilt {} style source(s), {} failed",
            outcome.rebuilt.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Consume `changes` in the background, reporting an outcome per change
    pub fn spawn(self, mut changes: mpsc::Receiver<FileChange>) -> mpsc::Receiver<RebuildOutcome> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let outcome = self.handle(change).await;
                if outcome.is_noop() {
                    continue;
                }
                if tx.send(outcome).await.is_err() {
                    break;
                }
            }
            debug!("Rebuild loop stopped");
        });
        rx
    }
}
