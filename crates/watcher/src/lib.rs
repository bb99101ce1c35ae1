#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! File system watching for incremental style rebuilds
//!
//! This crate provides:
//! - Debounced, per-path file change events from `notify`
//! - Glob-based ignore filtering
//! - A rebuild loop that maps changed files to the style sources whose
//!   artifacts depend on them and rebuilds those through a `BuildContext`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stylepipe_compiler::BuildContext;
//! use stylepipe_core::Config;
//! use stylepipe_watcher::{FileWatcher, RebuildLoop};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut watcher = FileWatcher::new(&config.watcher)?;
//! let ctx = Arc::new(BuildContext::new(config)?);
//!
//! let events = watcher.watch("client").await?;
//! let mut outcomes = RebuildLoop::new(ctx).spawn(events);
//! while let Some(outcome) = outcomes.recv().await {
//!     println!("{} rebuilt", outcome.rebuilt.len());
//! }
//! # Ok(())
//! # }
//! ```

mod debouncer;
mod events;
mod ignore;
mod rebuild;
mod watcher;

pub use debouncer::EventDebouncer;
pub use events::FileChange;
pub use ignore::IgnoreFilter;
pub use rebuild::{RebuildLoop, RebuildOutcome};
pub use watcher::FileWatcher;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::events::FileChange;
    pub use crate::rebuild::RebuildLoop;
    pub use crate::watcher::FileWatcher;
}
