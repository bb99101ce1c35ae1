//! Process-wide class name map table
//!
//! Decouples "the CSS was transformed" from "the importing module is
//! synthesized": the bundler may run the two load hooks in either order and
//! re-run them on watch triggers.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Logical class name -> scoped class name, ordered for stable output
pub type ClassNameMap = BTreeMap<String, String>;

/// Latest class name map per source path
#[derive(Debug, Clone, Default)]
pub struct ModuleMapCache {
    maps: Arc<DashMap<PathBuf, ClassNameMap>>,
}

impl ModuleMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the map for `path`, replacing any previous one
    pub fn put(&self, path: impl Into<PathBuf>, map: ClassNameMap) {
        let path = path.into();
        trace!("Recording {} class names for {:?}", map.len(), path);
        self.maps.insert(path, map);
    }

    pub fn get(&self, path: &Path) -> Option<ClassNameMap> {
        self.maps.get(path).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, path: &Path) -> Option<ClassNameMap> {
        self.maps.remove(path).map(|(_, map)| map)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.maps.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
