//! File change events

use std::path::PathBuf;
use std::time::Instant;

/// A file system change relevant to the style pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileChange {
    /// Primary path of the change
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Created(path) | Self::Modified(path) | Self::Deleted(path) => path,
            Self::Renamed { to, .. } => to,
        }
    }

    /// Every path the change touches
    pub fn paths(&self) -> Vec<&PathBuf> {
        match self {
            Self::Renamed { from, to } => vec![from, to],
            other => vec![other.path()],
        }
    }
}

/// Event with debounce bookkeeping
#[derive(Debug, Clone)]
pub(crate) struct DebouncedEvent {
    pub event: FileChange,
    pub last_updated: Instant,
    pub occurrence_count: u32,
}

impl DebouncedEvent {
    pub fn new(event: FileChange) -> Self {
        Self {
            event,
            last_updated: Instant::now(),
            occurrence_count: 1,
        }
    }

    /// Fold a later event for the same path into this one
    pub fn update(&mut self, event: FileChange) {
        // Create followed by writes is still a create
        match (&self.event, &event) {
            (FileChange::Created(a), FileChange::Modified(b)) if a == b => {}
            _ => self.event = event,
        }
        self.last_updated = Instant::now();
        self.occurrence_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_renamed_paths() {
        let change = FileChange::Renamed {
            from: PathBuf::from("a.scss"),
            to: PathBuf::from("b.scss"),
        };
        assert_eq!(change.path(), &PathBuf::from("b.scss"));
        assert_eq!(change.paths().len(), 2);
    }

    #[test]
    fn test_create_then_modify_stays_created() {
        let path = PathBuf::from("a.module.scss");
        let mut debounced = DebouncedEvent::new(FileChange::Created(path.clone()));
        debounced.update(FileChange::Modified(path.clone()));
        assert_eq!(debounced.event, FileChange::Created(path.clone()));
        assert_eq!(debounced.occurrence_count, 2);

        debounced.update(FileChange::Deleted(path.clone()));
        assert_eq!(debounced.event, FileChange::Deleted(path));
    }
}
