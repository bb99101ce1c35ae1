//! File ignore pattern matching

use glob::{Pattern, PatternError};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Glob patterns for paths whose changes never trigger rebuilds
///
/// Patterns are matched against the full path, so `*.tmp` matches at any
/// depth.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Arc<Vec<Pattern>>,
}

impl IgnoreFilter {
    pub fn from_patterns(patterns: &[String]) -> Result<Self, PatternError> {
        let compiled = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns: Arc::new(compiled),
        })
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let ignored = self.patterns.iter().any(|p| p.matches(&path_str));
        if ignored {
            trace!("Ignoring {:?}", path);
        }
        ignored
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylepipe_core::config::WatcherConfig;

    #[test]
    fn test_default_patterns() {
        let filter =
            IgnoreFilter::from_patterns(&WatcherConfig::default().ignore_patterns).expect("filter");

        assert!(filter.should_ignore(Path::new("/repo/node_modules/bootstrap/scss/_x.scss")));
        assert!(filter.should_ignore(Path::new("/repo/.git/index")));
        assert!(filter.should_ignore(Path::new("/repo/client/a.scss.tmp")));
        assert!(filter.should_ignore(Path::new("/repo/client/a.scss~")));
        assert!(!filter.should_ignore(Path::new("/repo/client/web/a.module.scss")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(IgnoreFilter::from_patterns(&["[".to_string()]).is_err());
    }

    #[test]
    fn test_empty_filter_ignores_nothing() {
        let filter = IgnoreFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.should_ignore(Path::new("/anything")));
    }
}
