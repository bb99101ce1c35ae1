//! Temp artifact writer
//!
//! The host bundler's CSS pipeline wants a real `.css` file, so every
//! transformed result is written below a process-lifetime temp root at a
//! path derived from the source location. The directory is removed when the
//! writer is dropped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use stylepipe_core::error::{Error, Result};
use tempfile::TempDir;
use tracing::{debug, trace};

/// Directory under the temp root for sources outside the repository
const EXTERNAL_DIR: &str = "__external__";

/// One materialized artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub source_path: PathBuf,
    pub temp_path: PathBuf,
    /// Files whose change invalidates this artifact, always starting with the source
    pub watch_files: Vec<PathBuf>,
}

/// Writes transformed CSS below the temp root
#[derive(Debug)]
pub struct ArtifactWriter {
    root: TempDir,
    repo_root: PathBuf,
    /// temp path -> source that claimed it
    claims: DashMap<PathBuf, PathBuf>,
    /// source -> assigned temp path
    assigned: DashMap<PathBuf, PathBuf>,
}

impl ArtifactWriter {
    /// Create the temp root (`<tmp>/<prefix>XXXXXX`)
    pub fn new(prefix: &str, repo_root: impl Into<PathBuf>) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|e| Error::with_context("Failed to create temp root", e))?;
        debug!("Temp artifact root: {}", root.path().display());
        Ok(Self {
            root,
            repo_root: repo_root.into(),
            claims: DashMap::new(),
            assigned: DashMap::new(),
        })
    }

    pub fn temp_root(&self) -> &Path {
        self.root.path()
    }

    /// Temp path for `source`: `<root>/<relative dir>/<base name>.css`
    ///
    /// Stable for the writer's lifetime. If another source already claimed
    /// that path (`a.css` next to `a.scss`), the later one gets
    /// `<base name>.<ext>.css`.
    pub fn temp_path_for(&self, source: &Path) -> PathBuf {
        if let Some(existing) = self.assigned.get(source) {
            return existing.value().clone();
        }

        let dir = self.root.path().join(self.relative_dir(source));
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut candidates = vec![dir.join(format!("{stem}.css"))];
        candidates.push(dir.join(format!("{stem}.{ext}.css")));

        let mut n = 1usize;
        let temp_path = loop {
            let candidate = match candidates.get(n - 1) {
                Some(c) => c.clone(),
                None => dir.join(format!("{stem}.{ext}.{n}.css")),
            };
            match self.claims.entry(candidate.clone()) {
                Entry::Vacant(v) => {
                    v.insert(source.to_path_buf());
                    break candidate;
                }
                Entry::Occupied(o) if o.get() == source => break candidate,
                Entry::Occupied(o) => {
                    trace!("{:?} already claimed by {:?}", candidate, o.get());
                }
            }
            n += 1;
        };

        self.assigned
            .insert(source.to_path_buf(), temp_path.clone());
        temp_path
    }

    /// Write `css` for `source`, overwriting any previous artifact
    pub async fn write_artifact(
        &self,
        source: &Path,
        css: &str,
        watch_files: Vec<PathBuf>,
    ) -> Result<ArtifactEntry> {
        let temp_path = self.temp_path_for(source);

        if let Some(parent) = temp_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::artifact(source, e))?;
        }

        // Rename into place so an interrupted write never leaves a truncated file
        let staging = temp_path.with_extension("css.tmp");
        tokio::fs::write(&staging, css)
            .await
            .map_err(|e| Error::artifact(source, e))?;
        tokio::fs::rename(&staging, &temp_path)
            .await
            .map_err(|e| Error::artifact(source, e))?;

        trace!("Wrote {} bytes to {:?}", css.len(), temp_path);

        let mut files = vec![source.to_path_buf()];
        for file in watch_files {
            if !files.contains(&file) {
                files.push(file);
            }
        }

        Ok(ArtifactEntry {
            source_path: source.to_path_buf(),
            temp_path,
            watch_files: files,
        })
    }

    fn relative_dir(&self, source: &Path) -> PathBuf {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        match dir.strip_prefix(&self.repo_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let mut external = PathBuf::from(EXTERNAL_DIR);
                for component in dir.components() {
                    if let Component::Normal(part) = component {
                        external.push(part);
                    }
                }
                external
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn writer() -> ArtifactWriter {
        ArtifactWriter::new("stylepipe-test-", "/repo").expect("writer")
    }

    #[test]
    fn test_temp_path_layout() {
        let writer = writer();
        let path = writer.temp_path_for(Path::new("/repo/client/web/button.module.scss"));
        assert_eq!(
            path,
            writer.temp_root().join("client/web/button.module.css")
        );
    }

    #[test]
    fn test_temp_path_is_stable() {
        let writer = writer();
        let source = Path::new("/repo/client/a.scss");
        assert_eq!(writer.temp_path_for(source), writer.temp_path_for(source));
    }

    #[test]
    fn test_colliding_sources_get_distinct_paths() {
        let writer = writer();
        let scss = writer.temp_path_for(Path::new("/repo/client/a.scss"));
        let css = writer.temp_path_for(Path::new("/repo/client/a.css"));
        assert_ne!(scss, css);
        assert_eq!(css, writer.temp_root().join("client/a.css.css"));
        // the first claimant keeps its path
        assert_eq!(
            writer.temp_path_for(Path::new("/repo/client/a.scss")),
            scss
        );
    }

    #[test]
    fn test_external_sources_stay_inside_root() {
        let writer = writer();
        let path = writer.temp_path_for(Path::new("/opt/styles/x.css"));
        assert_eq!(path, writer.temp_root().join("__external__/opt/styles/x.css"));
    }

    #[tokio::test]
    async fn test_write_overwrites_and_lists_source_first() {
        let writer = writer();
        let source = Path::new("/repo/client/b.scss");
        let dep = PathBuf::from("/repo/client/_vars.scss");

        let first = writer
            .write_artifact(source, ".a{}", vec![dep.clone(), source.to_path_buf()])
            .await
            .expect("write");
        assert_eq!(first.watch_files, vec![source.to_path_buf(), dep]);

        let second = writer
            .write_artifact(source, ".b{}", vec![])
            .await
            .expect("rewrite");
        assert_eq!(first.temp_path, second.temp_path);
        let content = tokio::fs::read_to_string(&second.temp_path)
            .await
            .expect("read");
        assert_eq!(content, ".b{}");
        assert!(!second.temp_path.with_extension("css.tmp").exists());
    }

    #[test]
    fn test_root_removed_on_drop() {
        let writer = writer();
        let root = writer.temp_root().to_path_buf();
        assert!(root.exists());
        drop(writer);
        assert!(!root.exists());
    }
}
