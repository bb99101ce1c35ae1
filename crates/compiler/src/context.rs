//! Build context shared by the bundler hooks
//!
//! Created once per build or watch process and passed explicitly to every
//! pipeline stage. Dropping it removes the temp root.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylepipe_core::config::Config;
use stylepipe_core::error::{Error, Result};
use stylepipe_core::PathResolver;
use tracing::{debug, info};

use crate::artifacts::{ArtifactEntry, ArtifactWriter};
use crate::locks::PathLocks;
use crate::module_map::{ClassNameMap, ModuleMapCache};
use crate::postcss::TransformStage;
use crate::source::StyleSource;
use crate::style::StyleCompiler;
use crate::synth::{synthesize, VirtualModule};

/// Outcome of one pipeline run for a style file
#[derive(Debug, Clone)]
pub struct StyleBuild {
    pub source: StyleSource,
    pub artifact: ArtifactEntry,
    pub class_map: Option<ClassNameMap>,
}

/// Process-scoped pipeline state
#[derive(Debug)]
pub struct BuildContext {
    config: Arc<Config>,
    resolver: PathResolver,
    compiler: StyleCompiler,
    transform: Arc<TransformStage>,
    module_maps: ModuleMapCache,
    artifacts: ArtifactWriter,
    locks: PathLocks,
    /// Latest artifact per source path
    builds: DashMap<PathBuf, ArtifactEntry>,
}

impl BuildContext {
    /// Create a context, anchoring the resolver at the configured repository root
    pub fn new(config: Config) -> Result<Self> {
        let resolver = PathResolver::from_config(&config.resolver)?;
        Self::with_resolver(config, resolver)
    }

    /// Create a context around an existing resolver
    pub fn with_resolver(config: Config, resolver: PathResolver) -> Result<Self> {
        config.validate()?;

        let compiler = StyleCompiler::new(resolver.clone(), &config.sass);
        let transform = TransformStage::new(&config.postcss, resolver.repo_root())?;
        let artifacts =
            ArtifactWriter::new(&config.artifacts.temp_prefix, resolver.repo_root())?;

        info!(
            "Style pipeline ready (root: {}, temp: {})",
            resolver.repo_root().display(),
            artifacts.temp_root().display()
        );

        Ok(Self {
            config: Arc::new(config),
            resolver,
            compiler,
            transform: Arc::new(transform),
            module_maps: ModuleMapCache::new(),
            artifacts,
            locks: PathLocks::new(),
            builds: DashMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn module_maps(&self) -> &ModuleMapCache {
        &self.module_maps
    }

    pub fn artifacts(&self) -> &ArtifactWriter {
        &self.artifacts
    }

    /// Compile, transform and materialize one style file
    ///
    /// Nothing is written and no class map is recorded unless both the
    /// compile and transform stages succeed.
    pub async fn build_style(&self, path: &Path) -> Result<StyleBuild> {
        let source = StyleSource::from_path(path)?;
        let _guard = self.locks.lock(&source.path).await;

        let compiler = self.compiler.clone();
        let transform = Arc::clone(&self.transform);
        let job = source.clone();
        let (compiled, output) = tokio::task::spawn_blocking(move || {
            let compiled = compiler.compile(&job)?;
            let output = transform.transform(&compiled.css, &job)?;
            Ok::<_, Error>((compiled, output))
        })
        .await
        .map_err(|e| Error::hook(format!("Style pipeline task failed: {e}")))??;

        let artifact = self
            .artifacts
            .write_artifact(&source.path, &output.css, compiled.dependencies)
            .await?;

        if let Some(map) = &output.class_map {
            self.module_maps.put(&source.path, map.clone());
        }
        self.builds.insert(source.path.clone(), artifact.clone());

        debug!(
            "Built {} -> {}",
            source.path.display(),
            artifact.temp_path.display()
        );

        Ok(StyleBuild {
            source,
            artifact,
            class_map: output.class_map,
        })
    }

    /// Synthesize the script module for a module source whose artifact is `artifact`
    pub async fn synthesize_module(&self, original: &Path, artifact: &Path) -> Result<VirtualModule> {
        let _guard = self.locks.lock(original).await;
        let map = self.module_maps.get(original);
        let dependencies = self
            .builds
            .get(original)
            .map(|entry| entry.watch_files.clone())
            .unwrap_or_default();
        synthesize(original, artifact, map.as_ref(), &dependencies)
    }

    /// Latest artifact built for `source`
    pub fn artifact_for(&self, source: &Path) -> Option<ArtifactEntry> {
        self.builds.get(source).map(|entry| entry.value().clone())
    }

    /// Sources whose artifacts depend on `changed`
    pub fn sources_affected_by(&self, changed: &Path) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = self
            .builds
            .iter()
            .filter(|entry| entry.value().watch_files.iter().any(|f| f == changed))
            .map(|entry| entry.key().clone())
            .collect();
        sources.sort();
        sources
    }
}
