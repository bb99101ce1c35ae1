//! The style plugin
//!
//! Claims `.css`/`.scss` imports, runs them through the compiler crate's
//! pipeline and hands the bundler a real CSS file. CSS Modules sources get
//! a synthesized script module in [`MODULE_NAMESPACE`] that imports the
//! artifact and default-exports the class name map.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylepipe_compiler::{BuildContext, ARTIFACT_IMPORT_PREFIX};
use stylepipe_core::error::{Error, Result};
use tracing::debug;

use crate::host::{
    HookFilter, LoadArgs, LoadHook, LoadResult, LoadedContents, PluginData, PluginHost,
    ResolveArgs, ResolveHook, ResolveResult,
};
use crate::loaders::Loader;
use crate::{Plugin, FILE_NAMESPACE};

/// Namespace of style files claimed by the plugin, before compilation
pub const SOURCE_NAMESPACE: &str = "style-source";

/// Namespace of synthesized CSS Modules script modules
pub const MODULE_NAMESPACE: &str = "postcss-module";

const DATA_TEXT_CSS_PREFIX: &str = "data:text/css,";

/// Registers the style pipeline hooks
#[derive(Debug, Clone)]
pub struct StylePlugin {
    ctx: Arc<BuildContext>,
}

impl StylePlugin {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<BuildContext> {
        &self.ctx
    }
}

impl Plugin for StylePlugin {
    fn name(&self) -> &str {
        "stylepipe"
    }

    fn setup(&self, host: &mut PluginHost) -> Result<()> {
        let ctx = &self.ctx;

        host.on_resolve(
            HookFilter::new(r"\.s?css$")?,
            Arc::new(ResolveStyle { ctx: Arc::clone(ctx) }),
        );
        host.on_load(
            HookFilter::new(".*")?.in_namespace(SOURCE_NAMESPACE),
            Arc::new(BuildStyle { ctx: Arc::clone(ctx) }),
        );
        host.on_load(
            HookFilter::new(".*")?.in_namespace(MODULE_NAMESPACE),
            Arc::new(SynthesizeModule { ctx: Arc::clone(ctx) }),
        );
        host.on_resolve(
            HookFilter::new(&format!("^{ARTIFACT_IMPORT_PREFIX}"))?.in_namespace(MODULE_NAMESPACE),
            Arc::new(ResolveArtifact),
        );
        host.on_resolve(
            HookFilter::new(r"\.ttf$")?,
            Arc::new(ResolveFont { ctx: Arc::clone(ctx) }),
        );
        host.on_load(
            HookFilter::new(&format!("^{}", regex::escape(DATA_TEXT_CSS_PREFIX)))?,
            Arc::new(InlineCss),
        );
        Ok(())
    }
}

/// `\.s?css$` in the `file` namespace or at entry points
struct ResolveStyle {
    ctx: Arc<BuildContext>,
}

#[async_trait]
impl ResolveHook for ResolveStyle {
    async fn resolve(&self, args: &ResolveArgs) -> Result<Option<ResolveResult>> {
        if args.namespace != FILE_NAMESPACE && !args.namespace.is_empty() {
            debug!(
                "Skipping style import {:?} from namespace {:?}",
                args.path, args.namespace
            );
            return Ok(None);
        }

        let original = self.ctx.resolver().resolve(&args.path, &args.resolve_dir);
        Ok(Some(
            ResolveResult::new(original.to_string_lossy(), SOURCE_NAMESPACE)
                .with_plugin_data(PluginData {
                    original_path: original.clone(),
                })
                .with_watch_files(vec![original]),
        ))
    }
}

/// Compile, transform and write the artifact, then redirect to it
struct BuildStyle {
    ctx: Arc<BuildContext>,
}

#[async_trait]
impl LoadHook for BuildStyle {
    async fn load(&self, args: &LoadArgs) -> Result<Option<LoadResult>> {
        let original = original_path(args);
        let build = self.ctx.build_style(&original).await?;

        let namespace = if build.source.is_module {
            MODULE_NAMESPACE
        } else {
            FILE_NAMESPACE
        };

        Ok(Some(LoadResult::Redirect(
            ResolveResult::new(build.artifact.temp_path.to_string_lossy(), namespace)
                .with_loader(Loader::Css)
                .with_plugin_data(PluginData {
                    original_path: build.source.path.clone(),
                })
                .with_watch_files(build.artifact.watch_files),
        )))
    }
}

/// Script module for a CSS Modules artifact
struct SynthesizeModule {
    ctx: Arc<BuildContext>,
}

#[async_trait]
impl LoadHook for SynthesizeModule {
    async fn load(&self, args: &LoadArgs) -> Result<Option<LoadResult>> {
        let original = args
            .plugin_data
            .as_ref()
            .map(|data| data.original_path.clone())
            .ok_or_else(|| {
                Error::hook(format!("Module artifact {} has no original path", args.path))
            })?;

        let module = self
            .ctx
            .synthesize_module(&original, Path::new(&args.path))
            .await?;

        Ok(Some(LoadResult::Contents(LoadedContents {
            contents: module.contents,
            loader: Loader::Js,
            resolve_dir: Some(module.resolve_dir),
            watch_files: module.watch_files,
        })))
    }
}

/// `x:<artifact>` imports emitted by synthesized modules
struct ResolveArtifact;

#[async_trait]
impl ResolveHook for ResolveArtifact {
    async fn resolve(&self, args: &ResolveArgs) -> Result<Option<ResolveResult>> {
        let Some(artifact) = args.path.strip_prefix(ARTIFACT_IMPORT_PREFIX) else {
            return Ok(None);
        };
        Ok(Some(
            ResolveResult::new(artifact, FILE_NAMESPACE).with_loader(Loader::Css),
        ))
    }
}

/// Fixed font overrides
struct ResolveFont {
    ctx: Arc<BuildContext>,
}

#[async_trait]
impl ResolveHook for ResolveFont {
    async fn resolve(&self, args: &ResolveArgs) -> Result<Option<ResolveResult>> {
        Ok(self
            .ctx
            .resolver()
            .resolve_asset_override(&args.path)
            .map(|path| ResolveResult::new(path.to_string_lossy(), FILE_NAMESPACE)))
    }
}

/// `data:text/css,<percent-encoded css>`
struct InlineCss;

#[async_trait]
impl LoadHook for InlineCss {
    async fn load(&self, args: &LoadArgs) -> Result<Option<LoadResult>> {
        let Some(encoded) = args.path.strip_prefix(DATA_TEXT_CSS_PREFIX) else {
            return Ok(None);
        };
        let css = percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|e| Error::hook(format!("Invalid inline CSS data URL: {e}")))?;

        Ok(Some(LoadResult::Contents(LoadedContents {
            contents: css.into_owned(),
            loader: Loader::Css,
            resolve_dir: None,
            watch_files: Vec::new(),
        })))
    }
}

fn original_path(args: &LoadArgs) -> PathBuf {
    args.plugin_data
        .as_ref()
        .map(|data| data.original_path.clone())
        .unwrap_or_else(|| PathBuf::from(&args.path))
}
