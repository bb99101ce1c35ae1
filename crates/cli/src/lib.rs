//! Library interface for the stylepipe CLI
//!
//! The binary in main.rs is a thin clap layer over these helpers so the
//! build flow can be exercised from integration tests.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylepipe_bundler::{
    finalize, BuildOptions, FinalizeOptions, Loader, LoaderTable, ModuleRecord, PluginHost,
    ResolveArgs, StylePlugin, WebpackConfig,
};
use stylepipe_compiler::BuildContext;
use stylepipe_core::resolver::normalize;
use tracing::{debug, info};

pub use stylepipe_core::Config;

/// Name of the module listing written next to the build outputs
pub const MANIFEST_FILE_NAME: &str = "modules.json";

/// What a build wrote to the output directory
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub modules: Vec<ModuleRecord>,
    pub written: Vec<PathBuf>,
}

impl BuildSummary {
    pub fn scripts(&self) -> usize {
        self.modules.iter().filter(|m| m.loader.is_script()).count()
    }

    pub fn stylesheets(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| m.loader == Loader::Css)
            .count()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry<'a> {
    path: &'a str,
    namespace: &'a str,
    loader: Loader,
    output: PathBuf,
    watch_files: &'a [PathBuf],
}

/// Plugin host with the style plugin registered against `ctx`
pub fn plugin_host(ctx: &Arc<BuildContext>) -> Result<PluginHost> {
    let mut host = PluginHost::new(ctx.resolver().clone(), LoaderTable::default());
    host.register(&StylePlugin::new(Arc::clone(ctx)))
        .context("Failed to register style plugin")?;
    Ok(host)
}

/// Build `entries` (relative to `base_dir`) and write the results to `out_dir`
pub async fn build_entries(
    ctx: &BuildContext,
    host: &PluginHost,
    entries: &[PathBuf],
    base_dir: &Path,
    out_dir: &Path,
) -> Result<BuildSummary> {
    let args: Vec<ResolveArgs> = entries
        .iter()
        .map(|entry| {
            let path = normalize(&base_dir.join(entry));
            ResolveArgs::entry_point(path.to_string_lossy(), base_dir)
        })
        .collect();

    let modules = host.collect(&args).await.context("Build failed")?;
    let roots = [ctx.artifacts().temp_root(), ctx.resolver().repo_root()];
    let written = write_outputs(&modules, &roots, out_dir).await?;
    info!(
        "Built {} entr{} into {}",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        out_dir.display()
    );

    Ok(BuildSummary { modules, written })
}

/// Output path for a collected module, relative to the output directory
///
/// The module's directory is mirrored relative to the first of `roots`
/// containing it. Modules outside every root land at the top level.
pub fn output_name(record: &ModuleRecord, roots: &[&Path]) -> PathBuf {
    let path = Path::new(&record.path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());
    let ext = match record.loader {
        Loader::Css => "css",
        Loader::Text => "txt",
        Loader::DataUrl => "url",
        _ => "js",
    };

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let rel_dir = roots
        .iter()
        .find_map(|root| dir.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    rel_dir.join(format!("{stem}.{ext}"))
}

/// Write every module plus a manifest into `out_dir`
pub async fn write_outputs(
    modules: &[ModuleRecord],
    roots: &[&Path],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut written = Vec::with_capacity(modules.len() + 1);
    let mut manifest = Vec::with_capacity(modules.len());
    let mut claimed = HashSet::new();

    for record in modules {
        let output = unclaimed(out_dir.join(output_name(record, roots)), &mut claimed);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&output, &record.contents)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        debug!("Wrote {}", output.display());

        manifest.push(ManifestEntry {
            path: &record.path,
            namespace: &record.namespace,
            loader: record.loader,
            output: output.clone(),
            watch_files: &record.watch_files,
        });
        written.push(output);
    }

    let manifest_path = out_dir.join(MANIFEST_FILE_NAME);
    let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
    tokio::fs::write(&manifest_path, json)
        .await
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;
    written.push(manifest_path);

    Ok(written)
}

/// `candidate`, or `<stem>.<n>.<ext>` next to it when already written this build
fn unclaimed(candidate: PathBuf, claimed: &mut HashSet<PathBuf>) -> PathBuf {
    if claimed.insert(candidate.clone()) {
        return candidate;
    }
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1usize;
    loop {
        let next = candidate.with_file_name(format!("{stem}.{n}.{ext}"));
        if claimed.insert(next.clone()) {
            return next;
        }
        n += 1;
    }
}

/// esbuild options for `entries`, as pretty JSON
pub fn build_options_json(config: &Config, entries: Vec<PathBuf>) -> Result<String> {
    let options = BuildOptions::new(config, entries);
    serde_json::to_string_pretty(&options).context("Failed to serialize build options")
}

/// Storybook's default webpack config after project finalization, as pretty JSON
pub fn storybook_config_json(config: &Config, root: &Path) -> Result<String> {
    let options = FinalizeOptions::from_config(config, root);
    let finalized = finalize(WebpackConfig::storybook_default(), &config.flags, &options)
        .context("Failed to finalize Storybook config")?;
    serde_json::to_string_pretty(&finalized).context("Failed to serialize Storybook config")
}
