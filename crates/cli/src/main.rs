//! stylepipe CLI - style build pipeline for the web client
//!
//! This binary compiles style entries through the bundler plugin host,
//! keeps them rebuilt while watching, and prints the bundler configuration.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylepipe::{build_entries, build_options_json, plugin_host, storybook_config_json, Config};
use stylepipe_compiler::BuildContext;
use stylepipe_watcher::{FileWatcher, RebuildLoop};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "stylepipe")]
#[command(about = "SCSS and CSS Modules build pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile style entries once
    Build {
        /// Style files to build, relative to the current directory
        #[arg(required = true)]
        entries: Vec<PathBuf>,

        /// Output directory (defaults to artifacts.out_dir)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Build style entries and rebuild them as their dependencies change
    Watch {
        #[arg(required = true)]
        entries: Vec<PathBuf>,

        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Print the bundler configuration as JSON
    Rules {
        /// Print the finalized Storybook webpack config instead of esbuild options
        #[arg(long)]
        storybook: bool,

        /// Entry points for the esbuild options
        entries: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::Build { entries, out }) => build(config, &entries, out).await,
        Some(Commands::Watch { entries, out }) => watch(config, &entries, out).await,
        Some(Commands::Rules { storybook, entries }) => rules(&config, storybook, entries),
        None => {
            println!("Run 'stylepipe build <ENTRIES>' to compile styles, or --help for more options");
            Ok(())
        }
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let filter = ["stylepipe", "stylepipe_compiler", "stylepipe_bundler", "stylepipe_watcher"]
        .map(|target| format!("{target}={level}"))
        .join(",");

    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}

fn output_dir(config: &Config, out: Option<PathBuf>) -> Result<PathBuf> {
    match out {
        Some(dir) => Ok(dir),
        None => Ok(config
            .resolver
            .absolute_repo_root()?
            .join(&config.artifacts.out_dir)),
    }
}

async fn build(config: Config, entries: &[PathBuf], out: Option<PathBuf>) -> Result<()> {
    let out_dir = output_dir(&config, out)?;
    let ctx = Arc::new(BuildContext::new(config).context("Failed to create build context")?);
    let host = plugin_host(&ctx)?;
    let cwd = env::current_dir().context("Failed to get current directory")?;

    let summary = build_entries(&ctx, &host, entries, &cwd, &out_dir).await?;
    println!(
        "{} script module(s), {} stylesheet(s) written to {}",
        summary.scripts(),
        summary.stylesheets(),
        out_dir.display()
    );
    Ok(())
}

async fn watch(config: Config, entries: &[PathBuf], out: Option<PathBuf>) -> Result<()> {
    let out_dir = output_dir(&config, out)?;
    let watcher_config = config.watcher.clone();
    let ctx = Arc::new(BuildContext::new(config).context("Failed to create build context")?);
    let host = plugin_host(&ctx)?;
    let cwd = env::current_dir().context("Failed to get current directory")?;

    build_entries(&ctx, &host, entries, &cwd, &out_dir).await?;

    let mut watcher = FileWatcher::new(&watcher_config)?;
    let client_dir = ctx.resolver().client_dir().to_path_buf();
    let watch_root: &Path = if client_dir.exists() {
        &client_dir
    } else {
        ctx.resolver().repo_root()
    };
    let events = watcher.watch(watch_root).await?;
    let mut outcomes = RebuildLoop::new(Arc::clone(&ctx)).spawn(events);
    info!("Watching {} for changes (Ctrl-C to stop)", watch_root.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watcher");
                break;
            }
            outcome = outcomes.recv() => {
                let Some(outcome) = outcome else { break };
                for (source, message) in &outcome.failed {
                    warn!("{}: {message}", source.display());
                }
                if outcome.rebuilt.is_empty() {
                    continue;
                }
                if let Err(e) = build_entries(&ctx, &host, entries, &cwd, &out_dir).await {
                    error!("Failed to refresh outputs: {e:#}");
                }
            }
        }
    }

    watcher.stop().await?;
    Ok(())
}

fn rules(config: &Config, storybook: bool, entries: Vec<PathBuf>) -> Result<()> {
    let json = if storybook {
        let root = config.resolver.absolute_repo_root()?;
        storybook_config_json(config, &root)?
    } else {
        build_options_json(config, entries)?
    };
    println!("{json}");
    Ok(())
}
