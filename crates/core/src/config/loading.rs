//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{Config, CONFIG_FILE_NAME};

type Builder = LibConfigBuilder<config::builder::DefaultState>;

/// Environment flags read by the original bundler scripts, mapped to config keys
const BUNDLER_ENV_FLAGS: &[(&str, &str)] = &[
    ("MINIFY", "flags.minify"),
    ("WEBPACK_PROGRESS_PLUGIN", "flags.progress"),
    ("WEBPACK_BUNDLE_ANALYZER", "flags.bundle_analyzer"),
    ("WEBPACK_SPEED_ANALYZER", "flags.speed_analyzer"),
    ("WEBPACK_DLL_PLUGIN", "flags.dll_plugin"),
];

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(builder: Builder, key: &str, value: T) -> Result<Builder> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

/// Interpret an environment flag value the way the bundler scripts do
pub(crate) fn parse_env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `STYLEPIPE_` and use double underscores
    /// for nested values. For example:
    /// - `STYLEPIPE_POSTCSS__MINIFY=true`
    ///
    /// The bundler flags (`MINIFY`, `WEBPACK_*`, `SOURCEGRAPH_API_URL`) are honored too.
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder = set_config_default(builder, "resolver.repo_root", default_repo_root())?;
        let builder = set_config_default(builder, "watcher.debounce_ms", default_debounce_ms() as i64)?;
        let mut builder =
            set_config_default(builder, "artifacts.temp_prefix", default_temp_prefix())?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("STYLEPIPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in BUNDLER_ENV_FLAGS {
            if let Ok(value) = std::env::var(var) {
                match parse_env_flag(&value) {
                    Some(flag) => {
                        builder = builder
                            .set_override(*key, flag)
                            .map_err(|e| Error::config(format!("Failed to set {var}: {e}")))?;
                    }
                    None => tracing::warn!("Ignoring non-boolean value {value:?} for {var}"),
                }
            }
        }

        if let Ok(url) = std::env::var("SOURCEGRAPH_API_URL") {
            builder = builder
                .set_override("flags.api_url", url)
                .map_err(|e| Error::config(format!("Failed to set SOURCEGRAPH_API_URL: {e}")))?;
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (`./stylepipe.toml` or custom --config path)
    /// 3. Environment variables (STYLEPIPE_*, then the bundler flags)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => Path::new(CONFIG_FILE_NAME).to_path_buf(),
        };
        let config = Self::from_file(&path)?;
        config.validate()?;
        Ok(config)
    }
}
