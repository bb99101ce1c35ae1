//! Configuration module for the stylepipe build pipeline
//!
//! Configuration is read once when a build process starts and is never
//! re-read per file. It can be loaded from a TOML file and/or environment
//! variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use defaults::*;

/// Name of the project-local configuration file
pub const CONFIG_FILE_NAME: &str = "stylepipe.toml";

/// Main configuration structure for the style pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Specifier resolution rules
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// SASS compiler options
    #[serde(default)]
    pub sass: SassConfig,

    /// PostCSS stage options
    #[serde(default)]
    pub postcss: PostcssConfig,

    /// Temp artifact and output options
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// File watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Bundler behavior toggles
    #[serde(default)]
    pub flags: BuildFlags,
}

/// Fixed prefix tables used by the path resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Repository root; relative values are taken from the working directory
    #[serde(default = "default_repo_root")]
    pub repo_root: String,

    /// Workspace directory the aliases map into
    #[serde(default = "default_client_dir")]
    pub client_dir: String,

    /// Package directory for package-like specifiers
    #[serde(default = "default_node_modules_dir")]
    pub node_modules_dir: String,

    /// Specifier prefixes mapped to `<repo_root>/<client_dir>/<specifier>`
    #[serde(default = "default_workspace_aliases")]
    pub workspace_aliases: Vec<String>,

    /// Specifier prefixes always treated as packages
    #[serde(default = "default_package_allow_list")]
    pub package_allow_list: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            repo_root: default_repo_root(),
            client_dir: default_client_dir(),
            node_modules_dir: default_node_modules_dir(),
            workspace_aliases: default_workspace_aliases(),
            package_allow_list: default_package_allow_list(),
        }
    }
}

impl ResolverConfig {
    /// Absolute repository root
    pub fn absolute_repo_root(&self) -> Result<PathBuf> {
        let root = Path::new(&self.repo_root);
        if root.is_absolute() {
            return Ok(crate::resolver::normalize(root));
        }
        let cwd = std::env::current_dir()
            .map_err(|e| Error::config(format!("Unable to determine working directory: {e}")))?;
        Ok(crate::resolver::normalize(&cwd.join(root)))
    }
}

/// SASS compiler options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SassConfig {
    /// Include paths, relative to the repository root
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<String>,

    /// Suppress `@warn` and deprecation output
    #[serde(default = "default_quiet")]
    pub quiet: bool,
}

impl Default for SassConfig {
    fn default() -> Self {
        Self {
            include_paths: default_include_paths(),
            quiet: default_quiet(),
        }
    }
}

/// How CSS Modules class names are exposed to script code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClassNameConvention {
    /// Keep the original name and add a camelCased alias
    #[serde(rename = "camelCase")]
    CamelCase,
    /// Only expose the camelCased name
    #[default]
    #[serde(rename = "camelCaseOnly")]
    CamelCaseOnly,
    /// Expose names exactly as written
    #[serde(rename = "asIs")]
    AsIs,
}

/// PostCSS stage options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostcssConfig {
    /// Browserslist queries driving vendor prefixing
    #[serde(default = "default_browserslist")]
    pub browserslist: Vec<String>,

    /// Scoped class name pattern for module style files
    #[serde(default = "default_scoped_name_pattern")]
    pub scoped_name_pattern: String,

    /// Exported class name convention
    #[serde(default)]
    pub class_name_convention: ClassNameConvention,

    /// Minify the transformed CSS
    #[serde(default)]
    pub minify: bool,
}

impl Default for PostcssConfig {
    fn default() -> Self {
        Self {
            browserslist: default_browserslist(),
            scoped_name_pattern: default_scoped_name_pattern(),
            class_name_convention: ClassNameConvention::default(),
            minify: false,
        }
    }
}

/// Temp artifact and output options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Prefix of the process-lifetime temp directory
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    /// Bundle output directory, relative to the repository root
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            temp_prefix: default_temp_prefix(),
            out_dir: default_out_dir(),
        }
    }
}

/// Configuration for file watching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Debounce time in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Patterns to ignore
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Environment-driven bundler toggles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    /// Production mode with minification (`MINIFY`)
    #[serde(default)]
    pub minify: bool,

    /// Keep the progress reporter plugin (`WEBPACK_PROGRESS_PLUGIN`)
    #[serde(default)]
    pub progress: bool,

    /// Add the bundle analyzer plugin (`WEBPACK_BUNDLE_ANALYZER`)
    #[serde(default)]
    pub bundle_analyzer: bool,

    /// Wrap the config in the speed-measure plugin (`WEBPACK_SPEED_ANALYZER`)
    #[serde(default)]
    pub speed_analyzer: bool,

    /// Use the prebuilt DLL bundle (`WEBPACK_DLL_PLUGIN`)
    #[serde(default)]
    pub dll_plugin: bool,

    /// API URL baked into the bundle (`SOURCEGRAPH_API_URL`)
    #[serde(default)]
    pub api_url: Option<String>,
}

impl BuildFlags {
    /// `development` or `production`
    pub fn mode(&self) -> &'static str {
        if self.minify {
            "production"
        } else {
            "development"
        }
    }

    /// Whether the filesystem cache should be used
    pub fn cache_enabled(&self) -> bool {
        !self.minify
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sass.include_paths.is_empty() {
            return Err(Error::config("sass.include_paths must not be empty"));
        }

        if self.resolver.workspace_aliases.iter().any(String::is_empty) {
            return Err(Error::config("resolver.workspace_aliases contains an empty prefix"));
        }

        if self.resolver.package_allow_list.iter().any(String::is_empty) {
            return Err(Error::config("resolver.package_allow_list contains an empty prefix"));
        }

        let pattern = &self.postcss.scoped_name_pattern;
        if !pattern.contains("[local]") {
            return Err(Error::config(format!(
                "Invalid scoped name pattern '{pattern}': must contain [local]"
            )));
        }

        if self.artifacts.temp_prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(Error::config(format!(
                "Invalid temp prefix '{}': must not contain a path separator",
                self.artifacts.temp_prefix
            )));
        }

        Ok(())
    }

    /// Path of the project-local config file under `root`
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }
}
