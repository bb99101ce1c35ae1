//! Specifier to absolute path resolution
//!
//! Resolution is a pure function of the specifier, the importing directory
//! and the fixed prefix tables. It never touches the filesystem; a path that
//! does not exist only fails later, when the compiler tries to read it.

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::specifier::{ModuleSpecifier, SpecifierKind};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Font specifier the Monaco codicon stylesheet imports relative to itself
const CODICON_SPECIFIER: &str = "./codicon.ttf";
const CODICON_DIR: &str = "monaco-editor/esm/vs/base/browser/ui/codicons/codicon";

/// Maps module specifiers to absolute paths
#[derive(Debug, Clone)]
pub struct PathResolver {
    repo_root: PathBuf,
    client_dir: PathBuf,
    node_modules_dir: PathBuf,
    aliases: Arc<[String]>,
    packages: Arc<[String]>,
}

impl PathResolver {
    /// Create a resolver rooted at `repo_root`
    pub fn new(repo_root: impl Into<PathBuf>, config: &ResolverConfig) -> Self {
        let repo_root = normalize(&repo_root.into());
        Self {
            client_dir: repo_root.join(&config.client_dir),
            node_modules_dir: repo_root.join(&config.node_modules_dir),
            repo_root,
            aliases: config.workspace_aliases.clone().into(),
            packages: config.package_allow_list.clone().into(),
        }
    }

    /// Create a resolver from configuration, anchoring a relative root at the working directory
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Ok(Self::new(config.absolute_repo_root()?, config))
    }

    /// Repository root all rules are anchored at
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Workspace client directory
    pub fn client_dir(&self) -> &Path {
        &self.client_dir
    }

    /// Package directory
    pub fn node_modules_dir(&self) -> &Path {
        &self.node_modules_dir
    }

    /// Classify a specifier with this resolver's prefix tables
    pub fn classify(&self, specifier: &str) -> ModuleSpecifier {
        ModuleSpecifier::classify(specifier, &self.aliases, &self.packages)
    }

    /// Resolve `specifier` as imported from `base_dir`
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> PathBuf {
        let spec = self.classify(specifier);
        let resolved = match spec.kind() {
            SpecifierKind::WorkspaceAlias => self.client_dir.join(spec.as_str()),
            SpecifierKind::Package => self.node_modules_dir.join(spec.as_str()),
            SpecifierKind::Absolute => PathBuf::from(spec.as_str()),
            SpecifierKind::Relative => {
                let base = if base_dir.is_absolute() {
                    base_dir.to_path_buf()
                } else {
                    self.repo_root.join(base_dir)
                };
                base.join(spec.as_str())
            }
        };
        normalize(&resolved)
    }

    /// Fixed asset overrides for specifiers that cannot be resolved from their importer
    pub fn resolve_asset_override(&self, specifier: &str) -> Option<PathBuf> {
        if specifier == CODICON_SPECIFIER {
            return Some(normalize(
                &self.node_modules_dir.join(CODICON_DIR).join(specifier),
            ));
        }
        None
    }
}

/// Lexically normalize `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}
