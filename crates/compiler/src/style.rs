//! Style compiler: CSS passthrough and SCSS compilation
//!
//! SCSS is compiled with `grass`. Import resolution honors the same alias
//! rules as script imports: every file the engine reads passes through
//! [`ImporterFs`], which rewrites `@import`/`@use`/`@forward` specifiers that
//! do not resolve next to the importing file to the [`PathResolver`] result.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use stylepipe_core::config::SassConfig;
use stylepipe_core::error::{Error, Result};
use stylepipe_core::PathResolver;
use tracing::{debug, trace};

use crate::source::{StyleExtension, StyleSource};

static IMPORT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@(import|use|forward)\s+([^;{}]+)").ok());
static QUOTED_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).ok());

/// Output of the compile stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    /// Plain CSS text
    pub css: String,
    /// Files read while compiling, other than the source itself
    pub dependencies: Vec<PathBuf>,
}

/// Compiles style sources to plain CSS
#[derive(Debug, Clone)]
pub struct StyleCompiler {
    resolver: PathResolver,
    include_paths: Vec<PathBuf>,
    quiet: bool,
}

impl StyleCompiler {
    /// Create a compiler; include paths are anchored at the resolver's repository root
    pub fn new(resolver: PathResolver, config: &SassConfig) -> Self {
        let include_paths = config
            .include_paths
            .iter()
            .map(|p| resolver.repo_root().join(p))
            .collect();
        Self {
            resolver,
            include_paths,
            quiet: config.quiet,
        }
    }

    /// Absolute include paths handed to the SASS engine
    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// Compile `source` to CSS
    ///
    /// Blocking; callers on the async runtime go through `spawn_blocking`.
    pub fn compile(&self, source: &StyleSource) -> Result<CompiledStyle> {
        match source.extension {
            StyleExtension::Css => {
                let css = std::fs::read_to_string(&source.path)
                    .map_err(|e| read_error(&source.path, e))?;
                Ok(CompiledStyle {
                    css,
                    dependencies: Vec::new(),
                })
            }
            StyleExtension::Scss => self.compile_scss(&source.path),
        }
    }

    fn compile_scss(&self, path: &Path) -> Result<CompiledStyle> {
        if !path.is_file() {
            return Err(Error::unresolved(path, "file not found"));
        }

        let fs = ImporterFs::new(&self.resolver);
        let css = {
            let options = grass::Options::default()
                .fs(&fs)
                .load_paths(self.include_paths.as_slice())
                .quiet(self.quiet)
                .style(grass::OutputStyle::Expanded);
            grass::from_path(path, &options).map_err(|e| Error::compile(path, e.to_string()))?
        };

        let mut dependencies = fs.into_reads();
        dependencies.retain(|p| p != path);
        dependencies.dedup();
        debug!(
            "Compiled {} ({} dependencies)",
            path.display(),
            dependencies.len()
        );

        Ok(CompiledStyle { css, dependencies })
    }
}

fn read_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::unresolved(path, e.to_string())
    } else {
        Error::with_context(format!("Failed to read {}", path.display()), e)
    }
}

/// Filesystem seen by the SASS engine
#[derive(Debug)]
struct ImporterFs<'a> {
    resolver: &'a PathResolver,
    reads: Mutex<Vec<PathBuf>>,
}

impl<'a> ImporterFs<'a> {
    fn new(resolver: &'a PathResolver) -> Self {
        Self {
            resolver,
            reads: Mutex::new(Vec::new()),
        }
    }

    fn into_reads(self) -> Vec<PathBuf> {
        self.reads.into_inner().unwrap_or_default()
    }

    fn record(&self, path: &Path) {
        if let Ok(mut reads) = self.reads.lock() {
            if !reads.iter().any(|p| p == path) {
                reads.push(path.to_path_buf());
            }
        }
    }

    /// Rewrite import specifiers in `source`, a file located in `importer_dir`
    fn rewrite_imports(&self, source: &str, importer_dir: &Path) -> String {
        let (Some(import_re), Some(quoted_re)) = (IMPORT_PATTERN.as_ref(), QUOTED_PATTERN.as_ref())
        else {
            return source.to_string();
        };

        import_re
            .replace_all(source, |caps: &Captures| {
                let rule = &caps[1];
                let args = &caps[2];
                if args.contains("url(") {
                    return caps[0].to_string();
                }

                // `@use`/`@forward` take a single URL; later strings belong to `with (...)`
                let mut seen = 0usize;
                let rewritten = quoted_re.replace_all(args, |q: &Captures| {
                    seen += 1;
                    let whole = q[0].to_string();
                    if rule != "import" && seen > 1 {
                        return whole;
                    }
                    let specifier = q
                        .get(1)
                        .or_else(|| q.get(2))
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    match self.rewrite_specifier(specifier, importer_dir) {
                        Some(resolved) => format!("\"{resolved}\""),
                        None => whole,
                    }
                });
                format!("@{rule} {rewritten}")
            })
            .into_owned()
    }

    fn rewrite_specifier(&self, specifier: &str, importer_dir: &Path) -> Option<String> {
        if is_plain_css_import(specifier) || specifier.starts_with("sass:") {
            return None;
        }

        // Files next to the importer win, as with the engine's own lookup
        if find_sass_file(&importer_dir.join(specifier)).is_some() {
            return None;
        }

        let resolved = self.resolver.resolve(specifier, importer_dir);
        let file = find_sass_file(&resolved)?;
        trace!("Rewrote import {specifier:?} to {}", file.display());
        Some(file.to_string_lossy().replace('\\', "/"))
    }
}

impl grass::Fs for ImporterFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        self.record(path);

        let is_sass = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("scss") | Some("sass")
        );
        if !is_sass {
            return Ok(bytes);
        }

        let text = String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(self.rewrite_imports(&text, dir).into_bytes())
    }
}

/// Imports Sass leaves as plain CSS `@import` rules
fn is_plain_css_import(specifier: &str) -> bool {
    specifier.starts_with("http://")
        || specifier.starts_with("https://")
        || specifier.starts_with("//")
        || specifier.ends_with(".css")
}

/// Find the Sass file an import of `path` loads, probing partials and index files
fn find_sass_file(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let has_sass_ext = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("scss") | Some("sass")
    );

    let candidates = if has_sass_ext {
        vec![dir.join(name), dir.join(format!("_{name}"))]
    } else {
        vec![
            dir.join(format!("{name}.scss")),
            dir.join(format!("_{name}.scss")),
            dir.join(format!("{name}.sass")),
            dir.join(format!("_{name}.sass")),
            path.join("index.scss"),
            path.join("_index.scss"),
        ]
    };

    candidates.into_iter().find(|c| c.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylepipe_core::config::ResolverConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, content).expect("write");
        path
    }

    #[test]
    fn test_find_sass_file_partials_and_index() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        write(root, "a/_vars.scss", "$x: 1;");
        write(root, "b/index.scss", "$y: 1;");
        write(root, "c/plain.scss", "$z: 1;");

        assert_eq!(find_sass_file(&root.join("a/vars")), Some(root.join("a/_vars.scss")));
        assert_eq!(find_sass_file(&root.join("b")), Some(root.join("b/index.scss")));
        assert_eq!(
            find_sass_file(&root.join("c/plain.scss")),
            Some(root.join("c/plain.scss"))
        );
        assert_eq!(find_sass_file(&root.join("missing")), None);
    }

    #[test]
    fn test_rewrite_imports_uses_resolver_for_aliases() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let vars = write(root, "client/shared/src/vars.scss", "$red: red;");
        write(root, "client/web/local.scss", "");

        let resolver = PathResolver::new(root, &ResolverConfig::default());
        let fs = ImporterFs::new(&resolver);
        let importer_dir = root.join("client/web");

        let out = fs.rewrite_imports(
            "@import \"shared/src/vars\", './local';\n@use 'sass:math';\n@import url(\"x.css\");",
            &importer_dir,
        );

        let expected = vars.to_string_lossy().replace('\\', "/");
        assert!(out.contains(&format!("@import \"{expected}\", './local'")), "{out}");
        assert!(out.contains("@use 'sass:math'"));
        assert!(out.contains("@import url(\"x.css\")"));
    }

    #[test]
    fn test_rewrite_leaves_use_configuration_alone() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let theme = write(root, "client/wildcard/theme.scss", "$c: blue !default;");

        let resolver = PathResolver::new(root, &ResolverConfig::default());
        let fs = ImporterFs::new(&resolver);
        let out = fs.rewrite_imports(
            "@use \"wildcard/theme\" with ($c: \"wildcard/theme\");",
            &root.join("client/web"),
        );
        let expected = theme.to_string_lossy().replace('\\', "/");
        assert!(out.starts_with(&format!("@use \"{expected}\"")), "{out}");
        assert!(out.contains("with ($c: \"wildcard/theme\")"), "{out}");
    }

    #[test]
    fn test_plain_css_imports_untouched() {
        assert!(is_plain_css_import("https://fonts.example.com/a.css"));
        assert!(is_plain_css_import("//cdn/a"));
        assert!(is_plain_css_import("bootstrap/dist/bootstrap.css"));
        assert!(!is_plain_css_import("bootstrap/scss/functions"));
    }
}
