//! Typed plugin host
//!
//! Hooks are registered with a [`HookFilter`] and tried in registration
//! order; the first hook returning `Some` wins. A load hook may hand the
//! module to another namespace ([`LoadResult::Redirect`]), in which case
//! loading continues there until some hook produces contents.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use stylepipe_core::error::{Error, Result};
use stylepipe_core::PathResolver;
use tracing::{debug, trace};

use crate::loaders::{Loader, LoaderTable};
use crate::FILE_NAMESPACE;

/// Upper bound on namespace redirects for a single import
const MAX_REDIRECTS: usize = 8;

static SIDE_EFFECT_IMPORT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+("(?:[^"\\]|\\.)*")"#).ok());

/// How a module was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    EntryPoint,
    ImportStatement,
}

/// Data a resolve hook attaches for later hooks of the same module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
    pub original_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveArgs {
    pub path: String,
    pub importer: Option<String>,
    /// Namespace of the importer; empty for entry points
    pub namespace: String,
    pub resolve_dir: PathBuf,
    pub kind: ImportKind,
    pub plugin_data: Option<PluginData>,
}

impl ResolveArgs {
    /// Arguments for an entry point, resolved against `resolve_dir`
    pub fn entry_point(path: impl Into<String>, resolve_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            importer: None,
            namespace: String::new(),
            resolve_dir: resolve_dir.into(),
            kind: ImportKind::EntryPoint,
            plugin_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResult {
    pub path: String,
    pub namespace: String,
    pub loader: Option<Loader>,
    pub plugin_data: Option<PluginData>,
    pub watch_files: Vec<PathBuf>,
}

impl ResolveResult {
    pub fn new(path: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.into(),
            loader: None,
            plugin_data: None,
            watch_files: Vec::new(),
        }
    }

    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_plugin_data(mut self, data: PluginData) -> Self {
        self.plugin_data = Some(data);
        self
    }

    pub fn with_watch_files(mut self, files: Vec<PathBuf>) -> Self {
        self.watch_files = files;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadArgs {
    pub path: String,
    pub namespace: String,
    pub loader: Option<Loader>,
    pub plugin_data: Option<PluginData>,
}

impl From<&ResolveResult> for LoadArgs {
    fn from(resolved: &ResolveResult) -> Self {
        Self {
            path: resolved.path.clone(),
            namespace: resolved.namespace.clone(),
            loader: resolved.loader,
            plugin_data: resolved.plugin_data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContents {
    pub contents: String,
    pub loader: Loader,
    pub resolve_dir: Option<PathBuf>,
    pub watch_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Contents(LoadedContents),
    /// Continue loading at another path or namespace
    Redirect(ResolveResult),
}

/// Module produced by running an import through the resolve and load hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub path: String,
    pub namespace: String,
    pub loader: Loader,
    pub contents: String,
    pub resolve_dir: PathBuf,
    pub watch_files: Vec<PathBuf>,
}

#[async_trait]
pub trait ResolveHook: Send + Sync {
    /// Resolve an import, or return `None` to let later hooks try
    async fn resolve(&self, args: &ResolveArgs) -> Result<Option<ResolveResult>>;
}

#[async_trait]
pub trait LoadHook: Send + Sync {
    /// Load a module, or return `None` to let later hooks try
    async fn load(&self, args: &LoadArgs) -> Result<Option<LoadResult>>;
}

/// Path pattern plus optional namespace a hook applies to
#[derive(Debug, Clone)]
pub struct HookFilter {
    pub pattern: Regex,
    /// `None` matches every namespace
    pub namespace: Option<String>,
}

impl HookFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::hook(format!("Invalid hook filter '{pattern}': {e}")))?;
        Ok(Self {
            pattern,
            namespace: None,
        })
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn matches(&self, path: &str, namespace: &str) -> bool {
        let namespace_ok = match &self.namespace {
            Some(ns) => ns == namespace,
            None => true,
        };
        namespace_ok && self.pattern.is_match(path)
    }
}

/// Registry and dispatcher for resolve and load hooks
pub struct PluginHost {
    resolver: PathResolver,
    loaders: LoaderTable,
    resolve_hooks: Vec<(HookFilter, Arc<dyn ResolveHook>)>,
    load_hooks: Vec<(HookFilter, Arc<dyn LoadHook>)>,
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("resolve_hooks", &self.resolve_hooks.len())
            .field("load_hooks", &self.load_hooks.len())
            .finish()
    }
}

impl PluginHost {
    pub fn new(resolver: PathResolver, loaders: LoaderTable) -> Self {
        Self {
            resolver,
            loaders,
            resolve_hooks: Vec::new(),
            load_hooks: Vec::new(),
        }
    }

    pub fn on_resolve(&mut self, filter: HookFilter, hook: Arc<dyn ResolveHook>) {
        self.resolve_hooks.push((filter, hook));
    }

    pub fn on_load(&mut self, filter: HookFilter, hook: Arc<dyn LoadHook>) {
        self.load_hooks.push((filter, hook));
    }

    /// Register a plugin's hooks
    pub fn register(&mut self, plugin: &dyn crate::Plugin) -> Result<()> {
        plugin.setup(self)?;
        debug!(
            "Registered plugin '{}' ({} resolve, {} load hooks total)",
            plugin.name(),
            self.resolve_hooks.len(),
            self.load_hooks.len()
        );
        Ok(())
    }

    /// Run resolve hooks, falling back to path resolution in the `file` namespace
    pub async fn resolve(&self, args: &ResolveArgs) -> Result<ResolveResult> {
        for (filter, hook) in &self.resolve_hooks {
            if !filter.matches(&args.path, &args.namespace) {
                continue;
            }
            if let Some(result) = hook.resolve(args).await? {
                trace!("Resolved {:?} -> {}:{}", args.path, result.namespace, result.path);
                return Ok(result);
            }
        }

        if args.path.starts_with("data:") {
            return Ok(ResolveResult::new(args.path.clone(), "dataurl"));
        }

        let resolved = self.resolver.resolve(&args.path, &args.resolve_dir);
        Ok(ResolveResult::new(
            resolved.to_string_lossy().into_owned(),
            FILE_NAMESPACE,
        ))
    }

    /// Run load hooks, falling back to reading `file` namespace modules from disk
    pub async fn load(&self, args: &LoadArgs) -> Result<LoadResult> {
        for (filter, hook) in &self.load_hooks {
            if !filter.matches(&args.path, &args.namespace) {
                continue;
            }
            if let Some(result) = hook.load(args).await? {
                return Ok(result);
            }
        }

        if args.namespace != FILE_NAMESPACE {
            return Err(Error::hook(format!(
                "No load hook for {}:{}",
                args.namespace, args.path
            )));
        }
        self.load_file(args).await.map(LoadResult::Contents)
    }

    /// Resolve and load one import, following namespace redirects
    pub async fn process_import(&self, args: &ResolveArgs) -> Result<ModuleRecord> {
        let resolved = self.resolve(args).await?;
        self.load_resolved(resolved).await
    }

    /// Load an already resolved import, following namespace redirects
    async fn load_resolved(&self, resolved: ResolveResult) -> Result<ModuleRecord> {
        let mut current = resolved;
        let mut watch_files = current.watch_files.clone();

        for _ in 0..MAX_REDIRECTS {
            match self.load(&LoadArgs::from(&current)).await? {
                LoadResult::Contents(loaded) => {
                    for file in loaded.watch_files {
                        push_unique(&mut watch_files, file);
                    }
                    let resolve_dir = loaded.resolve_dir.unwrap_or_else(|| {
                        Path::new(&current.path)
                            .parent()
                            .map(Path::to_path_buf)
                            .unwrap_or_default()
                    });
                    return Ok(ModuleRecord {
                        path: current.path,
                        namespace: current.namespace,
                        loader: loaded.loader,
                        contents: loaded.contents,
                        resolve_dir,
                        watch_files,
                    });
                }
                LoadResult::Redirect(next) => {
                    trace!(
                        "Redirect {}:{} -> {}:{}",
                        current.namespace,
                        current.path,
                        next.namespace,
                        next.path
                    );
                    for file in &next.watch_files {
                        push_unique(&mut watch_files, file.clone());
                    }
                    current = next;
                }
            }
        }

        Err(Error::hook(format!(
            "Too many namespace redirects while loading {:?}",
            current.path
        )))
    }

    /// Process `entries` and every side-effect import of plugin-produced script modules
    pub async fn collect(&self, entries: &[ResolveArgs]) -> Result<Vec<ModuleRecord>> {
        let mut queue: VecDeque<ResolveArgs> = entries.iter().cloned().collect();
        let mut seen = HashSet::new();
        let mut modules = Vec::new();

        while let Some(args) = queue.pop_front() {
            let resolved = self.resolve(&args).await?;
            if !seen.insert((resolved.namespace.clone(), resolved.path.clone())) {
                trace!("Already collected {}:{}", resolved.namespace, resolved.path);
                continue;
            }
            let record = self.load_resolved(resolved).await?;

            if record.loader.is_script() && record.namespace != FILE_NAMESPACE {
                for specifier in side_effect_imports(&record.contents) {
                    queue.push_back(ResolveArgs {
                        path: specifier,
                        importer: Some(record.path.clone()),
                        namespace: record.namespace.clone(),
                        resolve_dir: record.resolve_dir.clone(),
                        kind: ImportKind::ImportStatement,
                        plugin_data: None,
                    });
                }
            }
            modules.push(record);
        }

        Ok(modules)
    }

    async fn load_file(&self, args: &LoadArgs) -> Result<LoadedContents> {
        let path = PathBuf::from(&args.path);
        let loader = args
            .loader
            .or_else(|| self.loaders.loader_for(&path))
            .ok_or_else(|| Error::hook(format!("No loader configured for {}", path.display())))?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::unresolved(&path, e.to_string())
            } else {
                Error::with_context(format!("Failed to read {}", path.display()), e)
            }
        })?;

        let contents = if loader == Loader::DataUrl {
            format!(
                "data:{},{}",
                LoaderTable::mime_type(&path),
                utf8_percent_encode_bytes(&bytes)
            )
        } else {
            String::from_utf8(bytes)
                .map_err(|e| Error::hook(format!("{} is not UTF-8: {e}", path.display())))?
        };

        Ok(LoadedContents {
            contents,
            loader,
            resolve_dir: path.parent().map(Path::to_path_buf),
            watch_files: vec![path],
        })
    }
}

fn utf8_percent_encode_bytes(bytes: &[u8]) -> String {
    percent_encoding::percent_encode(bytes, NON_ALPHANUMERIC).to_string()
}

/// Percent-encode text for a `data:` URL
pub fn encode_data_url_text(text: &str) -> String {
    utf8_percent_encode(text, NON_ALPHANUMERIC).to_string()
}

/// Specifiers of `import "..."` statements in script `contents`
pub fn side_effect_imports(contents: &str) -> Vec<String> {
    let Some(re) = SIDE_EFFECT_IMPORT.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(contents)
        .filter_map(|caps| serde_json::from_str::<String>(&caps[1]).ok())
        .collect()
}

fn push_unique(files: &mut Vec<PathBuf>, file: PathBuf) {
    if !files.contains(&file) {
        files.push(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stylepipe_core::config::ResolverConfig;

    struct Fixed(&'static str, &'static str);

    #[async_trait]
    impl ResolveHook for Fixed {
        async fn resolve(&self, _args: &ResolveArgs) -> Result<Option<ResolveResult>> {
            Ok(Some(ResolveResult::new(self.0, self.1)))
        }
    }

    struct Declines(AtomicUsize);

    #[async_trait]
    impl ResolveHook for Declines {
        async fn resolve(&self, _args: &ResolveArgs) -> Result<Option<ResolveResult>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct Bouncer;

    #[async_trait]
    impl LoadHook for Bouncer {
        async fn load(&self, args: &LoadArgs) -> Result<Option<LoadResult>> {
            Ok(Some(LoadResult::Redirect(ResolveResult::new(
                args.path.clone(),
                "loop",
            ))))
        }
    }

    struct CountingLoad(AtomicUsize);

    #[async_trait]
    impl LoadHook for CountingLoad {
        async fn load(&self, _args: &LoadArgs) -> Result<Option<LoadResult>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(LoadResult::Contents(LoadedContents {
                contents: ".a {}".to_string(),
                loader: Loader::Css,
                resolve_dir: None,
                watch_files: Vec::new(),
            })))
        }
    }

    fn host() -> PluginHost {
        PluginHost::new(
            PathResolver::new("/repo", &ResolverConfig::default()),
            LoaderTable::default(),
        )
    }

    #[test]
    fn test_filter_namespace_matching() {
        let any = HookFilter::new(r"\.s?css$").expect("filter");
        assert!(any.matches("a.scss", "file"));
        assert!(any.matches("a.css", ""));
        assert!(!any.matches("a.tsx", "file"));

        let scoped = HookFilter::new("^x:").expect("filter").in_namespace("postcss-module");
        assert!(scoped.matches("x:/tmp/a.css", "postcss-module"));
        assert!(!scoped.matches("x:/tmp/a.css", "file"));
    }

    #[test]
    fn test_invalid_filter_is_hook_error() {
        assert!(matches!(HookFilter::new("(").unwrap_err(), Error::Hook(_)));
    }

    #[tokio::test]
    async fn test_first_matching_hook_wins() {
        let mut host = host();
        let declines = Arc::new(Declines(AtomicUsize::new(0)));
        host.on_resolve(HookFilter::new(".").expect("filter"), declines.clone());
        host.on_resolve(HookFilter::new(".").expect("filter"), Arc::new(Fixed("/a", "one")));
        host.on_resolve(HookFilter::new(".").expect("filter"), Arc::new(Fixed("/b", "two")));

        let result = host
            .resolve(&ResolveArgs::entry_point("./x", "/repo"))
            .await
            .expect("resolve");
        assert_eq!(result.path, "/a");
        assert_eq!(result.namespace, "one");
        assert_eq!(declines.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_resolution_uses_path_resolver() {
        let host = host();
        let result = host
            .resolve(&ResolveArgs::entry_point("wildcard/src/a.ts", "/repo/client/web"))
            .await
            .expect("resolve");
        assert_eq!(result.path, "/repo/client/wildcard/src/a.ts");
        assert_eq!(result.namespace, FILE_NAMESPACE);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let mut host = host();
        host.on_load(HookFilter::new(".").expect("filter"), Arc::new(Bouncer));
        let err = host
            .process_import(&ResolveArgs::entry_point("/repo/a.txt", "/repo"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Too many namespace redirects"), "{err}");
    }

    #[tokio::test]
    async fn test_unknown_namespace_without_hook_fails() {
        let mut host = host();
        host.on_resolve(
            HookFilter::new(".").expect("filter"),
            Arc::new(Fixed("/a.css", "nowhere")),
        );
        let err = host
            .process_import(&ResolveArgs::entry_point("a.css", "/repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Hook(_)), "{err}");
    }

    #[tokio::test]
    async fn test_file_loading_uses_loader_table() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let yaml = dir.path().join("a.yaml");
        let png = dir.path().join("b.png");
        std::fs::write(&yaml, "key: value\n").expect("write");
        std::fs::write(&png, [0x89u8, b'P', b'N', b'G']).expect("write");

        let host = host();
        let text = host
            .process_import(&ResolveArgs::entry_point(yaml.to_string_lossy(), dir.path()))
            .await
            .expect("yaml");
        assert_eq!(text.loader, Loader::Text);
        assert_eq!(text.contents, "key: value\n");
        assert_eq!(text.watch_files, vec![yaml.clone()]);

        let image = host
            .process_import(&ResolveArgs::entry_point(png.to_string_lossy(), dir.path()))
            .await
            .expect("png");
        assert_eq!(image.loader, Loader::DataUrl);
        assert_eq!(image.contents, "data:image/png,%89PNG");
    }

    #[tokio::test]
    async fn test_collect_loads_each_resolved_module_once() {
        let mut host = host();
        let loads = Arc::new(CountingLoad(AtomicUsize::new(0)));
        host.on_resolve(
            HookFilter::new(".").expect("filter"),
            Arc::new(Fixed("/repo/a.scss", "virtual")),
        );
        host.on_load(
            HookFilter::new(".").expect("filter").in_namespace("virtual"),
            loads.clone(),
        );

        let entry = ResolveArgs::entry_point("./a.scss", "/repo");
        let modules = host
            .collect(&[entry.clone(), entry])
            .await
            .expect("collect");

        assert_eq!(modules.len(), 1);
        assert_eq!(loads.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_unresolved() {
        let host = host();
        let err = host
            .process_import(&ResolveArgs::entry_point("/repo/missing.css", "/repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedSpecifier { .. }), "{err}");
    }

    #[test]
    fn test_side_effect_imports() {
        let contents = "import \"x:/tmp/a b.css\"\nexport default {}\n  import \"./c.css\"\nconst s = 'import \"no\"'";
        assert_eq!(
            side_effect_imports(contents),
            vec!["x:/tmp/a b.css".to_string(), "./c.css".to_string()]
        );
    }

    #[test]
    fn test_encode_data_url_text() {
        assert_eq!(encode_data_url_text(".a{x:1}"), "%2Ea%7Bx%3A1%7D");
    }
}
