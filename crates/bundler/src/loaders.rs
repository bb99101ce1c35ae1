//! Static loader table and bundler build options

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stylepipe_core::config::Config;

/// How the bundler interprets a module's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    Js,
    Jsx,
    Ts,
    Tsx,
    Css,
    Text,
    #[serde(rename = "dataurl")]
    DataUrl,
}

impl Loader {
    pub fn as_str(&self) -> &'static str {
        match self {
            Loader::Js => "js",
            Loader::Jsx => "jsx",
            Loader::Ts => "ts",
            Loader::Tsx => "tsx",
            Loader::Css => "css",
            Loader::Text => "text",
            Loader::DataUrl => "dataurl",
        }
    }

    /// Whether contents are script the bundler parses for imports
    pub fn is_script(&self) -> bool {
        matches!(self, Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx)
    }
}

/// File extension (with leading dot) -> loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderTable {
    overrides: BTreeMap<String, Loader>,
}

const BUILTIN_LOADERS: &[(&str, Loader)] = &[
    (".js", Loader::Js),
    (".mjs", Loader::Js),
    (".cjs", Loader::Js),
    (".jsx", Loader::Jsx),
    (".ts", Loader::Ts),
    (".tsx", Loader::Tsx),
    (".json", Loader::Text),
];

impl Default for LoaderTable {
    fn default() -> Self {
        let overrides = [
            (".yaml", Loader::Text),
            (".ttf", Loader::DataUrl),
            (".png", Loader::DataUrl),
            (".css", Loader::Css),
        ]
        .into_iter()
        .map(|(ext, loader)| (ext.to_string(), loader))
        .collect();
        Self { overrides }
    }
}

impl LoaderTable {
    /// Project overrides, without the bundler's built-in script loaders
    pub fn overrides(&self) -> &BTreeMap<String, Loader> {
        &self.overrides
    }

    /// Loader for `path`, by its extension
    pub fn loader_for(&self, path: &Path) -> Option<Loader> {
        let ext = format!(".{}", path.extension()?.to_str()?);
        self.overrides.get(&ext).copied().or_else(|| {
            BUILTIN_LOADERS
                .iter()
                .find(|(builtin, _)| *builtin == ext)
                .map(|(_, loader)| *loader)
        })
    }

    /// MIME type used when a file is inlined as a data URL
    pub fn mime_type(path: &Path) -> &'static str {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ttf") => "font/ttf",
            Some("png") => "image/png",
            Some("css") => "text/css",
            Some("yaml") | Some("yml") => "text/yaml",
            _ => "application/octet-stream",
        }
    }
}

/// esbuild build options for the web app bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub entry_points: Vec<PathBuf>,
    pub bundle: bool,
    pub format: String,
    pub outdir: PathBuf,
    pub log_level: String,
    pub splitting: bool,
    pub sourcemap: bool,
    pub target: String,
    pub define: BTreeMap<String, String>,
    pub loader: BTreeMap<String, Loader>,
}

impl BuildOptions {
    pub fn new(config: &Config, entry_points: Vec<PathBuf>) -> Self {
        let flags = &config.flags;

        let mut define = BTreeMap::new();
        define.insert(
            "process.env.NODE_ENV".to_string(),
            json_string(flags.mode()),
        );
        define.insert("global".to_string(), "window".to_string());
        define.insert(
            "process.env.SOURCEGRAPH_API_URL".to_string(),
            match &flags.api_url {
                Some(url) => json_string(url),
                None => "undefined".to_string(),
            },
        );

        Self {
            entry_points,
            bundle: true,
            format: "esm".to_string(),
            outdir: PathBuf::from(&config.artifacts.out_dir),
            log_level: "error".to_string(),
            splitting: true,
            sourcemap: true,
            target: "es2020".to_string(),
            define,
            loader: LoaderTable::default().overrides().clone(),
        }
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_loader_table_defaults() {
        let table = LoaderTable::default();
        assert_eq!(table.loader_for(Path::new("a/b.yaml")), Some(Loader::Text));
        assert_eq!(table.loader_for(Path::new("codicon.ttf")), Some(Loader::DataUrl));
        assert_eq!(table.loader_for(Path::new("logo.png")), Some(Loader::DataUrl));
        assert_eq!(table.loader_for(Path::new("x.css")), Some(Loader::Css));
        assert_eq!(table.loader_for(Path::new("main.tsx")), Some(Loader::Tsx));
        assert_eq!(table.loader_for(Path::new("x.scss")), None);
        assert_eq!(table.loader_for(Path::new("Makefile")), None);
    }

    #[test]
    fn test_build_options_shape() {
        let mut config = Config::default();
        config.flags.api_url = Some("https://sourcegraph.test".to_string());
        let options = BuildOptions::new(&config, vec![PathBuf::from("client/web/src/main.tsx")]);

        let json = serde_json::to_value(&options).expect("serialize");
        assert_eq!(json["bundle"], true);
        assert_eq!(json["format"], "esm");
        assert_eq!(json["splitting"], true);
        assert_eq!(json["target"], "es2020");
        assert_eq!(json["outdir"], "ui/assets/esbuild");
        assert_eq!(json["loader"][".ttf"], "dataurl");
        assert_eq!(json["define"]["global"], "window");
        assert_eq!(json["define"]["process.env.NODE_ENV"], "\"development\"");
        assert_eq!(
            json["define"]["process.env.SOURCEGRAPH_API_URL"],
            "\"https://sourcegraph.test\""
        );
    }

    #[test]
    fn test_minify_selects_production_mode() {
        let mut config = Config::default();
        config.flags.minify = true;
        let options = BuildOptions::new(&config, vec![]);
        assert_eq!(options.define["process.env.NODE_ENV"], "\"production\"");
        assert_eq!(options.define["process.env.SOURCEGRAPH_API_URL"], "undefined");
    }
}
