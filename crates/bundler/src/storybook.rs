//! Storybook webpack configuration
//!
//! [`finalize`] takes Storybook's default webpack configuration and adapts
//! it to the project: project loaders in front of Storybook's own style
//! rules, Storybook's CSS rule restricted to Storybook's package, and the
//! plugin set driven by [`BuildFlags`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use stylepipe_core::config::{BuildFlags, Config};
use stylepipe_core::error::{Error, Result};
use tracing::debug;

const CSS_TEST: &str = r"\.css$";
const SASS_TEST: &str = r"\.(sass|scss)$";
const SASS_MODULE_TEST: &str = r"\.module\.(sass|scss)$";
const TO_STRING_LOADER: &str = "@terminus-term/to-string-loader";

/// Rule condition: a regex source or an absolute path prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Regex(String),
    Path(PathBuf),
}

impl Condition {
    fn regex(source: &str) -> Self {
        Condition::Regex(source.to_string())
    }
}

/// One entry of a rule's loader chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseEntry {
    pub loader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl UseEntry {
    fn plain(loader: &str) -> Self {
        Self {
            loader: loader.to_string(),
            options: None,
        }
    }

    fn with_options(loader: &str, options: Value) -> Self {
        Self {
            loader: loader.to_string(),
            options: Some(options),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, rename = "use", skip_serializing_if = "Vec::is_empty")]
    pub use_entries: Vec<UseEntry>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
}

impl Rule {
    fn tests(&self, source: &str) -> bool {
        matches!(&self.test, Some(Condition::Regex(s)) if s == source)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

/// A plugin instance, identified by its constructor name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl PluginSpec {
    pub fn new(name: &str, options: Value) -> Self {
        Self {
            name: name.to_string(),
            options,
        }
    }

    fn bare(name: &str) -> Self {
        Self::new(name, Value::Null)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    #[serde(default)]
    pub minimize: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub minimizer: Vec<PluginSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub cache_type: String,
    pub build_dependencies: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebpackConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<PluginSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<Optimization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    /// Set when the speed-measure plugin wraps the configuration
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub speed_measured: bool,
}

impl WebpackConfig {
    /// Shape of the default configuration Storybook hands to `webpackFinal`
    pub fn storybook_default() -> Self {
        Self {
            mode: Some("development".to_string()),
            stats: None,
            module: Some(ModuleConfig {
                rules: Some(vec![
                    Rule {
                        test: Some(Condition::regex(r"\.(mjs|tsx?|jsx?)$")),
                        loader: Some("babel-loader".to_string()),
                        ..Rule::default()
                    },
                    Rule {
                        test: Some(Condition::regex(CSS_TEST)),
                        use_entries: vec![
                            UseEntry::plain("style-loader"),
                            UseEntry::with_options("css-loader", json!({ "importLoaders": 1 })),
                        ],
                        ..Rule::default()
                    },
                    Rule {
                        test: Some(Condition::regex(
                            r"\.(svg|ico|jpg|jpeg|png|apng|gif|eot|otf|webp|ttf|woff|woff2|cur|ani|pdf)(\?.*)?$",
                        )),
                        rule_type: Some("asset/resource".to_string()),
                        ..Rule::default()
                    },
                ]),
            }),
            plugins: Some(vec![
                PluginSpec::bare("HtmlWebpackPlugin"),
                PluginSpec::bare("CaseSensitivePathsPlugin"),
                PluginSpec::bare("ProgressPlugin"),
                PluginSpec::bare("DefinePlugin"),
            ]),
            optimization: Some(Optimization::default()),
            cache: None,
            speed_measured: false,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        self.module
            .as_ref()
            .and_then(|m| m.rules.as_deref())
            .unwrap_or_default()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins
            .as_ref()
            .is_some_and(|plugins| plugins.iter().any(|p| p.name == name))
    }
}

/// Paths `finalize` anchors rules and cache dependencies at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOptions {
    pub root: PathBuf,
    pub node_modules: PathBuf,
    pub storybook_workspace: PathBuf,
    /// Storybook was asked for a stats JSON, which the DLL bundle cannot provide
    pub webpack_stats_json: bool,
    pub include_paths: Vec<PathBuf>,
}

impl FinalizeOptions {
    pub fn from_config(config: &Config, root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            node_modules: root.join(&config.resolver.node_modules_dir),
            storybook_workspace: root.join(&config.resolver.client_dir).join("storybook"),
            webpack_stats_json: false,
            include_paths: config.sass.include_paths.iter().map(|p| root.join(p)).collect(),
        }
    }

    fn storybook_path(&self) -> PathBuf {
        self.node_modules.join("@storybook")
    }

    fn monaco_path(&self) -> PathBuf {
        self.node_modules.join("monaco-editor")
    }

    fn dll_manifest(&self) -> PathBuf {
        self.storybook_workspace.join("assets/dll-bundle/dll-manifest.json")
    }
}

/// Adapt Storybook's default webpack configuration to the project
pub fn finalize(
    mut config: WebpackConfig,
    flags: &BuildFlags,
    options: &FinalizeOptions,
) -> Result<WebpackConfig> {
    let mode = flags.mode();
    config.stats = Some("errors-warnings".to_string());
    config.mode = Some(mode.to_string());

    let (Some(mut rules), Some(mut plugins)) = (
        config.module.as_mut().and_then(|m| m.rules.take()),
        config.plugins.take(),
    ) else {
        return Err(Error::config(
            "The format of the default Storybook webpack config changed: expected module.rules and plugins",
        ));
    };

    let mode_json = Value::String(mode.to_string()).to_string();
    plugins.push(PluginSpec::new(
        "DefinePlugin",
        json!({ "NODE_ENV": mode_json, "process.env.NODE_ENV": mode_json }),
    ));
    plugins.push(PluginSpec::new(
        "ProvidePlugin",
        json!({ "process": "process/browser", "Buffer": ["buffer", "Buffer"] }),
    ));

    if flags.minify {
        let optimization = config.optimization.as_mut().ok_or_else(|| {
            Error::config("The structure of the config changed: expected optimization to be set")
        })?;
        optimization.minimize = true;
        optimization.minimizer = vec![PluginSpec::new(
            "TerserPlugin",
            json!({ "terserOptions": { "compress": { "inline": 1 } } }),
        )];
    } else {
        config.cache = Some(CacheConfig {
            cache_type: "filesystem".to_string(),
            build_dependencies: vec![
                options.storybook_workspace.join("src/main.ts"),
                options.storybook_workspace.join("babel.config.js"),
                options.root.join("babel.config.js"),
                options.root.join("postcss.config.js"),
                options.storybook_workspace.join("src/webpack.config.dll.ts"),
            ],
        });
    }

    if !rules.is_empty() {
        rules.remove(0);
    }
    rules.insert(
        0,
        Rule {
            test: Some(Condition::regex(r"\.tsx?$")),
            loader: Some("babel-loader".to_string()),
            options: Some(json!({
                "cacheDirectory": true,
                "configFile": options.root.join("babel.config.js"),
            })),
            ..Rule::default()
        },
    );

    let storybook_path = options.storybook_path();
    let monaco_path = options.monaco_path();

    rules.insert(
        0,
        Rule {
            test: Some(Condition::regex(SASS_TEST)),
            exclude: vec![
                Condition::regex(SASS_MODULE_TEST),
                Condition::Path(storybook_path.clone()),
            ],
            use_entries: css_loaders(TO_STRING_LOADER, basic_css_loader(), options),
            ..Rule::default()
        },
    );
    rules.insert(
        0,
        Rule {
            test: Some(Condition::regex(SASS_TEST)),
            include: vec![Condition::regex(SASS_MODULE_TEST)],
            exclude: vec![Condition::Path(storybook_path.clone())],
            use_entries: css_loaders(
                "style-loader",
                UseEntry::with_options(
                    "css-loader",
                    json!({
                        "sourceMap": !flags.minify,
                        "modules": {
                            "exportLocalsConvention": "camelCase",
                            "localIdentName": "[name]__[local]_[hash:base64:5]",
                        },
                        "url": false,
                    }),
                ),
                options,
            ),
            ..Rule::default()
        },
    );

    let css_rule = rules
        .iter_mut()
        .find(|rule| rule.tests(CSS_TEST))
        .ok_or_else(|| Error::config("Cannot find original CSS rule"))?;
    css_rule.include = vec![Condition::Path(storybook_path.clone())];

    rules.push(Rule {
        test: Some(Condition::regex(CSS_TEST)),
        exclude: vec![
            Condition::Path(storybook_path),
            Condition::Path(monaco_path.clone()),
        ],
        use_entries: vec![UseEntry::plain(TO_STRING_LOADER), basic_css_loader()],
        ..Rule::default()
    });
    rules.push(Rule {
        test: Some(Condition::regex(r"\.ya?ml$")),
        rule_type: Some("asset/source".to_string()),
        ..Rule::default()
    });

    plugins.retain(|p| p.name != "CaseSensitivePathsPlugin");
    if !flags.progress {
        plugins.retain(|p| p.name != "ProgressPlugin");
    }

    if flags.dll_plugin && !options.webpack_stats_json {
        plugins.insert(
            0,
            PluginSpec::new(
                "DllReferencePlugin",
                json!({ "context": options.root, "manifest": options.dll_manifest() }),
            ),
        );
    } else {
        plugins.push(PluginSpec::new(
            "MonacoWebpackPlugin",
            json!({ "languages": ["json"] }),
        ));
        rules.push(Rule {
            test: Some(Condition::regex(CSS_TEST)),
            include: vec![Condition::Path(monaco_path.clone())],
            use_entries: vec![UseEntry::plain("style-loader"), basic_css_loader()],
            ..Rule::default()
        });
        rules.push(Rule {
            test: Some(Condition::regex(r"\.ttf$")),
            include: vec![Condition::Path(monaco_path)],
            rule_type: Some("asset/resource".to_string()),
            ..Rule::default()
        });
    }

    if flags.bundle_analyzer {
        plugins.push(PluginSpec::bare("BundleAnalyzerPlugin"));
    }

    if flags.speed_analyzer {
        plugins.push(PluginSpec::new(
            "SpeedMeasurePlugin",
            json!({ "outputFormat": "human" }),
        ));
        config.speed_measured = true;
    }

    debug!(
        "Finalized Storybook config: {} rules, {} plugins, mode {mode}",
        rules.len(),
        plugins.len()
    );

    config.module = Some(ModuleConfig { rules: Some(rules) });
    config.plugins = Some(plugins);
    Ok(config)
}

fn basic_css_loader() -> UseEntry {
    UseEntry::with_options("css-loader", json!({ "url": false }))
}

/// `[first, css loader, postcss-loader, sass-loader]`
fn css_loaders(first: &str, css_loader: UseEntry, options: &FinalizeOptions) -> Vec<UseEntry> {
    vec![
        UseEntry::plain(first),
        css_loader,
        UseEntry::plain("postcss-loader"),
        UseEntry::with_options(
            "sass-loader",
            json!({ "sassOptions": { "includePaths": options.include_paths } }),
        ),
    ]
}
