//! PostCSS transform stage
//!
//! The chain is fixed: parse, prefix/lower for the configured browser
//! targets, then print. Module sources additionally get CSS Modules class
//! name scoping, and the export table of that pass is the class name map.

use lightningcss::css_modules::{self, CssModuleExports, CssModuleReference, Pattern};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::path::{Path, PathBuf};
use stylepipe_core::config::{ClassNameConvention, PostcssConfig};
use stylepipe_core::error::{Error, Result};
use tracing::debug;

use crate::module_map::ClassNameMap;
use crate::source::StyleSource;

/// Result of one transform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub css: String,
    /// Present only for module sources
    pub class_map: Option<ClassNameMap>,
}

/// The fixed PostCSS plugin chain
#[derive(Debug)]
pub struct TransformStage {
    targets: Targets,
    scoped_name_pattern: String,
    convention: ClassNameConvention,
    minify: bool,
    repo_root: PathBuf,
}

impl TransformStage {
    /// Build the chain from configuration
    pub fn new(config: &PostcssConfig, repo_root: &Path) -> Result<Self> {
        let targets = if config.browserslist.is_empty() {
            Targets::default()
        } else {
            let browsers = Browsers::from_browserslist(config.browserslist.iter())
                .map_err(|e| Error::config(format!("Invalid browserslist query: {e}")))?;
            Targets::from(browsers)
        };

        Pattern::parse(&config.scoped_name_pattern).map_err(|e| {
            Error::config(format!(
                "Invalid scoped name pattern '{}': {e:?}",
                config.scoped_name_pattern
            ))
        })?;

        Ok(Self {
            targets,
            scoped_name_pattern: config.scoped_name_pattern.clone(),
            convention: config.class_name_convention,
            minify: config.minify,
            repo_root: repo_root.to_path_buf(),
        })
    }

    /// Run the chain over `css`, compiled from `source`
    pub fn transform(&self, css: &str, source: &StyleSource) -> Result<TransformOutput> {
        let path = &source.path;

        let css_modules = if source.is_module {
            let pattern = Pattern::parse(&self.scoped_name_pattern)
                .map_err(|e| Error::transform(path, format!("{e:?}")))?;
            Some(css_modules::Config {
                pattern,
                dashed_idents: false,
                ..Default::default()
            })
        } else {
            None
        };

        let options = ParserOptions {
            filename: self.scoping_filename(path),
            css_modules,
            ..ParserOptions::default()
        };

        let mut sheet =
            StyleSheet::parse(css, options).map_err(|e| Error::transform(path, e.to_string()))?;

        sheet
            .minify(MinifyOptions {
                targets: self.targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| Error::transform(path, e.to_string()))?;

        let printed = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                targets: self.targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| Error::transform(path, e.to_string()))?;

        let class_map = if source.is_module {
            let map = self.class_map(printed.exports.unwrap_or_default());
            debug!("Scoped {} class names in {}", map.len(), path.display());
            Some(map)
        } else {
            None
        };

        Ok(TransformOutput {
            css: printed.code,
            class_map,
        })
    }

    /// Name the scoping pass sees: repository-relative, with the stem's dots
    /// replaced so `[name]` is a valid identifier (`button.module` -> `button-module`)
    fn scoping_filename(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.repo_root).unwrap_or(path);
        let stem = rel
            .file_stem()
            .map(|s| s.to_string_lossy().replace('.', "-"))
            .unwrap_or_default();
        let file = match rel.extension() {
            Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
            None => stem,
        };
        let dir = rel.parent().unwrap_or_else(|| Path::new(""));
        dir.join(file).to_string_lossy().replace('\\', "/")
    }

    fn class_map(&self, exports: CssModuleExports) -> ClassNameMap {
        let mut map = ClassNameMap::new();
        for (local, export) in exports {
            let mut value = export.name;
            for reference in export.composes {
                let composed = match reference {
                    CssModuleReference::Local { name } => name,
                    CssModuleReference::Global { name } => name,
                    CssModuleReference::Dependency { name, .. } => name,
                };
                value.push(' ');
                value.push_str(&composed);
            }

            match self.convention {
                ClassNameConvention::AsIs => {
                    map.insert(local, value);
                }
                ClassNameConvention::CamelCaseOnly => {
                    map.insert(camel_case(&local), value);
                }
                ClassNameConvention::CamelCase => {
                    let camel = camel_case(&local);
                    if camel != local {
                        map.insert(camel, value.clone());
                    }
                    map.insert(local, value);
                }
            }
        }
        map
    }
}

/// `primary-button` / `primary_button` -> `primaryButton`
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name
        .split(['-', '_'])
        .filter(|p| !p.is_empty())
        .enumerate()
    {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage(convention: ClassNameConvention) -> TransformStage {
        let config = PostcssConfig {
            class_name_convention: convention,
            ..PostcssConfig::default()
        };
        TransformStage::new(&config, Path::new("/repo")).expect("stage")
    }

    fn module(path: &str) -> StyleSource {
        StyleSource::from_path(path).expect("source")
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("primary"), "primary");
        assert_eq!(camel_case("primary-button"), "primaryButton");
        assert_eq!(camel_case("btn--large"), "btnLarge");
        assert_eq!(camel_case("is_active"), "isActive");
        assert_eq!(camel_case("-leading"), "leading");
    }

    #[test]
    fn test_scoping_filename() {
        let stage = stage(ClassNameConvention::CamelCase);
        assert_eq!(
            stage.scoping_filename(Path::new("/repo/client/web/button.module.scss")),
            "client/web/button-module.scss"
        );
        assert_eq!(
            stage.scoping_filename(Path::new("/outside/a.module.css")),
            "/outside/a-module.css"
        );
    }

    #[test]
    fn test_plain_source_has_no_class_map() {
        let stage = stage(ClassNameConvention::CamelCase);
        let out = stage
            .transform(".a { color: red; }", &module("/repo/client/a.css"))
            .expect("transform");
        assert!(out.class_map.is_none());
        assert!(out.css.contains(".a"));
        assert!(out.css.contains("color: red"));
    }

    #[test]
    fn test_module_class_names_are_scoped() {
        let stage = stage(ClassNameConvention::CamelCase);
        let out = stage
            .transform(
                ".primary { color: red; }\n.icon-button { color: blue; }",
                &module("/repo/client/button.module.scss"),
            )
            .expect("transform");

        let map = out.class_map.expect("class map");
        let primary = map.get("primary").expect("primary");
        assert!(primary.starts_with("button-module__primary___"), "{primary}");
        assert!(out.css.contains(&format!(".{primary}")));

        let scoped = map.get("icon-button").expect("original key");
        assert_eq!(map.get("iconButton"), Some(scoped));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_camel_case_only_drops_original_keys() {
        let stage = stage(ClassNameConvention::CamelCaseOnly);
        let out = stage
            .transform(".icon-button { color: blue; }", &module("/repo/b.module.css"))
            .expect("transform");
        let map = out.class_map.expect("class map");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["iconButton"]);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let stage = stage(ClassNameConvention::CamelCase);
        let source = module("/repo/client/x.module.scss");
        let a = stage.transform(".x { top: 0 }", &source).expect("first");
        let b = stage.transform(".x { top: 0 }", &source).expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_css_is_a_transform_error() {
        let stage = stage(ClassNameConvention::CamelCase);
        let err = stage
            .transform("..a { color: red; }", &module("/repo/a.module.css"))
            .unwrap_err();
        assert!(matches!(err, Error::Transform { .. }), "{err}");
    }

    #[test]
    fn test_bad_browserslist_is_config_error() {
        let config = PostcssConfig {
            browserslist: vec!["flurbo 1".to_string()],
            ..PostcssConfig::default()
        };
        assert!(TransformStage::new(&config, Path::new("/repo")).is_err());
    }
}
