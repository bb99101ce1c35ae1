//! Import specifier classification
//!
//! A specifier is the string written in an import statement, either in a
//! script file or in a SCSS `@import`/`@use`. Classification is purely
//! textual and follows the same prefix rules as the path resolver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a specifier is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecifierKind {
    /// `./x` or `../x`, resolved against the importing directory
    Relative,
    /// `/x`, used as is
    Absolute,
    /// `wildcard/...`, `shared/...`, mapped into the workspace client directory
    WorkspaceAlias,
    /// `@scope/name` or a bare name, mapped into the package directory
    Package,
}

/// An immutable, classified import specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSpecifier {
    raw: String,
    kind: SpecifierKind,
}

impl ModuleSpecifier {
    /// Classify `raw` against the alias and package prefix tables
    ///
    /// Aliases are checked first, then the package allow-list, then the
    /// leading character.
    pub fn classify(raw: &str, aliases: &[String], packages: &[String]) -> Self {
        let kind = if aliases.iter().any(|alias| raw.starts_with(alias.as_str())) {
            SpecifierKind::WorkspaceAlias
        } else if packages.iter().any(|pkg| raw.starts_with(pkg.as_str())) {
            SpecifierKind::Package
        } else if raw.starts_with('.') {
            SpecifierKind::Relative
        } else if raw.starts_with('/') {
            SpecifierKind::Absolute
        } else {
            SpecifierKind::Package
        };

        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    /// The specifier as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The resolution class
    pub fn kind(&self) -> SpecifierKind {
        self.kind
    }

    /// Whether the specifier names a style source (`.css` / `.scss`)
    pub fn is_style(&self) -> bool {
        self.raw.ends_with(".css") || self.raw.ends_with(".scss")
    }
}

impl fmt::Display for ModuleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (Vec<String>, Vec<String>) {
        (
            vec!["wildcard/".to_string(), "shared".to_string()],
            vec!["@reach".to_string(), "bootstrap".to_string()],
        )
    }

    #[test]
    fn test_classify() {
        let (aliases, packages) = tables();
        let cases = [
            ("./Button.module.scss", SpecifierKind::Relative),
            ("../global.scss", SpecifierKind::Relative),
            ("/abs/x.css", SpecifierKind::Absolute),
            ("wildcard/src/global-styles/base", SpecifierKind::WorkspaceAlias),
            ("shared/src/vars", SpecifierKind::WorkspaceAlias),
            ("@reach/menu-button/styles.css", SpecifierKind::Package),
            ("bootstrap/scss/functions", SpecifierKind::Package),
            ("open-color/open-color.scss", SpecifierKind::Package),
        ];
        for (raw, expected) in cases {
            let spec = ModuleSpecifier::classify(raw, &aliases, &packages);
            assert_eq!(spec.kind(), expected, "{raw}");
            assert_eq!(spec.as_str(), raw);
        }
    }

    #[test]
    fn test_alias_wins_over_package() {
        let aliases = vec!["shared".to_string()];
        let packages = vec!["shared".to_string()];
        let spec = ModuleSpecifier::classify("shared/x", &aliases, &packages);
        assert_eq!(spec.kind(), SpecifierKind::WorkspaceAlias);
    }

    #[test]
    fn test_is_style() {
        let (aliases, packages) = tables();
        assert!(ModuleSpecifier::classify("./a.scss", &aliases, &packages).is_style());
        assert!(ModuleSpecifier::classify("./a.css", &aliases, &packages).is_style());
        assert!(!ModuleSpecifier::classify("./a.tsx", &aliases, &packages).is_style());
    }
}
