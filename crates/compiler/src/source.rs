//! Style source records

use std::path::{Path, PathBuf};
use stylepipe_core::error::{Error, Result};

/// Suffix of the file stem that marks a CSS Modules source
const MODULE_MARKER: &str = ".module";

/// Style extensions the compiler accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleExtension {
    Css,
    Scss,
}

impl StyleExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Scss => "scss",
        }
    }
}

/// A resolved style file, created once at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSource {
    pub path: PathBuf,
    pub extension: StyleExtension,
    pub is_module: bool,
}

impl StyleSource {
    /// Build the record for `path`, rejecting extensions other than `.css` / `.scss`
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let extension = match path.extension().and_then(|e| e.to_str()) {
            Some("css") => StyleExtension::Css,
            Some("scss") => StyleExtension::Scss,
            other => {
                let ext = other.map(|e| format!(".{e}")).unwrap_or_default();
                return Err(Error::unsupported_extension(path, ext));
            }
        };
        let is_module = is_module_path(&path);
        Ok(Self {
            path,
            extension,
            is_module,
        })
    }

    /// File name without the extension, e.g. `button.module`
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Whether the file stem (extension stripped) ends with `.module`
pub fn is_module_path(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with(MODULE_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_detection() {
        assert!(is_module_path(Path::new("/a/button.module.scss")));
        assert!(is_module_path(Path::new("/a/Tabs.module.css")));
        assert!(!is_module_path(Path::new("/a/table.scss")));
        assert!(!is_module_path(Path::new("/a/module.scss")));
        assert!(!is_module_path(Path::new("/a/button.module.scss.bak")));
    }

    #[test]
    fn test_from_path() {
        let source = StyleSource::from_path("/a/button.module.scss").expect("scss");
        assert_eq!(source.extension, StyleExtension::Scss);
        assert!(source.is_module);
        assert_eq!(source.base_name(), "button.module");

        let source = StyleSource::from_path("/a/plain.css").expect("css");
        assert_eq!(source.extension, StyleExtension::Css);
        assert!(!source.is_module);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = StyleSource::from_path("/a/theme.less").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedExtension { ref extension, .. } if extension == ".less"
        ));

        let err = StyleSource::from_path("/a/Makefile").unwrap_err();
        assert!(matches!(err, Error::UnsupportedExtension { .. }));
    }
}
