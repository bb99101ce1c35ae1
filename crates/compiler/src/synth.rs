//! Virtual module synthesis for CSS Modules sources

use std::path::{Path, PathBuf};
use stylepipe_core::error::{Error, Result};

use crate::module_map::ClassNameMap;

/// Prefix marking the side-effect import of a transformed artifact
pub const ARTIFACT_IMPORT_PREFIX: &str = "x:";

/// Synthetic script module injected in place of a `*.module.*` import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualModule {
    pub contents: String,
    pub resolve_dir: PathBuf,
    pub watch_files: Vec<PathBuf>,
}

/// Build the module that imports `artifact` and default-exports `class_map`
///
/// A missing map exports `{}`: a module file without class selectors is valid.
pub fn synthesize(
    original: &Path,
    artifact: &Path,
    class_map: Option<&ClassNameMap>,
    dependencies: &[PathBuf],
) -> Result<VirtualModule> {
    let empty = ClassNameMap::new();
    let map = class_map.unwrap_or(&empty);

    let import = format!("{ARTIFACT_IMPORT_PREFIX}{}", artifact.to_string_lossy());
    let import = serde_json::to_string(&import)
        .map_err(|e| Error::with_context("Failed to encode artifact import", e))?;
    let exports = serde_json::to_string(map)
        .map_err(|e| Error::with_context("Failed to encode class name map", e))?;

    let mut watch_files = vec![original.to_path_buf()];
    for dep in dependencies {
        if !watch_files.contains(dep) {
            watch_files.push(dep.clone());
        }
    }

    Ok(VirtualModule {
        contents: format!("import {import}\nexport default {exports}\n"),
        resolve_dir: artifact
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        watch_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_synthesize_exports_map() {
        let mut map = ClassNameMap::new();
        map.insert("primary".to_string(), "button-module__primary___x1".to_string());

        let module = synthesize(
            Path::new("/repo/client/button.module.scss"),
            Path::new("/tmp/sp/client/button.module.css"),
            Some(&map),
            &[],
        )
        .expect("synthesize");

        assert_eq!(
            module.contents,
            "import \"x:/tmp/sp/client/button.module.css\"\n\
             export default {\"primary\":\"button-module__primary___x1\"}\n"
        );
        assert_eq!(module.resolve_dir, PathBuf::from("/tmp/sp/client"));
        assert_eq!(
            module.watch_files,
            vec![PathBuf::from("/repo/client/button.module.scss")]
        );
    }

    #[test]
    fn test_missing_map_exports_empty_object() {
        let module = synthesize(
            Path::new("/repo/empty.module.css"),
            Path::new("/tmp/sp/empty.module.css"),
            None,
            &[PathBuf::from("/repo/_vars.scss")],
        )
        .expect("synthesize");
        assert!(module.contents.ends_with("export default {}\n"));
        assert_eq!(module.watch_files.len(), 2);
        assert_eq!(module.watch_files[0], PathBuf::from("/repo/empty.module.css"));
    }
}
