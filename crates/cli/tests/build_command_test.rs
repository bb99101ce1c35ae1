//! Integration tests for the build flow behind `stylepipe build`

use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylepipe::{build_entries, plugin_host, storybook_config_json, Config, MANIFEST_FILE_NAME};
use stylepipe_compiler::BuildContext;
use stylepipe_core::PathResolver;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, content).expect("write");
    path
}

fn context(root: &Path) -> Arc<BuildContext> {
    let config = Config::default();
    let resolver = PathResolver::new(root, &config.resolver);
    Arc::new(BuildContext::with_resolver(config, resolver).expect("context"))
}

#[tokio::test]
async fn test_module_entry_writes_script_stylesheet_and_manifest() {
    let repo = TempDir::new().expect("tempdir");
    write(
        repo.path(),
        "client/web/src/button.module.scss",
        ".primary { color: red; }\n",
    );
    let out = repo.path().join("out");
    let ctx = context(repo.path());
    let host = plugin_host(&ctx).expect("host");

    let summary = build_entries(
        &ctx,
        &host,
        &[PathBuf::from("./button.module.scss")],
        &repo.path().join("client/web/src"),
        &out,
    )
    .await
    .expect("build");

    assert_eq!(summary.scripts(), 1);
    assert_eq!(summary.stylesheets(), 1);

    let mirrored = out.join("client/web/src");
    let script = std::fs::read_to_string(mirrored.join("button.module.js")).expect("script");
    assert!(script.contains("primary"), "{script}");
    let css = std::fs::read_to_string(mirrored.join("button.module.css")).expect("css");
    assert!(css.contains("button-module__primary___"), "{css}");

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE_NAME)).expect("manifest"))
            .expect("json");
    assert_eq!(manifest.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_broken_entry_fails_without_outputs() {
    let repo = TempDir::new().expect("tempdir");
    write(repo.path(), "client/web/src/broken.scss", ".a { color: red;\n");
    let out = repo.path().join("out");
    let ctx = context(repo.path());
    let host = plugin_host(&ctx).expect("host");

    let result = build_entries(
        &ctx,
        &host,
        &[PathBuf::from("./broken.scss")],
        &repo.path().join("client/web/src"),
        &out,
    )
    .await;

    assert!(result.is_err());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_repo_relative_entry_resolves_against_base_dir() {
    let repo = TempDir::new().expect("tempdir");
    write(repo.path(), "client/web/a.scss", ".a { top: 0; }\n");
    let out = repo.path().join("out");
    let ctx = context(repo.path());
    let host = plugin_host(&ctx).expect("host");

    let summary = build_entries(
        &ctx,
        &host,
        &[PathBuf::from("client/web/a.scss")],
        repo.path(),
        &out,
    )
    .await
    .expect("build");

    assert_eq!(summary.stylesheets(), 1);
    let css = std::fs::read_to_string(out.join("client/web/a.css")).expect("css");
    assert!(css.contains(".a"), "{css}");
}

#[tokio::test]
async fn test_same_stem_in_different_dirs_keeps_both_outputs() {
    let repo = TempDir::new().expect("tempdir");
    write(repo.path(), "client/a/button.scss", ".from-a { top: 0; }\n");
    write(repo.path(), "client/b/button.scss", ".from-b { top: 0; }\n");
    let out = repo.path().join("out");
    let ctx = context(repo.path());
    let host = plugin_host(&ctx).expect("host");

    let summary = build_entries(
        &ctx,
        &host,
        &[
            PathBuf::from("./a/button.scss"),
            PathBuf::from("./b/button.scss"),
        ],
        &repo.path().join("client"),
        &out,
    )
    .await
    .expect("build");

    let mut written = summary.written.clone();
    written.sort();
    written.dedup();
    assert_eq!(written.len(), summary.written.len());

    let a = std::fs::read_to_string(out.join("client/a/button.css")).expect("a");
    let b = std::fs::read_to_string(out.join("client/b/button.css")).expect("b");
    assert!(a.contains(".from-a") && !a.contains(".from-b"), "{a}");
    assert!(b.contains(".from-b") && !b.contains(".from-a"), "{b}");
}

#[test]
fn test_storybook_config_json_is_finalized() {
    let repo = TempDir::new().expect("tempdir");
    let json = storybook_config_json(&Config::default(), repo.path()).expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

    let plugins: Vec<&str> = value["plugins"]
        .as_array()
        .expect("plugins")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert!(plugins.contains(&"MonacoWebpackPlugin"), "{plugins:?}");
    assert_eq!(value["mode"], "development");
}
