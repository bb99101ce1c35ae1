//! Bundler integration for the style pipeline
//!
//! A small typed model of an esbuild-style plugin host (resolve and load
//! hooks filtered by path pattern and namespace), the style plugin that
//! drives the compiler crate through it, and the static loader and
//! Storybook rule configuration of the web client build.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod host;
pub mod loaders;
pub mod plugin;
pub mod storybook;

pub use host::{
    HookFilter, ImportKind, LoadArgs, LoadHook, LoadResult, LoadedContents, ModuleRecord,
    PluginData, PluginHost, ResolveArgs, ResolveHook, ResolveResult,
};
pub use loaders::{BuildOptions, Loader, LoaderTable};
pub use plugin::{StylePlugin, MODULE_NAMESPACE, SOURCE_NAMESPACE};
pub use storybook::{finalize, FinalizeOptions, WebpackConfig};

/// Namespace of modules read straight from disk
pub const FILE_NAMESPACE: &str = "file";

/// Something that registers hooks on a [`PluginHost`]
pub trait Plugin {
    fn name(&self) -> &str;

    fn setup(&self, host: &mut PluginHost) -> stylepipe_core::Result<()>;
}
