//! Core types for the stylepipe build pipeline
//!
//! This crate provides the foundational pieces shared by every stage of
//! the style pipeline:
//!
//! - **Configuration**: resolver rules, SASS and PostCSS options, build flags
//! - **Specifiers**: classification of import specifiers
//! - **Resolution**: the pure specifier-to-path resolver
//! - **Error handling**: unified error types
//!

pub mod config;
pub mod error;
pub mod resolver;
pub mod specifier;

// Re-export main types for convenience
pub use config::{
    ArtifactsConfig, BuildFlags, ClassNameConvention, Config, PostcssConfig, ResolverConfig,
    SassConfig, WatcherConfig,
};
pub use error::{Error, Result, ResultExt};
pub use resolver::PathResolver;
pub use specifier::{ModuleSpecifier, SpecifierKind};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, ResultExt};
    pub use crate::resolver::PathResolver;
}
