#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Style compilation pipeline
//!
//! Each style file goes through the same stateless sequence:
//!
//! 1. **Compile**: `.css` passes through, `.scss` is compiled with SASS
//! 2. **Transform**: vendor prefixing, plus CSS Modules scoping for `*.module.*`
//! 3. **Write**: the result is materialized in the process temp root
//! 4. **Record**: the class name map is stored for the virtual module
//!
//! All process-wide state lives in a [`BuildContext`] passed to the
//! bundler hooks explicitly.

mod artifacts;
mod context;
mod locks;
mod module_map;
mod postcss;
mod source;
mod style;
mod synth;

pub use artifacts::{ArtifactEntry, ArtifactWriter};
pub use context::{BuildContext, StyleBuild};
pub use locks::PathLocks;
pub use module_map::{ClassNameMap, ModuleMapCache};
pub use postcss::{camel_case, TransformOutput, TransformStage};
pub use source::{is_module_path, StyleExtension, StyleSource};
pub use style::{CompiledStyle, StyleCompiler};
pub use synth::{synthesize, VirtualModule, ARTIFACT_IMPORT_PREFIX};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::context::BuildContext;
    pub use crate::source::StyleSource;
    pub use crate::synth::VirtualModule;
}
