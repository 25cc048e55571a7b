//! Dialect compilers - a uniform plugin contract for source dialects.
//!
//! Every plugin turns one family of dialect sources (stylus stylesheets,
//! TypeScript) into a canonical output type (CSS, JavaScript) behind the same
//! interface, so an orchestration layer can cache, invalidate and invoke
//! compilers without knowing which dialect is active.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      CompilerRegistry                            │
//! │  - Maps input mime types to plugins                              │
//! │  - Seeds plugin options from .dialectc.toml                      │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      CompilerPlugin                              │
//! │  - Static capabilities (mime types, compiler version)            │
//! │  - Option resolution + directive application                     │
//! │  - compile (async) / compile_sync with identical output          │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Compiler library (lazy, process-wide)            │
//! │  - npm stylus / typescript driven through Node.js                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod errors;
mod library;
mod options;
mod plugin;
mod plugins;
mod registry;

pub use config::CompilerConfigFile;
pub use errors::CompilerError;
pub use library::LazyLibrary;
pub use options::{
    base_name, resolve_options, Directive, DirectiveClass, HelperPlugin, OptionValue,
    PluginOptions, FILENAME, IMPORT, USE,
};
pub use plugin::{
    Capabilities, CapabilityDescriptor, CompilationResult, CompileDiagnostic, CompileOutcome,
    CompilerContext, CompilerInfo, CompilerPlugin,
};
pub use registry::{mime_type_for_path, CompilerRegistry};

#[cfg(any(feature = "plugin-stylus", feature = "plugin-typescript"))]
pub use plugins::node::{NODE_ENV, NODE_MODULES_ENV};

// Stylus plugin and its library seam
#[cfg(feature = "plugin-stylus")]
pub use plugins::stylus::{
    apply_options, NodeStylus, NodeStylusSession, StylusCompiler, StylusLibrary, StylusSession,
};

// TypeScript plugin and its library seam
#[cfg(feature = "plugin-typescript")]
pub use plugins::typescript::{
    is_tsx, NodeTypeScript, TranspileJob, TypeScriptCompiler, TypeScriptLibrary, SEMANTIC_CHECKS,
};
