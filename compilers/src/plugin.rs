use crate::errors::CompilerError;
use crate::options::PluginOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Dialect compiler plugin interface.
///
/// Every adapter exposes the same surface so callers can cache, invalidate
/// and invoke compilers without knowing which dialect is active. `compile`
/// and `compile_sync` must produce identical output for identical input.
#[async_trait]
pub trait CompilerPlugin: Send + Sync {
    /// Unique plugin identifier (e.g., "stylus").
    fn name(&self) -> &str;

    /// Static capabilities of this adapter type.
    fn capabilities(&self) -> CapabilityDescriptor;

    /// Instance-level default options.
    fn compiler_options(&self) -> &PluginOptions;

    /// Decide whether `file_path` needs compiling at all.
    async fn should_compile_file(&self, file_path: &Path, context: &CompilerContext) -> bool {
        self.should_compile_file_sync(file_path, context)
    }

    fn should_compile_file_sync(&self, _file_path: &Path, _context: &CompilerContext) -> bool {
        true
    }

    /// Files the source depends on, in order, for cache invalidation.
    async fn determine_dependent_files(
        &self,
        source_code: &str,
        file_path: &Path,
        context: &CompilerContext,
    ) -> Vec<PathBuf> {
        self.determine_dependent_files_sync(source_code, file_path, context)
    }

    fn determine_dependent_files_sync(
        &self,
        _source_code: &str,
        _file_path: &Path,
        _context: &CompilerContext,
    ) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Compile source text, suspending while the underlying compiler runs.
    async fn compile(
        &self,
        source_code: &str,
        file_path: &Path,
        context: &CompilerContext,
    ) -> Result<CompilationResult, CompilerError>;

    /// Compile source text, blocking the calling thread until done.
    fn compile_sync(
        &self,
        source_code: &str,
        file_path: &Path,
        context: &CompilerContext,
    ) -> Result<CompilationResult, CompilerError>;
}

/// Instance-independent metadata, available without constructing an adapter.
pub trait Capabilities {
    /// Content types this adapter accepts. Never empty.
    fn input_mime_types() -> &'static [&'static str];

    /// The single content type this adapter produces.
    fn output_mime_type() -> &'static str;

    /// Installed version of the underlying compiler package.
    ///
    /// Reads packaging metadata only; never loads the compiler itself.
    fn compiler_version() -> Result<String, CompilerError>;

    fn descriptor() -> CapabilityDescriptor
    where
        Self: Sized,
    {
        CapabilityDescriptor {
            input_mime_types: Self::input_mime_types(),
            output_mime_type: Self::output_mime_type(),
            compiler_version: Self::compiler_version,
        }
    }
}

/// Capabilities of one adapter type, in a form usable behind `dyn`.
#[derive(Clone, Copy)]
pub struct CapabilityDescriptor {
    pub input_mime_types: &'static [&'static str],
    pub output_mime_type: &'static str,
    pub compiler_version: fn() -> Result<String, CompilerError>,
}

impl CapabilityDescriptor {
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.input_mime_types.contains(&mime_type)
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("input_mime_types", &self.input_mime_types)
            .field("output_mime_type", &self.output_mime_type)
            .finish_non_exhaustive()
    }
}

/// Canonical compiler output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationResult {
    pub code: String,
    pub mime_type: String,
}

/// Caller-owned state handed to every plugin call. Plugins only read it.
#[derive(Debug, Clone, Default)]
pub struct CompilerContext {
    root: Option<PathBuf>,
    values: HashMap<String, Value>,
}

impl CompilerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context anchored at a project root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// What an underlying compiler produced: output text, or its diagnostic.
pub type CompileOutcome = Result<String, CompileDiagnostic>;

/// Diagnostic reported by an underlying compiler, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    pub message: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

impl CompileDiagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => {
                write!(f, "{}:{}:{}: {}", file, line, column, self.message)
            }
            (Some(file), Some(line), None) => write!(f, "{}:{}: {}", file, line, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Display information for a registered compiler.
#[derive(Debug, Clone, Serialize)]
pub struct CompilerInfo {
    pub name: String,
    pub input_mime_types: Vec<String>,
    pub output_mime_type: String,
    pub compiler_version: Option<String>,
}
