//! Stylus stylesheet plugin.
//!
//! Options follow the stylus renderer vocabulary: `set`/`define` assign
//! variables, `include`/`import`/`use` register paths, files and plugins.
//! Importing `nib` implicitly registers the nib plugin.

use crate::errors::CompilerError;
use crate::library::LazyLibrary;
use crate::options::{
    resolve_options, Directive, HelperPlugin, OptionValue, PluginOptions, IMPORT, USE,
};
use crate::plugin::{
    Capabilities, CapabilityDescriptor, CompilationResult, CompileOutcome, CompilerContext,
    CompilerPlugin,
};
use crate::plugins::node::{package_version, NodeHost};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;

const INPUT_MIME_TYPES: &[&str] = &["text/stylus"];
const OUTPUT_MIME_TYPE: &str = "text/css";
const PACKAGE: &str = "stylus";
const DRIVER: &str = include_str!("drivers/stylus.js");

/// One renderer session of the underlying stylesheet compiler.
///
/// Mirrors the compiler's own configuration API: two key/value entry points
/// and three single-argument registration entry points.
pub trait StylusSession {
    fn set(&mut self, key: &str, value: &OptionValue);
    fn define(&mut self, name: &str, value: &OptionValue);
    fn include(&mut self, path: &OptionValue);
    fn import(&mut self, file: &OptionValue);
    fn use_plugin(&mut self, plugin: &OptionValue);
}

/// The underlying stylesheet compiler library.
#[async_trait]
pub trait StylusLibrary: Send + Sync + 'static {
    type Session: StylusSession + Send;

    /// Start a renderer for `source` with fully resolved `options`.
    fn session(&self, source: &str, options: &PluginOptions) -> Self::Session;

    /// Render, blocking until the CSS is ready.
    fn render_sync(&self, session: Self::Session) -> Result<CompileOutcome, CompilerError>;

    /// Render, suspending until the CSS is ready.
    async fn render(&self, session: Self::Session) -> Result<CompileOutcome, CompilerError>;

    /// Installed version, read from packaging metadata.
    fn version() -> Result<String, CompilerError>
    where
        Self: Sized;
}

/// Apply directive options to a session, in option order.
///
/// `set`/`define` call the session once per key/value pair;
/// `include`/`import`/`use` once per element. Other keys are ignored.
pub fn apply_options<'s, S: StylusSession + ?Sized>(
    options: &PluginOptions,
    session: &'s mut S,
) -> &'s mut S {
    for (key, value) in options.iter() {
        let Some(directive) = Directive::parse(key) else {
            continue;
        };
        match directive {
            Directive::Set => {
                for (name, entry) in value.entries() {
                    session.set(&name, &entry);
                }
            }
            Directive::Define => {
                for (name, entry) in value.entries() {
                    session.define(&name, &entry);
                }
            }
            Directive::Include => value.elements().iter().for_each(|v| session.include(v)),
            Directive::Import => value.elements().iter().for_each(|v| session.import(v)),
            Directive::Use => value.elements().iter().for_each(|v| session.use_plugin(v)),
        }
    }
    session
}

/// Register nib when it is imported.
fn activate_nib(options: &mut PluginOptions) {
    let imports_nib = options
        .get(IMPORT)
        .map(|import| {
            import
                .elements()
                .iter()
                .any(|v| v.as_str() == Some(HelperPlugin::NIB))
        })
        .unwrap_or(false);
    if imports_nib {
        options
            .ensure_sequence(USE)
            .push(OptionValue::Plugin(HelperPlugin::nib()));
    }
}

static NODE_STYLUS: LazyLibrary<NodeStylus> = LazyLibrary::new(PACKAGE, NodeStylus::load);

pub struct StylusCompiler<L: StylusLibrary = NodeStylus> {
    compiler_options: PluginOptions,
    library: &'static LazyLibrary<L>,
}

impl StylusCompiler<NodeStylus> {
    pub fn new() -> Self {
        Self::with_library(&NODE_STYLUS)
    }
}

impl Default for StylusCompiler<NodeStylus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: StylusLibrary> StylusCompiler<L> {
    /// Adapter backed by a caller-provided library cell.
    pub fn with_library(library: &'static LazyLibrary<L>) -> Self {
        let mut compiler_options = PluginOptions::new();
        compiler_options.insert("sourcemap", true);
        Self {
            compiler_options,
            library,
        }
    }

    pub fn with_options(mut self, overrides: &PluginOptions) -> Self {
        self.compiler_options.merge(overrides);
        self
    }

    pub fn compiler_options_mut(&mut self) -> &mut PluginOptions {
        &mut self.compiler_options
    }

    /// Options for compiling `file_path`; the stored defaults are untouched.
    pub fn resolve_options(&self, file_path: &Path) -> PluginOptions {
        resolve_options(&self.compiler_options, file_path, activate_nib)
    }

    /// Shared by both compile paths: load the library, then build a fully
    /// configured session owned by this call.
    fn prepare(
        &self,
        source_code: &str,
        file_path: &Path,
    ) -> Result<(&L, L::Session), CompilerError> {
        let library = self.library.get()?;
        let options = self.resolve_options(file_path);
        let mut session = library.session(source_code, &options);
        apply_options(&options, &mut session);
        tracing::trace!(file = %file_path.display(), "rendering stylus");
        Ok((library, session))
    }

    fn finish(
        file_path: &Path,
        rendered: CompileOutcome,
    ) -> Result<CompilationResult, CompilerError> {
        let code = rendered.map_err(|diagnostic| CompilerError::compile(file_path, diagnostic))?;
        Ok(CompilationResult {
            code,
            mime_type: OUTPUT_MIME_TYPE.to_string(),
        })
    }
}

impl<L: StylusLibrary> Capabilities for StylusCompiler<L> {
    fn input_mime_types() -> &'static [&'static str] {
        INPUT_MIME_TYPES
    }

    fn output_mime_type() -> &'static str {
        OUTPUT_MIME_TYPE
    }

    fn compiler_version() -> Result<String, CompilerError> {
        L::version()
    }
}

#[async_trait]
impl<L: StylusLibrary> CompilerPlugin for StylusCompiler<L> {
    fn name(&self) -> &str {
        "stylus"
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        Self::descriptor()
    }

    fn compiler_options(&self) -> &PluginOptions {
        &self.compiler_options
    }

    async fn compile(
        &self,
        source_code: &str,
        file_path: &Path,
        _context: &CompilerContext,
    ) -> Result<CompilationResult, CompilerError> {
        let (library, session) = self.prepare(source_code, file_path)?;
        let rendered = library.render(session).await?;
        Self::finish(file_path, rendered)
    }

    fn compile_sync(
        &self,
        source_code: &str,
        file_path: &Path,
        _context: &CompilerContext,
    ) -> Result<CompilationResult, CompilerError> {
        let (library, session) = self.prepare(source_code, file_path)?;
        let rendered = library.render_sync(session)?;
        Self::finish(file_path, rendered)
    }
}

/// The npm `stylus` package, driven through Node.js.
pub struct NodeStylus {
    host: NodeHost,
}

impl NodeStylus {
    fn load() -> Result<Self, CompilerError> {
        Ok(Self {
            host: NodeHost::locate(PACKAGE)?,
        })
    }
}

/// Renderer session recorded for replay by the Node driver.
#[derive(Debug, Clone)]
pub struct NodeStylusSession {
    source: String,
    options: Value,
    calls: Vec<Value>,
}

impl NodeStylusSession {
    fn record(&mut self, directive: Directive, args: Vec<Value>) {
        self.calls.push(json!({ "method": directive.as_str(), "args": args }));
    }

    fn job(&self) -> Value {
        json!({
            "source": self.source,
            "options": self.options,
            "calls": self.calls,
        })
    }
}

impl StylusSession for NodeStylusSession {
    fn set(&mut self, key: &str, value: &OptionValue) {
        self.record(Directive::Set, vec![Value::String(key.to_string()), value.to_json()]);
    }

    fn define(&mut self, name: &str, value: &OptionValue) {
        self.record(Directive::Define, vec![Value::String(name.to_string()), value.to_json()]);
    }

    fn include(&mut self, path: &OptionValue) {
        self.record(Directive::Include, vec![path.to_json()]);
    }

    fn import(&mut self, file: &OptionValue) {
        self.record(Directive::Import, vec![file.to_json()]);
    }

    fn use_plugin(&mut self, plugin: &OptionValue) {
        self.record(Directive::Use, vec![plugin.to_json()]);
    }
}

#[async_trait]
impl StylusLibrary for NodeStylus {
    type Session = NodeStylusSession;

    fn session(&self, source: &str, options: &PluginOptions) -> NodeStylusSession {
        NodeStylusSession {
            source: source.to_string(),
            options: Value::Object(options.to_json_map()),
            calls: Vec::new(),
        }
    }

    fn render_sync(&self, session: NodeStylusSession) -> Result<CompileOutcome, CompilerError> {
        self.host.run_sync(DRIVER, &session.job())
    }

    async fn render(&self, session: NodeStylusSession) -> Result<CompileOutcome, CompilerError> {
        self.host.run(DRIVER, &session.job()).await
    }

    fn version() -> Result<String, CompilerError> {
        package_version(PACKAGE)
    }
}
