//! TypeScript plugin.
//!
//! Emits ES2015 script. `.tsx` sources additionally get React JSX emit and
//! are never semantically checked: type checking the generated component
//! code is unreliable, so checks are forced off for that variant whatever
//! `doSemanticChecks` says.

use crate::errors::CompilerError;
use crate::library::LazyLibrary;
use crate::options::{base_name, resolve_options, PluginOptions, FILENAME};
use crate::plugin::{
    Capabilities, CapabilityDescriptor, CompilationResult, CompileOutcome, CompilerContext,
    CompilerPlugin,
};
use crate::plugins::node::{package_version, NodeHost};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

const INPUT_MIME_TYPES: &[&str] = &["text/typescript", "text/tsx"];
const OUTPUT_MIME_TYPE: &str = "application/javascript";
const PACKAGE: &str = "typescript";
const DRIVER: &str = include_str!("drivers/typescript.js");

/// Adapter flag, not a compiler option: whether to type check.
pub const SEMANTIC_CHECKS: &str = "doSemanticChecks";
const TARGET: &str = "es2015";
const JSX_EMIT: &str = "react";

/// One invocation of the underlying compiler.
///
/// Owned by the library for the duration of the call, so anything the
/// compiler does to its options stays inside this job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspileJob {
    pub source: String,
    pub file_name: String,
    pub compiler_options: Map<String, Value>,
    pub semantic_checks: bool,
}

/// The underlying TypeScript compiler library.
#[async_trait]
pub trait TypeScriptLibrary: Send + Sync + 'static {
    /// Compile, blocking until the script is ready.
    fn transpile_sync(&self, job: TranspileJob) -> Result<CompileOutcome, CompilerError>;

    /// Compile, suspending until the script is ready.
    async fn transpile(&self, job: TranspileJob) -> Result<CompileOutcome, CompilerError>;

    /// Installed version, read from packaging metadata.
    fn version() -> Result<String, CompilerError>
    where
        Self: Sized;
}

/// Whether `file_path` is the component-template (`.tsx`) variant.
pub fn is_tsx(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"))
}

static NODE_TYPESCRIPT: LazyLibrary<NodeTypeScript> =
    LazyLibrary::new(PACKAGE, NodeTypeScript::load);

pub struct TypeScriptCompiler<L: TypeScriptLibrary = NodeTypeScript> {
    compiler_options: PluginOptions,
    library: &'static LazyLibrary<L>,
}

impl TypeScriptCompiler<NodeTypeScript> {
    pub fn new() -> Self {
        Self::with_library(&NODE_TYPESCRIPT)
    }
}

impl Default for TypeScriptCompiler<NodeTypeScript> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: TypeScriptLibrary> TypeScriptCompiler<L> {
    /// Adapter backed by a caller-provided library cell.
    pub fn with_library(library: &'static LazyLibrary<L>) -> Self {
        let mut compiler_options = PluginOptions::new();
        compiler_options.insert("module", "commonjs");
        compiler_options.insert("sourceMap", true);
        compiler_options.insert(SEMANTIC_CHECKS, true);
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

    /// Build the job for compiling `file_path` from a copy of the defaults.
    pub fn transpile_job(&self, source_code: &str, file_path: &Path) -> TranspileJob {
        let tsx = is_tsx(file_path);
        let mut options = resolve_options(&self.compiler_options, file_path, |_| {});

        let checks_requested = options
            .remove(SEMANTIC_CHECKS)
            .is_some_and(|flag| flag.is_truthy());
        options.remove(FILENAME);
        options.insert("target", TARGET);
        if tsx {
            options.insert("jsx", JSX_EMIT);
        }

        TranspileJob {
            source: source_code.to_string(),
            file_name: base_name(file_path),
            compiler_options: options.to_json_map(),
            semantic_checks: checks_requested && !tsx,
        }
    }

    fn prepare(
        &self,
        source_code: &str,
        file_path: &Path,
    ) -> Result<(&L, TranspileJob), CompilerError> {
        let library = self.library.get()?;
        let job = self.transpile_job(source_code, file_path);
        tracing::trace!(
            file = %file_path.display(),
            semantic_checks = job.semantic_checks,
            "compiling typescript"
        );
        Ok((library, job))
    }

    fn finish(
        file_path: &Path,
        outcome: CompileOutcome,
    ) -> Result<CompilationResult, CompilerError> {
        let code = outcome.map_err(|diagnostic| CompilerError::compile(file_path, diagnostic))?;
        Ok(CompilationResult {
            code,
            mime_type: OUTPUT_MIME_TYPE.to_string(),
        })
    }
}

impl<L: TypeScriptLibrary> Capabilities for TypeScriptCompiler<L> {
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
impl<L: TypeScriptLibrary> CompilerPlugin for TypeScriptCompiler<L> {
    fn name(&self) -> &str {
        "typescript"
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
        let (library, job) = self.prepare(source_code, file_path)?;
        let outcome = library.transpile(job).await?;
        Self::finish(file_path, outcome)
    }

    fn compile_sync(
        &self,
        source_code: &str,
        file_path: &Path,
        _context: &CompilerContext,
    ) -> Result<CompilationResult, CompilerError> {
        let (library, job) = self.prepare(source_code, file_path)?;
        let outcome = library.transpile_sync(job)?;
        Self::finish(file_path, outcome)
    }
}

/// The npm `typescript` package, driven through Node.js.
pub struct NodeTypeScript {
    host: NodeHost,
}

impl NodeTypeScript {
    fn load() -> Result<Self, CompilerError> {
        Ok(Self {
            host: NodeHost::locate(PACKAGE)?,
        })
    }
}

#[async_trait]
impl TypeScriptLibrary for NodeTypeScript {
    fn transpile_sync(&self, job: TranspileJob) -> Result<CompileOutcome, CompilerError> {
        self.host.run_sync(DRIVER, &serde_json::to_value(&job)?)
    }

    async fn transpile(&self, job: TranspileJob) -> Result<CompileOutcome, CompilerError> {
        let payload = serde_json::to_value(&job)?;
        self.host.run(DRIVER, &payload).await
    }

    fn version() -> Result<String, CompilerError> {
        package_version(PACKAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::node::testing;
    use crate::plugin::CompileDiagnostic;
    use serde_json::json;
    use tempfile::TempDir;

    /// Just enough of the compiler API for the driver: option conversion
    /// that rejects unknown keys and bad targets, a transpiler that echoes
    /// its options, and a checker that flags string-to-number assignment.
    const FAKE_TYPESCRIPT: &str = r#"
const KNOWN = ['module', 'sourceMap', 'target', 'jsx', 'strict'];
const error = (code, messageText) => ({ code, category: 1, messageText });

module.exports = {
  DiagnosticCategory: { Warning: 0, Error: 1 },
  flattenDiagnosticMessageText: (text) => text,
  convertCompilerOptionsFromJson(json) {
    const options = {};
    const errors = [];
    for (const [key, value] of Object.entries(json)) {
      if (!KNOWN.includes(key)) {
        errors.push(error(5023, `Unknown compiler option '${key}'.`));
      } else if (key === 'target' && value !== 'es2015') {
        errors.push(error(6046, `Argument for '--target' option must be: 'es2015'.`));
      } else {
        options[key] = value;
      }
    }
    return { options, errors };
  },
  transpileModule(source, { compilerOptions, fileName }) {
    const keys = Object.keys(compilerOptions).join(',');
    return { outputText: `transpiled ${fileName} [${keys}]\n${source}`, diagnostics: [] };
  },
  createCompilerHost: () => ({
    getSourceFile: () => undefined,
    fileExists: () => false,
    readFile: () => undefined,
  }),
  createSourceFile: (fileName, text) => ({
    fileName,
    text,
    getLineAndCharacterOfPosition: (pos) => ({ line: 0, character: pos }),
  }),
  createProgram(roots, options, host) {
    const file = host.getSourceFile(roots[0], options.target);
    return {
      file,
      emit() {
        host.writeFile(roots[0].replace(/\.ts$/, '.js'), `checked ${file.fileName}\n${file.text}`);
      },
    };
  },
  getPreEmitDiagnostics(program) {
    const start = program.file.text.indexOf("'a'");
    if (start < 0) {
      return [];
    }
    const messageText = "Type 'string' is not assignable to type 'number'.";
    return [{ code: 2322, category: 1, messageText, file: program.file, start }];
  },
};
"#;

    fn node_typescript(modules: &TempDir) -> Option<NodeTypeScript> {
        testing::install_package(modules.path(), "typescript", FAKE_TYPESCRIPT);
        testing::host(PACKAGE, modules.path()).map(|host| NodeTypeScript { host })
    }

    fn transpile(library: &NodeTypeScript, job: TranspileJob) -> Result<String, CompileDiagnostic> {
        library.transpile_sync(job).unwrap()
    }

    fn compiler() -> TypeScriptCompiler<NodeTypeScript> {
        TypeScriptCompiler::new()
    }

    #[test]
    fn test_is_tsx() {
        assert!(is_tsx(Path::new("app/View.tsx")));
        assert!(is_tsx(Path::new("app/View.TSX")));
        assert!(!is_tsx(Path::new("app/view.ts")));
        assert!(!is_tsx(Path::new("tsx")));
    }

    #[test]
    fn test_job_for_plain_script() {
        let job = compiler().transpile_job("let x = 1;", Path::new("src/f.ts"));
        assert_eq!(job.file_name, "f.ts");
        assert!(job.semantic_checks);
        assert_eq!(
            Value::Object(job.compiler_options),
            json!({"module": "commonjs", "sourceMap": true, "target": "es2015"})
        );
    }

    #[test]
    fn test_job_for_tsx_disables_checks() {
        let job = compiler().transpile_job("<div/>", Path::new("src/View.tsx"));
        assert!(!job.semantic_checks);
        assert_eq!(job.compiler_options.get("jsx"), Some(&json!("react")));
        assert!(!job.compiler_options.contains_key(SEMANTIC_CHECKS));
    }

    #[test]
    fn test_job_respects_disabled_checks() {
        let mut compiler = compiler();
        compiler.compiler_options_mut().insert(SEMANTIC_CHECKS, false);
        let job = compiler.transpile_job("let x = 1;", Path::new("f.ts"));
        assert!(!job.semantic_checks);
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = compiler().transpile_job("", Path::new("f.ts"));
        let payload = serde_json::to_value(&job).unwrap();
        assert!(payload.get("fileName").is_some());
        assert!(payload.get("compilerOptions").is_some());
        assert_eq!(payload["semanticChecks"], json!(true));
    }

    #[tokio::test]
    async fn test_node_driver_checks_plain_scripts() {
        let modules = TempDir::new().unwrap();
        let Some(library) = node_typescript(&modules) else {
            return;
        };
        let job = compiler().transpile_job("let x: number = 1;", Path::new("src/f.ts"));

        let blocking = library.transpile_sync(job.clone()).unwrap();
        let suspended = library.transpile(job).await.unwrap();
        assert_eq!(blocking, Ok("checked f.ts\nlet x: number = 1;".to_string()));
        assert_eq!(blocking, suspended);
    }

    #[test]
    fn test_node_driver_reports_type_errors() {
        let modules = TempDir::new().unwrap();
        let Some(library) = node_typescript(&modules) else {
            return;
        };
        let job = compiler().transpile_job("let x: number = 'a';", Path::new("f.ts"));

        let diagnostic = transpile(&library, job).unwrap_err();
        assert_eq!(diagnostic.message, "Type 'string' is not assignable to type 'number'.");
        assert_eq!(diagnostic.file.as_deref(), Some("f.ts"));
        assert_eq!(diagnostic.line, Some(1));
        assert_eq!(diagnostic.column, Some(17));
    }

    #[test]
    fn test_node_driver_transpiles_tsx_without_checks() {
        let modules = TempDir::new().unwrap();
        let Some(library) = node_typescript(&modules) else {
            return;
        };
        let job = compiler().transpile_job("let x: number = 'a';", Path::new("View.tsx"));

        let code = transpile(&library, job).unwrap();
        assert_eq!(
            code,
            "transpiled View.tsx [module,sourceMap,target,jsx]\nlet x: number = 'a';"
        );
    }

    #[test]
    fn test_node_driver_ignores_unknown_options() {
        let modules = TempDir::new().unwrap();
        let Some(library) = node_typescript(&modules) else {
            return;
        };
        let compiler = compiler().with_options(&PluginOptions::from_json(json!({
            "futureFlag": true,
            "doSemanticChecks": false,
        })));
        let job = compiler.transpile_job("let x = 1;", Path::new("f.ts"));
        assert!(job.compiler_options.contains_key("futureFlag"));

        let code = transpile(&library, job).unwrap();
        assert_eq!(code, "transpiled f.ts [module,sourceMap,target]\nlet x = 1;");
    }

    #[test]
    fn test_node_driver_rejects_invalid_option_values() {
        let modules = TempDir::new().unwrap();
        let Some(library) = node_typescript(&modules) else {
            return;
        };
        let mut job = compiler().transpile_job("let x = 1;", Path::new("f.ts"));
        job.compiler_options.insert("target".to_string(), json!("es1999"));

        let diagnostic = transpile(&library, job).unwrap_err();
        assert!(diagnostic.message.contains("--target"), "{diagnostic}");
        assert_eq!(diagnostic.file, None);
    }
}
