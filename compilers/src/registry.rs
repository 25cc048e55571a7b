//! Mime-type keyed dispatch table of compiler plugins.

use crate::config::CompilerConfigFile;
use crate::plugin::{CompilerInfo, CompilerPlugin};
#[cfg(any(feature = "plugin-stylus", feature = "plugin-typescript"))]
use crate::plugin::Capabilities;
#[cfg(any(feature = "plugin-stylus", feature = "plugin-typescript"))]
use crate::plugins;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct CompilerRegistry {
    compilers: Vec<Arc<dyn CompilerPlugin>>,
    by_mime_type: HashMap<String, Arc<dyn CompilerPlugin>>,
}

impl CompilerRegistry {
    /// Registry with the built-in compilers and their default options.
    pub fn new() -> Self {
        Self::from_config(&CompilerConfigFile::default())
    }

    /// Registry with no compilers.
    pub fn empty() -> Self {
        Self {
            compilers: Vec::new(),
            by_mime_type: HashMap::new(),
        }
    }

    /// Registry with the built-in compilers, each seeded with the options
    /// configured for its input mime types.
    pub fn from_config(config: &CompilerConfigFile) -> Self {
        let mut registry = Self::empty();
        registry.register_builtin_compilers(config);
        registry
    }

    #[cfg_attr(
        not(any(feature = "plugin-stylus", feature = "plugin-typescript")),
        allow(unused_variables)
    )]
    fn register_builtin_compilers(&mut self, config: &CompilerConfigFile) {
        #[cfg(feature = "plugin-stylus")]
        {
            use plugins::stylus::StylusCompiler;
            let options = config.options_for(<StylusCompiler as Capabilities>::input_mime_types());
            self.register(Arc::new(StylusCompiler::new().with_options(&options)));
        }
        #[cfg(feature = "plugin-typescript")]
        {
            use plugins::typescript::TypeScriptCompiler;
            let options =
                config.options_for(<TypeScriptCompiler as Capabilities>::input_mime_types());
            self.register(Arc::new(TypeScriptCompiler::new().with_options(&options)));
        }
    }

    /// Register `compiler` for each of its input mime types. A later
    /// registration replaces an earlier one for the same mime type.
    pub fn register(&mut self, compiler: Arc<dyn CompilerPlugin>) {
        for mime_type in compiler.capabilities().input_mime_types {
            let previous = self
                .by_mime_type
                .insert(mime_type.to_string(), Arc::clone(&compiler));
            match previous {
                Some(previous) => tracing::warn!(
                    mime_type,
                    replaced = previous.name(),
                    compiler = compiler.name(),
                    "compiler replaced for mime type"
                ),
                None => {
                    tracing::debug!(mime_type, compiler = compiler.name(), "registered compiler")
                }
            }
        }
        self.compilers.push(compiler);
    }

    pub fn find(&self, mime_type: &str) -> Option<Arc<dyn CompilerPlugin>> {
        self.by_mime_type.get(mime_type).cloned()
    }

    /// Compiler for a file, by its extension's mime type.
    pub fn find_for_path(&self, path: &Path) -> Option<Arc<dyn CompilerPlugin>> {
        mime_type_for_path(path).and_then(|mime_type| self.find(mime_type))
    }

    /// Registered input mime types, sorted.
    pub fn mime_types(&self) -> Vec<&str> {
        let mut mime_types: Vec<&str> = self.by_mime_type.keys().map(String::as_str).collect();
        mime_types.sort_unstable();
        mime_types
    }

    pub fn list(&self) -> Vec<CompilerInfo> {
        self.compilers
            .iter()
            .map(|compiler| {
                let capabilities = compiler.capabilities();
                CompilerInfo {
                    name: compiler.name().to_string(),
                    input_mime_types: capabilities
                        .input_mime_types
                        .iter()
                        .map(|mime| mime.to_string())
                        .collect(),
                    output_mime_type: capabilities.output_mime_type.to_string(),
                    compiler_version: (capabilities.compiler_version)().ok(),
                }
            })
            .collect()
    }
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Input mime type for a dialect source file, by extension.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "styl" => Some("text/stylus"),
        "ts" => Some("text/typescript"),
        "tsx" => Some("text/tsx"),
        _ => None,
    }
}
