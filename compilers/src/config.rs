//! Per-project compiler configuration.
//!
//! ```toml
//! [compilers."text/stylus"]
//! import = "nib"
//!
//! [compilers."text/typescript"]
//! doSemanticChecks = false
//! ```

use crate::errors::CompilerError;
use crate::options::PluginOptions;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const CONFIG_FILES: &[&str] = &[".dialectc.toml", "dialectc.toml"];

#[derive(Debug, Default, Deserialize)]
pub struct CompilerConfigFile {
    /// Default options keyed by input mime type.
    #[serde(default)]
    pub compilers: IndexMap<String, IndexMap<String, Value>>,
}

impl CompilerConfigFile {
    /// Load the first config file found in `project_dir`, or defaults.
    pub fn load(project_dir: &Path) -> Result<Self, CompilerError> {
        for name in CONFIG_FILES {
            let candidate = project_dir.join(name);
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CompilerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CompilerError::Config(format!(
                "Failed to read compiler config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content).map_err(|e| match e {
            CompilerError::Config(message) => CompilerError::Config(format!(
                "Failed to parse compiler config {}: {}",
                path.display(),
                message
            )),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, CompilerError> {
        toml::from_str(content).map_err(|e| CompilerError::Config(e.to_string()))
    }

    /// Options configured for any of `mime_types`, merged in order.
    pub fn options_for(&self, mime_types: &[&str]) -> PluginOptions {
        let mut options = PluginOptions::new();
        for mime_type in mime_types {
            if let Some(section) = self.compilers.get(*mime_type) {
                let section: PluginOptions = section
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                options.merge(&section);
            }
        }
        options
    }
}
