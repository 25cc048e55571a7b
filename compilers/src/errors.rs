//! Error types for dialect compiler plugins.

use crate::plugin::CompileDiagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Compiler plugin error.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// The underlying compiler rejected the input.
    #[error("failed to compile {}: {diagnostic}", file.display())]
    Compile {
        file: PathBuf,
        diagnostic: CompileDiagnostic,
    },

    /// The underlying compiler library could not be loaded.
    #[error("compiler initialization failed: {0}")]
    Initialization(String),

    /// The compiler host process failed outside of compilation.
    #[error("compiler host failed: {0}")]
    Driver(String),

    /// Invalid compiler configuration file.
    #[error("invalid config: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompilerError {
    pub(crate) fn compile(file: &Path, diagnostic: CompileDiagnostic) -> Self {
        CompilerError::Compile {
            file: file.to_path_buf(),
            diagnostic,
        }
    }

    /// The compiler diagnostic, when this is a compilation failure.
    pub fn diagnostic(&self) -> Option<&CompileDiagnostic> {
        match self {
            CompilerError::Compile { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}
