//! Process-wide, lazily initialized compiler library handles.

use crate::errors::CompilerError;
use std::sync::OnceLock;

/// A compiler library loaded on first use and shared read-only afterwards.
///
/// Initialization runs at most once per cell, even when several compiles
/// race on first use. A failed load is remembered: every later `get`
/// returns the same `Initialization` error without retrying.
pub struct LazyLibrary<L> {
    name: &'static str,
    cell: OnceLock<Result<L, String>>,
    loader: fn() -> Result<L, CompilerError>,
}

impl<L> LazyLibrary<L> {
    pub const fn new(name: &'static str, loader: fn() -> Result<L, CompilerError>) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
            loader,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The loaded library, initializing it on the first call.
    pub fn get(&self) -> Result<&L, CompilerError> {
        let loaded = self.cell.get_or_init(|| {
            tracing::debug!(library = self.name, "initializing compiler library");
            (self.loader)().map_err(|e| match e {
                CompilerError::Initialization(message) => message,
                other => other.to_string(),
            })
        });
        match loaded {
            Ok(library) => Ok(library),
            Err(message) => Err(CompilerError::Initialization(format!(
                "{}: {}",
                self.name, message
            ))),
        }
    }

    /// Whether a load has been attempted (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}
