//! Errors surfaced by an analysis run.

use crate::source::FrontendError;
use smol_str::SmolStr;
use thiserror::Error;

/// A followed import that could not be loaded.
///
/// Cached by the registry, so every importing unit sees the same error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{source}")]
pub struct DependencyLoadError {
    pub unit: SmolStr,
    pub source: FrontendError,
}

impl DependencyLoadError {
    pub fn new(unit: impl Into<SmolStr>, source: FrontendError) -> Self {
        Self {
            unit: unit.into(),
            source,
        }
    }
}
