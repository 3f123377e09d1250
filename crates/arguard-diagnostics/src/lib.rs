//! arguard Diagnostics
//!
//! The diagnostic stream produced by an analysis run. Every diagnostic is a
//! `(Position, message)` pair; the [`DiagnosticKind`] only records which of
//! the four message families it belongs to:
//!
//! - `Violation` - a call site whose constant arguments satisfy a contract's
//!   guard condition
//! - `Contract` - debug report of an extracted contract
//! - `InternalError` - a contract could not be evaluated for a call site
//! - `DependencyLoad` - an imported unit could not be loaded
//!
//! # Example
//!
//! ```rust
//! use arguard_diagnostics::{Diagnostic, DiagnosticKind, Position};
//!
//! let position = Position::new("p.ag", 12, 5);
//! let diagnostic = Diagnostic::violation(position, "in == 0", "must not be zero");
//!
//! assert_eq!(diagnostic.kind, DiagnosticKind::Violation);
//! assert_eq!(diagnostic.to_string(), "p.ag:12:5: contract violated (in == 0): must not be zero");
//! ```

pub mod position;
pub mod render;

pub use position::LineIndex;

use smol_str::SmolStr;
use std::fmt;

/// A resolved source location: file path, 1-based line and 1-based byte
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
    pub file: SmolStr,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<SmolStr>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The message family of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Violation,
    Contract,
    InternalError,
    DependencyLoad,
}

impl DiagnosticKind {
    /// Returns the message prefix of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Violation => "contract violated",
            DiagnosticKind::Contract => "contract:",
            DiagnosticKind::InternalError => "validate contracts:",
            DiagnosticKind::DependencyLoad => "load package info:",
        }
    }

    /// Classify a rendered message by its prefix.
    pub fn from_message(message: &str) -> Option<Self> {
        [
            DiagnosticKind::Violation,
            DiagnosticKind::Contract,
            DiagnosticKind::InternalError,
            DiagnosticKind::DependencyLoad,
        ]
        .into_iter()
        .find(|kind| message.starts_with(kind.prefix()))
    }
}

/// A single reported finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub position: Position,
    /// The full message, prefix included.
    pub message: String,
}

impl Diagnostic {
    /// `contract violated (<condition>): <message>`
    pub fn violation(position: Position, condition: impl fmt::Display, message: &str) -> Self {
        Self {
            kind: DiagnosticKind::Violation,
            position,
            message: format!(
                "{} ({}): {}",
                DiagnosticKind::Violation.prefix(),
                condition,
                message
            ),
        }
    }

    /// `contract: <message>`
    pub fn contract(position: Position, message: &str) -> Self {
        Self::prefixed(DiagnosticKind::Contract, position, message)
    }

    /// `validate contracts: <error>`
    pub fn internal_error(position: Position, error: impl fmt::Display) -> Self {
        Self::prefixed(DiagnosticKind::InternalError, position, error)
    }

    /// `load package info: <error>`
    pub fn dependency_load(position: Position, error: impl fmt::Display) -> Self {
        Self::prefixed(DiagnosticKind::DependencyLoad, position, error)
    }

    fn prefixed(kind: DiagnosticKind, position: Position, body: impl fmt::Display) -> Self {
        Self {
            kind,
            position,
            message: format!("{} {}", kind.prefix(), body),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// Receiver of the ordered diagnostic stream.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}
