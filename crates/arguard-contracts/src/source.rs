//! Front-end boundary.
//!
//! A front-end lowers its own syntax tree into these types. Nothing in the
//! engine looks at host-language syntax beyond this module.

use crate::expr::BinaryOp;
use arguard_diagnostics::Position;
use internment::Intern;
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Symbol key of a declared function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionPath {
    /// Name of the unit declaring the function
    pub unit: SmolStr,
    /// Receiver type name for methods
    pub receiver: Option<SmolStr>,
    pub name: SmolStr,
}

/// Stable, interned function identity.
///
/// Two ids are equal exactly when unit, receiver and name agree, so
/// same-named functions on different receivers or in different units never
/// collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(Intern<FunctionPath>);

impl FunctionId {
    pub fn new(unit: &str, receiver: Option<&str>, name: &str) -> Self {
        FunctionId(Intern::new(FunctionPath {
            unit: SmolStr::new(unit),
            receiver: receiver.map(SmolStr::new),
            name: SmolStr::new(name),
        }))
    }

    pub fn function(unit: &str, name: &str) -> Self {
        Self::new(unit, None, name)
    }

    pub fn method(unit: &str, receiver: &str, name: &str) -> Self {
        Self::new(unit, Some(receiver), name)
    }

    pub fn unit(&self) -> &str {
        &self.0.unit
    }

    pub fn receiver(&self) -> Option<&str> {
        self.0.receiver.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.receiver() {
            Some(receiver) => write!(f, "{}.{}.{}", self.unit(), receiver, self.name()),
            None => write!(f, "{}.{}", self.unit(), self.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Char,
    String,
}

/// An expression as lowered by the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceExpr {
    /// Literal with its exact source text
    Literal { kind: LiteralKind, text: SmolStr },
    /// Identifier; `constant` holds the exact folded value text when the
    /// front-end proved the name is a compile-time constant
    Identifier {
        name: SmolStr,
        constant: Option<SmolStr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SourceExpr>,
        right: Box<SourceExpr>,
    },
    /// Anything else: calls, selectors, indexing, unary operators
    Unsupported { description: SmolStr },
}

impl SourceExpr {
    pub fn int(text: &str) -> Self {
        SourceExpr::Literal {
            kind: LiteralKind::Int,
            text: text.into(),
        }
    }

    pub fn string(text: &str) -> Self {
        SourceExpr::Literal {
            kind: LiteralKind::String,
            text: text.into(),
        }
    }

    pub fn variable(name: &str) -> Self {
        SourceExpr::Identifier {
            name: name.into(),
            constant: None,
        }
    }

    pub fn constant(name: &str, value: &str) -> Self {
        SourceExpr::Identifier {
            name: name.into(),
            constant: Some(value.into()),
        }
    }

    pub fn binary(op: BinaryOp, left: SourceExpr, right: SourceExpr) -> Self {
        SourceExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unsupported(description: &str) -> Self {
        SourceExpr::Unsupported {
            description: description.into(),
        }
    }
}

/// Static type class of one returned expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Error,
    Other,
}

/// A function body statement, reduced to the shapes guards are made of.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    If {
        position: Position,
        condition: SourceExpr,
        body: Vec<Statement>,
        has_else: bool,
    },
    /// Unconditional abort (`panic(...)`)
    Abort {
        position: Position,
        arguments: Vec<SourceExpr>,
    },
    Return {
        position: Position,
        results: Vec<ResultType>,
    },
    Other { position: Position },
}

impl Statement {
    pub fn position(&self) -> &Position {
        match self {
            Statement::If { position, .. }
            | Statement::Abort { position, .. }
            | Statement::Return { position, .. }
            | Statement::Other { position } => position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub id: FunctionId,
    pub name: SmolStr,
    pub position: Position,
    /// Declaration order; unnamed parameters carry synthetic names
    pub parameter_names: Vec<SmolStr>,
    /// `None` for declarations without a body
    pub body: Option<Vec<Statement>>,
}

/// One import occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub name: SmolStr,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub position: Position,
    /// `None` when the callee is not a statically known function
    pub callee: Option<FunctionId>,
    pub arguments: Vec<SourceExpr>,
}

/// Everything the engine needs to know about one unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitSyntax {
    pub name: SmolStr,
    pub functions: Vec<FunctionDecl>,
    /// Source order across all files, duplicates included
    pub imports: Vec<Import>,
    /// Pre-order source order
    pub calls: Vec<CallSite>,
}

/// Errors a front-end reports when a unit cannot be provided.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrontendError {
    #[error("cannot find unit `{unit}`")]
    UnitNotFound { unit: SmolStr },

    #[error("read {path}: {message}")]
    Io { path: String, message: String },

    #[error("parse unit `{unit}`: {message}")]
    Syntax { unit: SmolStr, message: String },
}

/// Provider of lowered units.
pub trait Frontend {
    fn load_unit(&self, name: &str) -> Result<UnitSyntax, FrontendError>;
}

impl<F: Frontend + ?Sized> Frontend for &F {
    fn load_unit(&self, name: &str) -> Result<UnitSyntax, FrontendError> {
        (**self).load_unit(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_ids_are_distinct_per_receiver_and_unit() {
        let free = FunctionId::function("p", "Write");
        let on_buffer = FunctionId::method("p", "Buffer", "Write");
        let on_file = FunctionId::method("p", "File", "Write");
        let elsewhere = FunctionId::function("q", "Write");

        assert_ne!(free, on_buffer);
        assert_ne!(on_buffer, on_file);
        assert_ne!(free, elsewhere);
        assert_eq!(on_buffer, FunctionId::method("p", "Buffer", "Write"));
    }

    #[test]
    fn test_function_id_accessors() {
        let id = FunctionId::method("lib", "Buffer", "Grow");
        assert_eq!(id.unit(), "lib");
        assert_eq!(id.receiver(), Some("Buffer"));
        assert_eq!(id.name(), "Grow");
        assert_eq!(id.to_string(), "lib.Buffer.Grow");
        assert_eq!(FunctionId::function("p", "F1").to_string(), "p.F1");
    }

    #[test]
    fn test_frontend_error_messages() {
        let error = FrontendError::UnitNotFound { unit: "lib".into() };
        assert_eq!(error.to_string(), "cannot find unit `lib`");
    }
}
