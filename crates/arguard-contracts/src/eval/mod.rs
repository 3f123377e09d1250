//! Condition evaluation.
//!
//! A small tree-walking evaluator over [`Expression`]. It cannot perform
//! I/O, touches no state outside its own [`Environment`], and turns every
//! runtime fault (overflow, division by zero, type mismatch, runaway
//! nesting) into an [`EvaluationError`].

mod environment;
mod value;

pub use environment::Environment;
pub use value::Value;

use crate::bind::BoundArguments;
use crate::expr::{BinaryOp, Expression};
use smol_str::SmolStr;
use thiserror::Error;

/// Maximum expression nesting the evaluator descends into.
pub const MAX_DEPTH: usize = 512;

/// Why a condition could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("invalid literal `{text}`")]
    InvalidLiteral { text: SmolStr },

    #[error("undefined: {name}")]
    UnboundIdentifier { name: SmolStr },

    #[error("invalid operation: {operation}")]
    InvalidOperation { operation: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("constant overflow")]
    Overflow,

    #[error("negative shift count")]
    NegativeShift,

    #[error("condition result: expected bool, found {found}")]
    NotBoolean { found: &'static str },

    #[error("expression nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error("set value for {name}: {source}")]
    Binding {
        name: SmolStr,
        source: Box<EvaluationError>,
    },
}

/// Evaluate `condition` against `binding` in a fresh environment.
///
/// Every bound argument is evaluated and declared first; the condition must
/// then produce a boolean.
pub fn evaluate(condition: &Expression, binding: &BoundArguments) -> Result<bool, EvaluationError> {
    let mut evaluator = Evaluator::with_binding(binding)?;
    match evaluator.eval(condition)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvaluationError::NotBoolean {
            found: other.type_name(),
        }),
    }
}

/// Evaluate an identifier-free expression.
pub fn evaluate_closed(expr: &Expression) -> Result<Value, EvaluationError> {
    Evaluator::new().eval(expr)
}

/// Tree-walking evaluator with a depth guard.
#[derive(Debug, Default)]
pub struct Evaluator {
    env: Environment,
    depth: usize,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator whose environment holds every bound argument.
    pub fn with_binding(binding: &BoundArguments) -> Result<Self, EvaluationError> {
        let mut env = Environment::new();
        for (name, expr) in binding.iter() {
            let value = evaluate_closed(expr).map_err(|e| EvaluationError::Binding {
                name: name.clone(),
                source: Box::new(e),
            })?;
            env.define(name.clone(), value);
        }
        Ok(Self { env, depth: 0 })
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn eval(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvaluationError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let result = self.eval_expr(expr);
        self.depth -= 1;
        result
    }

    fn eval_expr(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Literal(text) => Value::parse_literal(text),
            Expression::Identifier(name) => {
                self.env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvaluationError::UnboundIdentifier { name: name.clone() })
            }
            Expression::Binary { op, left, right } => self.eval_binary(*op, left, right),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
    ) -> Result<Value, EvaluationError> {
        let lhs = self.eval(left)?;

        // Short-circuit for logical operators
        match (op, &lhs) {
            (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
            _ => {}
        }

        let rhs = self.eval(right)?;
        Value::binary(op, &lhs, &rhs)
    }
}
