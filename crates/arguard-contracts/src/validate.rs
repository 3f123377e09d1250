//! Contract validation for one call site.

use crate::bind::BoundArguments;
use crate::contract::{Contract, FunctionContract};
use crate::eval::{evaluate, EvaluationError};
use crate::expr::Expression;
use std::fmt;

/// A condition that could not be evaluated for a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFailure {
    pub condition: Expression,
    pub error: EvaluationError,
}

impl fmt::Display for EvaluationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run `{}`: {}", self.condition, self.error)
    }
}

/// Outcome of validating one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<'c> {
    /// The first contract whose condition held
    Violated(&'c Contract),
    /// No violation, but some contract failed to evaluate (the first one)
    Failed(EvaluationFailure),
    NoViolation,
}

impl Verdict<'_> {
    pub fn is_violation(&self) -> bool {
        matches!(self, Verdict::Violated(_))
    }
}

/// Check `binding` against every contract in declaration order.
///
/// A violation ends the walk and wins over any earlier evaluation failure.
/// Contracts that depend on an unbound name are inconclusive and skipped.
pub fn validate<'c>(function: &'c FunctionContract, binding: &BoundArguments) -> Verdict<'c> {
    let mut first_failure = None;

    for contract in &function.contracts {
        if !is_decidable(contract, binding) {
            tracing::trace!(condition = %contract.condition, "inconclusive, skipping");
            continue;
        }

        match evaluate(&contract.condition, binding) {
            Ok(true) => return Verdict::Violated(contract),
            Ok(false) => {}
            Err(error) => {
                tracing::trace!(condition = %contract.condition, %error, "evaluation failed");
                if first_failure.is_none() {
                    first_failure = Some(EvaluationFailure {
                        condition: contract.condition.clone(),
                        error,
                    });
                }
            }
        }
    }

    match first_failure {
        Some(failure) => Verdict::Failed(failure),
        None => Verdict::NoViolation,
    }
}

fn is_decidable(contract: &Contract, binding: &BoundArguments) -> bool {
    contract.free_variables.iter().all(|name| binding.contains(name))
        && contract
            .condition
            .identifiers()
            .iter()
            .all(|name| binding.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;
    use arguard_diagnostics::Position;
    use indexmap::IndexSet;
    use pretty_assertions::assert_eq;
    use smol_str::SmolStr;

    fn contract(condition: Expression, message: &str) -> Contract {
        let free_variables: IndexSet<SmolStr> = condition.identifiers();
        Contract {
            position: Position::default(),
            condition,
            free_variables,
            message: message.to_string(),
        }
    }

    fn eq(name: &str, value: &str) -> Expression {
        Expression::binary(BinaryOp::Eq, Expression::identifier(name), Expression::literal(value))
    }

    fn two_guards() -> FunctionContract {
        FunctionContract {
            parameter_names: vec!["x".into(), "y".into()],
            contracts: vec![contract(eq("x", "1"), "x is one"), contract(eq("y", "2"), "y is two")],
        }
    }

    fn binding(pairs: &[(&str, &str)]) -> BoundArguments {
        let mut b = BoundArguments::new();
        for (name, value) in pairs {
            b.insert(*name, Expression::literal(*value));
        }
        b
    }

    #[test]
    fn test_first_violation_only() {
        let function = two_guards();
        match validate(&function, &binding(&[("x", "1"), ("y", "2")])) {
            Verdict::Violated(c) => assert_eq!(c.message, "x is one"),
            other => panic!("expected violation, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_binding_is_inconclusive() {
        let function = two_guards();
        assert_eq!(validate(&function, &binding(&[])), Verdict::NoViolation);
        match validate(&function, &binding(&[("y", "2")])) {
            Verdict::Violated(c) => assert_eq!(c.message, "y is two"),
            other => panic!("expected violation, got {:?}", other),
        }
    }

    #[test]
    fn test_violation_wins_over_failure() {
        let function = FunctionContract {
            parameter_names: vec!["x".into(), "y".into()],
            contracts: vec![
                contract(eq("x", r#""a""#), "x is a"),
                contract(eq("y", "2"), "y is two"),
            ],
        };
        let verdict = validate(&function, &binding(&[("x", "1"), ("y", "2")]));
        assert!(verdict.is_violation());
    }

    #[test]
    fn test_first_failure_is_kept() {
        let function = FunctionContract {
            parameter_names: vec!["x".into()],
            contracts: vec![
                contract(eq("x", r#""a""#), "first"),
                contract(Expression::binary(BinaryOp::Div, Expression::literal("1"), Expression::identifier("x")), "second"),
            ],
        };
        match validate(&function, &binding(&[("x", "0")])) {
            Verdict::Failed(failure) => {
                assert_eq!(
                    failure.to_string(),
                    r#"run `x == "a"`: invalid operation: int == string"#
                );
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unbound_non_parameter_is_skipped() {
        let mut guard = contract(
            Expression::binary(BinaryOp::Eq, Expression::identifier("err"), Expression::identifier("nil")),
            "nil error",
        );
        guard.free_variables = IndexSet::from([SmolStr::new("err")]);
        let function = FunctionContract {
            parameter_names: vec!["err".into()],
            contracts: vec![guard],
        };
        assert_eq!(validate(&function, &binding(&[("err", "1")])), Verdict::NoViolation);
    }
}
