//! Contract extraction.
//!
//! A function's contracts are its unbroken prefix of guard statements:
//! `if <cond> { panic(<msg>) }` or `if <cond> { return ..., <error> }`.
//! Extraction stops at the first statement that is not such a guard.

use crate::contract::{Contract, FunctionContract, PackageFacts};
use crate::eval::{Value, MAX_DEPTH};
use crate::expr::Expression;
use crate::source::{FunctionDecl, LiteralKind, ResultType, SourceExpr, Statement, UnitSyntax};
use indexmap::IndexMap;
use smol_str::SmolStr;
use thiserror::Error;

/// An expression node outside the expression model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported expression: {description}")]
pub struct UnsupportedExpression {
    pub description: SmolStr,
}

/// Convert a lowered expression into the expression model, substituting
/// constant identifiers with their folded text. Trees nested deeper than
/// `MAX_DEPTH` are unsupported.
pub fn render_expression(expr: &SourceExpr) -> Result<Expression, UnsupportedExpression> {
    render_at(expr, 0)
}

fn render_at(expr: &SourceExpr, depth: usize) -> Result<Expression, UnsupportedExpression> {
    if depth >= MAX_DEPTH {
        return Err(UnsupportedExpression {
            description: format!("expression nested deeper than {} levels", MAX_DEPTH).into(),
        });
    }
    match expr {
        SourceExpr::Literal { text, .. } => Ok(Expression::Literal(text.clone())),
        SourceExpr::Identifier {
            constant: Some(value),
            ..
        } => Ok(Expression::Literal(value.clone())),
        SourceExpr::Identifier { name, constant: None } => Ok(Expression::Identifier(name.clone())),
        SourceExpr::Binary { op, left, right } => Ok(Expression::binary(
            *op,
            render_at(left, depth + 1)?,
            render_at(right, depth + 1)?,
        )),
        SourceExpr::Unsupported { description } => Err(UnsupportedExpression {
            description: description.clone(),
        }),
    }
}

/// Try to read one statement as a guard over `parameter_names`.
///
/// Returns `None` for anything that is not a guard, including guards whose
/// condition depends on no parameter once constants are folded.
pub fn contract_from_statement(stmt: &Statement, parameter_names: &[SmolStr]) -> Option<Contract> {
    let Statement::If {
        position,
        condition,
        body,
        has_else: false,
    } = stmt
    else {
        return None;
    };

    let [terminator] = body.as_slice() else {
        return None;
    };

    let message = match terminator {
        Statement::Abort { arguments, .. } => match arguments.as_slice() {
            [argument] => literal_message(argument),
            _ => return None,
        },
        Statement::Return { results, .. } if results.contains(&ResultType::Error) => String::new(),
        _ => return None,
    };

    let condition = render_expression(condition).ok()?;
    let free_variables: indexmap::IndexSet<SmolStr> = condition
        .identifiers()
        .into_iter()
        .filter(|name| parameter_names.contains(name))
        .collect();
    if free_variables.is_empty() {
        return None;
    }

    let message = if message.is_empty() {
        format!("should be false: {}", condition)
    } else {
        message
    };

    Some(Contract {
        position: position.clone(),
        condition,
        free_variables,
        message,
    })
}

fn literal_message(argument: &SourceExpr) -> String {
    match argument {
        SourceExpr::Literal {
            kind: LiteralKind::String,
            text,
        } => match Value::parse_literal(text) {
            Ok(Value::Str(decoded)) => decoded.to_string(),
            _ => text.trim_matches(|c| c == '"' || c == '`').to_string(),
        },
        SourceExpr::Literal { text, .. } => text.to_string(),
        _ => String::new(),
    }
}

/// Extract the leading guards of `body`.
pub fn extract(body: &[Statement], parameter_names: &[SmolStr]) -> Option<FunctionContract> {
    if parameter_names.is_empty() {
        return None;
    }

    let contracts: Vec<Contract> = body
        .iter()
        .map_while(|stmt| contract_from_statement(stmt, parameter_names))
        .collect();

    if contracts.is_empty() {
        return None;
    }

    Some(FunctionContract {
        parameter_names: parameter_names.to_vec(),
        contracts,
    })
}

pub fn extract_function(decl: &FunctionDecl) -> Option<FunctionContract> {
    let body = decl.body.as_ref()?;
    extract(body, &decl.parameter_names)
}

/// Extract the facts of every function with a body in `unit`.
pub fn extract_unit(unit: &UnitSyntax) -> PackageFacts {
    let mut functions = IndexMap::new();
    for decl in &unit.functions {
        if let Some(contract) = extract_function(decl) {
            functions.insert(decl.id, contract);
        }
    }

    let facts = PackageFacts {
        unit_name: unit.name.clone(),
        functions,
    };
    tracing::debug!(
        unit = %facts.unit_name,
        functions = unit.functions.len(),
        contracts = facts.contract_count(),
        "extracted package facts"
    );
    facts
}

impl PackageFacts {
    pub fn extract(unit: &UnitSyntax) -> Self {
        extract_unit(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;
    use crate::source::FunctionId;
    use arguard_diagnostics::Position;
    use pretty_assertions::assert_eq;

    fn pos(line: u32) -> Position {
        Position::new("p.ag", line, 2)
    }

    fn params(names: &[&str]) -> Vec<SmolStr> {
        names.iter().map(|n| SmolStr::new(n)).collect()
    }

    fn panic_guard(line: u32, condition: SourceExpr, message: &str) -> Statement {
        Statement::If {
            position: pos(line),
            condition,
            body: vec![Statement::Abort {
                position: pos(line + 1),
                arguments: vec![SourceExpr::string(message)],
            }],
            has_else: false,
        }
    }

    fn eq(name: &str, value: &str) -> SourceExpr {
        SourceExpr::binary(BinaryOp::Eq, SourceExpr::variable(name), SourceExpr::int(value))
    }

    #[test]
    fn test_render_folds_constants() {
        let expr = SourceExpr::binary(
            BinaryOp::Gt,
            SourceExpr::variable("n"),
            SourceExpr::constant("Max", "10"),
        );
        assert_eq!(render_expression(&expr).unwrap().to_string(), "n > 10");
    }

    #[test]
    fn test_render_rejects_unsupported() {
        let expr = SourceExpr::binary(
            BinaryOp::Eq,
            SourceExpr::unsupported("call len(s)"),
            SourceExpr::int("0"),
        );
        assert_eq!(
            render_expression(&expr),
            Err(UnsupportedExpression {
                description: "call len(s)".into()
            })
        );
    }

    #[test]
    fn test_panic_guard_message() {
        let stmt = panic_guard(3, eq("in", "0"), r#""must not be zero""#);
        let contract = contract_from_statement(&stmt, &params(&["in"])).unwrap();
        assert_eq!(contract.message, "must not be zero");
        assert_eq!(contract.condition.to_string(), "in == 0");
        assert_eq!(contract.position, pos(3));
        assert_eq!(contract.free_variables.len(), 1);
    }

    #[test]
    fn test_non_string_literal_message_keeps_raw_text() {
        let stmt = Statement::If {
            position: pos(3),
            condition: eq("in", "0"),
            body: vec![Statement::Abort {
                position: pos(4),
                arguments: vec![SourceExpr::int("42")],
            }],
            has_else: false,
        };
        let contract = contract_from_statement(&stmt, &params(&["in"])).unwrap();
        assert_eq!(contract.message, "42");
    }

    #[test]
    fn test_return_guard_uses_default_message() {
        let stmt = Statement::If {
            position: pos(3),
            condition: eq("n", "0"),
            body: vec![Statement::Return {
                position: pos(4),
                results: vec![ResultType::Other, ResultType::Error],
            }],
            has_else: false,
        };
        let contract = contract_from_statement(&stmt, &params(&["n"])).unwrap();
        assert_eq!(contract.message, "should be false: n == 0");
    }

    #[test]
    fn test_shapes_that_are_not_guards() {
        let names = params(&["x"]);
        let abort = |args: Vec<SourceExpr>| Statement::Abort {
            position: pos(4),
            arguments: args,
        };
        let guard = |body: Vec<Statement>, has_else: bool| Statement::If {
            position: pos(3),
            condition: eq("x", "1"),
            body,
            has_else,
        };

        assert!(contract_from_statement(&guard(vec![], false), &names).is_none());
        assert!(contract_from_statement(
            &guard(vec![abort(vec![SourceExpr::string(r#""a""#)])], true),
            &names
        )
        .is_none());
        assert!(contract_from_statement(
            &guard(
                vec![Statement::Other { position: pos(4) }, abort(vec![SourceExpr::string(r#""a""#)])],
                false
            ),
            &names
        )
        .is_none());
        assert!(contract_from_statement(&guard(vec![abort(vec![])], false), &names).is_none());
        let non_error_return = Statement::Return {
            position: pos(4),
            results: vec![ResultType::Other],
        };
        assert!(contract_from_statement(&guard(vec![non_error_return], false), &names).is_none());
    }

    #[test]
    fn test_constant_only_condition_is_discarded() {
        let condition = SourceExpr::binary(BinaryOp::Eq, SourceExpr::int("12"), SourceExpr::int("12"));
        let stmt = panic_guard(3, condition, r#""never""#);
        assert!(contract_from_statement(&stmt, &params(&["x"])).is_none());

        let folded = SourceExpr::binary(
            BinaryOp::Eq,
            SourceExpr::constant("Limit", "12"),
            SourceExpr::int("12"),
        );
        let stmt = panic_guard(3, folded, r#""never""#);
        assert!(contract_from_statement(&stmt, &params(&["x"])).is_none());
    }

    #[test]
    fn test_free_variables_exclude_non_parameters() {
        let condition = SourceExpr::binary(
            BinaryOp::And,
            eq("x", "1"),
            SourceExpr::binary(BinaryOp::Eq, SourceExpr::variable("global"), SourceExpr::int("2")),
        );
        let stmt = panic_guard(3, condition, r#""x""#);
        let contract = contract_from_statement(&stmt, &params(&["x", "y"])).unwrap();
        let names: Vec<_> = contract.free_variables.iter().cloned().collect();
        assert_eq!(names, params(&["x"]));
    }

    #[test]
    fn test_extraction_stops_at_first_mismatch() {
        let body = vec![
            panic_guard(2, eq("x", "1"), r#""x is one""#),
            panic_guard(5, eq("y", "2"), r#""y is two""#),
            Statement::Other { position: pos(8) },
            panic_guard(9, eq("x", "3"), r#""unreachable""#),
        ];
        let contract = extract(&body, &params(&["x", "y"])).unwrap();
        let messages: Vec<_> = contract.contracts.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["x is one", "y is two"]);
    }

    #[test]
    fn test_constant_only_guard_ends_the_prefix() {
        let body = vec![
            panic_guard(2, eq("x", "1"), r#""x is one""#),
            panic_guard(
                5,
                SourceExpr::binary(BinaryOp::Eq, SourceExpr::int("12"), SourceExpr::int("12")),
                r#""never""#,
            ),
            panic_guard(8, eq("x", "3"), r#""x is three""#),
        ];
        let contract = extract(&body, &params(&["x"])).unwrap();
        let messages: Vec<_> = contract.contracts.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["x is one"]);
    }

    fn nested_sum(terms: usize) -> SourceExpr {
        let mut expr = SourceExpr::variable("x");
        for _ in 1..terms {
            expr = SourceExpr::binary(BinaryOp::Add, expr, SourceExpr::int("1"));
        }
        expr
    }

    #[test]
    fn test_deep_conditions_are_unsupported() {
        let shallow = SourceExpr::binary(BinaryOp::Gt, nested_sum(100), SourceExpr::int("0"));
        assert!(render_expression(&shallow).is_ok());

        let deep = SourceExpr::binary(BinaryOp::Gt, nested_sum(MAX_DEPTH + 100), SourceExpr::int("0"));
        let error = render_expression(&deep).unwrap_err();
        assert_eq!(
            error.to_string(),
            "unsupported expression: expression nested deeper than 512 levels"
        );

        let body = vec![
            panic_guard(2, deep, r#""deep""#),
            panic_guard(5, eq("x", "3"), r#""x is three""#),
        ];
        assert!(extract(&body, &params(&["x"])).is_none());
    }

    #[test]
    fn test_no_contract_without_parameters_or_guards() {
        let body = vec![panic_guard(2, eq("x", "1"), r#""x""#)];
        assert!(extract(&body, &[]).is_none());
        assert!(extract(&[Statement::Other { position: pos(2) }], &params(&["x"])).is_none());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let decl = FunctionDecl {
            id: FunctionId::function("p", "F"),
            name: "F".into(),
            position: pos(1),
            parameter_names: params(&["in"]),
            body: Some(vec![panic_guard(2, eq("in", "0"), r#""must not be zero""#)]),
        };
        assert_eq!(extract_function(&decl), extract_function(&decl));
    }

    #[test]
    fn test_extract_unit_skips_bodiless_functions() {
        let guarded = FunctionDecl {
            id: FunctionId::function("p", "F"),
            name: "F".into(),
            position: pos(1),
            parameter_names: params(&["in"]),
            body: Some(vec![panic_guard(2, eq("in", "0"), r#""zero""#)]),
        };
        let external = FunctionDecl {
            id: FunctionId::function("p", "G"),
            name: "G".into(),
            position: pos(6),
            parameter_names: params(&["in"]),
            body: None,
        };
        let unit = UnitSyntax {
            name: "p".into(),
            functions: vec![guarded, external],
            ..UnitSyntax::default()
        };
        let facts = PackageFacts::extract(&unit);
        assert_eq!(facts.unit_name, "p");
        assert_eq!(facts.functions.len(), 1);
        assert_eq!(facts.contract_count(), 1);
    }
}
