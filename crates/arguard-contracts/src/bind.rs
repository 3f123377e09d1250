//! Call-site binding.

use crate::contract::FunctionContract;
use crate::expr::Expression;
use crate::extract::render_expression;
use crate::source::SourceExpr;
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Parameter name to constant argument, for one call site.
///
/// Usually a strict subset of the callee's parameters: arguments that are
/// not constant are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArguments {
    values: IndexMap<SmolStr, Expression>,
}

impl BoundArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<SmolStr>, value: Expression) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Expression)> {
        self.values.iter()
    }

    /// Canonical constant text of a bound parameter.
    pub fn canonical_text(&self, name: &str) -> Option<String> {
        self.get(name).map(|expr| expr.to_string())
    }
}

/// Bind the actual arguments of a call to the callee's parameters.
pub fn bind(arguments: &[SourceExpr], contract: &FunctionContract) -> BoundArguments {
    let mut binding = BoundArguments::new();
    if arguments.len() != contract.parameter_names.len() {
        tracing::trace!(
            arguments = arguments.len(),
            parameters = contract.parameter_names.len(),
            "arity mismatch, binding nothing"
        );
        return binding;
    }

    for (name, argument) in contract.parameter_names.iter().zip(arguments) {
        match render_expression(argument) {
            Ok(expr) if expr.is_closed() => binding.insert(name.clone(), expr),
            Ok(expr) => tracing::trace!(parameter = %name, argument = %expr, "argument is not constant"),
            Err(e) => tracing::trace!(parameter = %name, "{}", e),
        }
    }
    binding
}
