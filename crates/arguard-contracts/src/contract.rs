//! Contract facts.

use crate::expr::Expression;
use crate::source::FunctionId;
use arguard_diagnostics::Position;
use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

/// An inferred precondition.
///
/// `condition` is the guard's own condition: when it evaluates to `true`
/// for a binding, the contract is violated.
#[derive(Debug, Clone)]
pub struct Contract {
    /// Position of the guard; reporting only
    pub position: Position,
    pub condition: Expression,
    /// Parameters the condition depends on, first-occurrence order
    pub free_variables: IndexSet<SmolStr>,
    /// Never empty
    pub message: String,
}

/// Positions are ignored: two extractions of the same guard compare equal
/// wherever the guard was seen from.
impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.condition == other.condition
            && self.free_variables == other.free_variables
            && self.message == other.message
    }
}

impl Eq for Contract {}

/// The contracts of one function. Both sequences are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionContract {
    pub parameter_names: Vec<SmolStr>,
    pub contracts: Vec<Contract>,
}

/// All function contracts of one unit, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageFacts {
    pub unit_name: SmolStr,
    pub functions: IndexMap<FunctionId, FunctionContract>,
}

impl PackageFacts {
    pub fn new(unit_name: impl Into<SmolStr>) -> Self {
        Self {
            unit_name: unit_name.into(),
            functions: IndexMap::new(),
        }
    }

    pub fn get(&self, id: &FunctionId) -> Option<&FunctionContract> {
        self.functions.get(id)
    }

    /// Every contract of every function, declaration order.
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.functions.values().flat_map(|f| f.contracts.iter())
    }

    pub fn contract_count(&self) -> usize {
        self.functions.values().map(|f| f.contracts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    fn contract_at(line: u32) -> Contract {
        Contract {
            position: Position::new("p.ag", line, 2),
            condition: Expression::binary(
                BinaryOp::Eq,
                Expression::identifier("in"),
                Expression::literal("0"),
            ),
            free_variables: IndexSet::from([SmolStr::new("in")]),
            message: "must not be zero".to_string(),
        }
    }

    #[test]
    fn test_equality_ignores_position() {
        assert_eq!(contract_at(4), contract_at(40));

        let mut other = contract_at(4);
        other.message = "different".to_string();
        assert_ne!(contract_at(4), other);
    }

    #[test]
    fn test_package_facts_iteration() {
        let mut facts = PackageFacts::new("p");
        facts.functions.insert(
            FunctionId::function("p", "F"),
            FunctionContract {
                parameter_names: vec!["in".into()],
                contracts: vec![contract_at(4), contract_at(7)],
            },
        );
        assert_eq!(facts.contract_count(), 2);
        assert_eq!(facts.contracts().count(), 2);
        assert!(facts.get(&FunctionId::function("p", "F")).is_some());
        assert!(facts.get(&FunctionId::function("p", "G")).is_none());
    }
}
