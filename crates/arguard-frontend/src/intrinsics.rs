//! Built-in units
//!
//! `errors` and `fmt` exist without source files. They declare signatures
//! only, so calls into them resolve but never carry contracts.

use crate::scope::{PackageScope, Signature, TypeInfo};
use arguard_contracts::{FunctionDecl, FunctionId, UnitSyntax};
use arguard_diagnostics::Position;
use smol_str::SmolStr;

struct Intrinsic {
    unit: &'static str,
    name: &'static str,
    params: &'static [&'static str],
    results: &'static [Ret],
}

#[derive(Clone, Copy)]
enum Ret {
    Error,
    Other,
}

const fn intrinsic(
    unit: &'static str,
    name: &'static str,
    params: &'static [&'static str],
    results: &'static [Ret],
) -> Intrinsic {
    Intrinsic {
        unit,
        name,
        params,
        results,
    }
}

const DECLARATIONS: &[Intrinsic] = &[
    intrinsic("errors", "New", &["text"], &[Ret::Error]),
    intrinsic("errors", "Is", &["err", "target"], &[Ret::Other]),
    intrinsic("errors", "Unwrap", &["err"], &[Ret::Error]),
    intrinsic("fmt", "Errorf", &["format", "a"], &[Ret::Error]),
    intrinsic("fmt", "Sprintf", &["format", "a"], &[Ret::Other]),
    intrinsic("fmt", "Sprint", &["a"], &[Ret::Other]),
    intrinsic("fmt", "Println", &["a"], &[Ret::Other, Ret::Error]),
    intrinsic("fmt", "Printf", &["format", "a"], &[Ret::Other, Ret::Error]),
];

impl From<Ret> for TypeInfo {
    fn from(ret: Ret) -> Self {
        match ret {
            Ret::Error => TypeInfo::Error,
            Ret::Other => TypeInfo::Other,
        }
    }
}

/// True for units provided without source
pub fn is_intrinsic(unit: &str) -> bool {
    DECLARATIONS.iter().any(|d| d.unit == unit)
}

fn declarations(unit: &str) -> impl Iterator<Item = &'static Intrinsic> + '_ {
    DECLARATIONS.iter().filter(move |d| d.unit == unit)
}

/// Package scope of an intrinsic unit
pub fn scope(unit: &str) -> Option<PackageScope> {
    if !is_intrinsic(unit) {
        return None;
    }
    let mut scope = PackageScope::new(unit);
    for decl in declarations(unit) {
        let results = decl.results.iter().map(|r| TypeInfo::from(*r)).collect();
        scope
            .functions
            .insert(SmolStr::new(decl.name), Signature::new(decl.params.len(), results));
    }
    Some(scope)
}

/// Lowered form of an intrinsic unit: declarations without bodies
pub fn unit(unit: &str) -> Option<UnitSyntax> {
    if !is_intrinsic(unit) {
        return None;
    }
    let position = Position::new(format!("<{}>", unit), 1, 1);
    let functions = declarations(unit)
        .map(|decl| FunctionDecl {
            id: FunctionId::function(unit, decl.name),
            name: SmolStr::new(decl.name),
            position: position.clone(),
            parameter_names: decl.params.iter().map(|p| SmolStr::new(p)).collect(),
            body: None,
        })
        .collect();

    Some(UnitSyntax {
        name: unit.into(),
        functions,
        ..UnitSyntax::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_units() {
        assert!(is_intrinsic("errors"));
        assert!(is_intrinsic("fmt"));
        assert!(!is_intrinsic("lib"));

        let errors = scope("errors").unwrap();
        assert!(errors.function("New").unwrap().returns_error());
        let fmt = scope("fmt").unwrap();
        assert!(fmt.function("Errorf").unwrap().returns_error());
        assert!(!fmt.function("Println").unwrap().returns_error());
    }

    #[test]
    fn test_intrinsic_unit_has_no_bodies() {
        let unit = unit("errors").unwrap();
        assert_eq!(unit.name, "errors");
        assert!(unit.functions.iter().all(|f| f.body.is_none()));
        assert!(unit.imports.is_empty());
    }
}
