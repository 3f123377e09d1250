//! Package-level declarations of a unit
//!
//! Just enough type information to lower function bodies: result types of
//! functions and methods, declared types of package variables, and the
//! folded values of package constants.

use arguard_ast::{BinaryOp as AstOp, Decl, Expr, ExprKind, File, TypeExpr, TypeKind, UnaryOp};
use arguard_contracts::eval::MAX_DEPTH;
use arguard_contracts::{BinaryOp, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

// ============================================================================
// Types
// ============================================================================

/// What the front-end knows about the type of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    /// The predeclared `error` interface
    Error,
    /// A named type declared in `unit` (pointers are looked through)
    Named { unit: SmolStr, name: SmolStr },
    Other,
}

impl TypeInfo {
    /// Resolve a type expression written in a file of `unit` with the given
    /// import aliases.
    pub fn resolve(ty: &TypeExpr, unit: &str, imports: &FxHashMap<SmolStr, SmolStr>) -> Self {
        match &ty.node {
            TypeKind::Named(name) if name == "error" => TypeInfo::Error,
            TypeKind::Named(name) => TypeInfo::Named {
                unit: unit.into(),
                name: name.clone(),
            },
            TypeKind::Pointer(inner) => TypeInfo::resolve(inner, unit, imports),
            TypeKind::Qualified { package, name } => match imports.get(package) {
                Some(path) => TypeInfo::Named {
                    unit: path.clone(),
                    name: name.clone(),
                },
                None => TypeInfo::Other,
            },
            _ => TypeInfo::Other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeInfo::Error)
    }
}

/// Result types of a function or method
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: usize,
    pub results: Vec<TypeInfo>,
}

impl Signature {
    pub fn new(params: usize, results: Vec<TypeInfo>) -> Self {
        Self { params, results }
    }

    /// True when the function returns exactly one value of type `error`
    pub fn returns_error(&self) -> bool {
        matches!(self.results.as_slice(), [TypeInfo::Error])
    }

    pub fn result(&self, index: usize) -> Option<&TypeInfo> {
        self.results.get(index)
    }
}

// ============================================================================
// Package Scope
// ============================================================================

/// Package-level names of one unit
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    pub unit: SmolStr,
    pub functions: FxHashMap<SmolStr, Signature>,
    /// Keyed by (receiver type, method name)
    pub methods: FxHashMap<(SmolStr, SmolStr), Signature>,
    pub variables: FxHashMap<SmolStr, TypeInfo>,
    pub constants: FxHashMap<SmolStr, Value>,
    pub types: FxHashSet<SmolStr>,
}

impl PackageScope {
    pub fn new(unit: impl Into<SmolStr>) -> Self {
        Self {
            unit: unit.into(),
            ..Self::default()
        }
    }

    /// Collect the declarations of every file of `unit`.
    pub fn from_files<'f>(unit: &str, files: impl IntoIterator<Item = &'f File>) -> Self {
        let mut scope = PackageScope::new(unit);
        let mut raw_constants: FxHashMap<SmolStr, &Expr> = FxHashMap::default();
        let mut pending_vars = Vec::new();

        for file in files {
            let imports = import_aliases(file);
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) => {
                        let results = func
                            .results
                            .iter()
                            .map(|p| TypeInfo::resolve(&p.ty, unit, &imports))
                            .collect();
                        let signature = Signature::new(func.params.len(), results);
                        match func.receiver.as_ref().and_then(|r| r.ty.node.base_name()) {
                            Some(receiver) => {
                                scope
                                    .methods
                                    .insert((receiver.clone(), func.name.node.clone()), signature);
                            }
                            None => {
                                scope.functions.insert(func.name.node.clone(), signature);
                            }
                        }
                    }
                    Decl::Const(specs) => {
                        for spec in specs {
                            if spec.names.len() != spec.values.len() {
                                continue;
                            }
                            for (name, value) in spec.names.iter().zip(&spec.values) {
                                raw_constants.insert(name.node.clone(), value);
                            }
                        }
                    }
                    Decl::Var(specs) => {
                        for spec in specs {
                            for (i, name) in spec.names.iter().enumerate() {
                                match &spec.ty {
                                    Some(ty) => {
                                        scope.variables.insert(
                                            name.node.clone(),
                                            TypeInfo::resolve(ty, unit, &imports),
                                        );
                                    }
                                    None => pending_vars.push((name.node.clone(), spec.values.get(i))),
                                }
                            }
                        }
                    }
                    Decl::Type(ty) => {
                        scope.types.insert(ty.name.node.clone());
                    }
                }
            }
        }

        let mut folder = ConstFolder::new(&raw_constants);
        for name in raw_constants.keys() {
            if let Some(value) = folder.fold(name) {
                scope.constants.insert(name.clone(), value);
            }
        }

        // Untyped package variables take the type of a single-result call
        for (name, value) in pending_vars {
            let ty = value
                .and_then(|v| scope.call_result(v))
                .unwrap_or(TypeInfo::Other);
            scope.variables.insert(name, ty);
        }

        scope
    }

    fn call_result(&self, expr: &Expr) -> Option<TypeInfo> {
        let ExprKind::Call { func, .. } = &expr.unparen().kind else {
            return None;
        };
        let ExprKind::Ident(name) = &func.unparen().kind else {
            return None;
        };
        match self.functions.get(name)?.results.as_slice() {
            [single] => Some(single.clone()),
            _ => None,
        }
    }

    pub fn function(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name)
    }

    pub fn method(&self, receiver: &str, name: &str) -> Option<&Signature> {
        self.methods.get(&(SmolStr::new(receiver), SmolStr::new(name)))
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    /// True when `name` is declared at package level
    pub fn declares(&self, name: &str) -> bool {
        self.functions.contains_key(name)
            || self.variables.contains_key(name)
            || self.constants.contains_key(name)
            || self.types.contains(name)
    }
}

/// Import alias to import path, for one file
pub fn import_aliases(file: &File) -> FxHashMap<SmolStr, SmolStr> {
    file.imports
        .iter()
        .map(|import| (SmolStr::new(import.local_name()), import.path.node.clone()))
        .collect()
}

// ============================================================================
// Constant Folding
// ============================================================================

/// Convert a syntax tree operator into the engine's operator
pub fn convert_op(op: AstOp) -> BinaryOp {
    match op {
        AstOp::Or => BinaryOp::Or,
        AstOp::And => BinaryOp::And,
        AstOp::Eq => BinaryOp::Eq,
        AstOp::NotEq => BinaryOp::NotEq,
        AstOp::Lt => BinaryOp::Lt,
        AstOp::LtEq => BinaryOp::LtEq,
        AstOp::Gt => BinaryOp::Gt,
        AstOp::GtEq => BinaryOp::GtEq,
        AstOp::Add => BinaryOp::Add,
        AstOp::Sub => BinaryOp::Sub,
        AstOp::BitOr => BinaryOp::BitOr,
        AstOp::BitXor => BinaryOp::BitXor,
        AstOp::Mul => BinaryOp::Mul,
        AstOp::Div => BinaryOp::Div,
        AstOp::Rem => BinaryOp::Rem,
        AstOp::Shl => BinaryOp::Shl,
        AstOp::Shr => BinaryOp::Shr,
        AstOp::BitAnd => BinaryOp::BitAnd,
        AstOp::AndNot => BinaryOp::AndNot,
    }
}

/// Fold a constant expression. `lookup` resolves identifiers; anything it
/// does not resolve makes the expression non-constant, as does nesting
/// deeper than `MAX_DEPTH`.
pub fn fold_expr<L>(expr: &Expr, lookup: &mut L) -> Option<Value>
where
    L: FnMut(&str) -> Option<Value>,
{
    fold_at(expr, lookup, 0)
}

fn fold_at<L>(expr: &Expr, lookup: &mut L, depth: usize) -> Option<Value>
where
    L: FnMut(&str) -> Option<Value>,
{
    if depth >= MAX_DEPTH {
        return None;
    }
    let depth = depth + 1;
    match &expr.kind {
        ExprKind::Literal { text, .. } => Value::parse_literal(text).ok(),
        ExprKind::Ident(name) => lookup(name),
        ExprKind::Paren(inner) => fold_at(inner, lookup, depth),
        ExprKind::Unary { op, operand } => {
            let value = fold_at(operand, lookup, depth)?;
            match op {
                UnaryOp::Neg => value.negate().ok(),
                UnaryOp::Plus => match value {
                    Value::Int(_) | Value::Float(_) => Some(value),
                    _ => None,
                },
                UnaryOp::Not => value.not().ok(),
                UnaryOp::Complement => value.complement().ok(),
                UnaryOp::Deref | UnaryOp::AddrOf => None,
            }
        }
        ExprKind::Binary { op, left, right } => {
            let left = fold_at(left, lookup, depth)?;
            let right = fold_at(right, lookup, depth)?;
            Value::binary(convert_op(*op), &left, &right).ok()
        }
        // Qualified names reach `lookup` as `alias.Name`
        ExprKind::Selector { operand, field } => match &operand.unparen().kind {
            ExprKind::Ident(base) => lookup(&format!("{}.{}", base, field.node)),
            _ => None,
        },
        _ => None,
    }
}

/// Folds package constants in any declaration order
struct ConstFolder<'a> {
    raw: &'a FxHashMap<SmolStr, &'a Expr>,
    done: FxHashMap<SmolStr, Option<Value>>,
    in_progress: FxHashSet<SmolStr>,
}

impl<'a> ConstFolder<'a> {
    fn new(raw: &'a FxHashMap<SmolStr, &'a Expr>) -> Self {
        Self {
            raw,
            done: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    fn fold(&mut self, name: &str) -> Option<Value> {
        if let Some(value) = self.done.get(name) {
            return value.clone();
        }
        let raw = self.raw;
        let expr = *raw.get(name)?;
        // Cyclic definitions never fold
        if !self.in_progress.insert(SmolStr::new(name)) {
            return None;
        }

        let value = fold_expr(expr, &mut |ident: &str| {
            if self.raw.contains_key(ident) {
                self.fold(ident)
            } else {
                predeclared(ident)
            }
        });

        self.in_progress.remove(name);
        self.done.insert(SmolStr::new(name), value.clone());
        value
    }
}

/// Predeclared constants
pub fn predeclared(name: &str) -> Option<Value> {
    match name {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scope(source: &str) -> PackageScope {
        let (file, errors) = arguard_parser::parse(source);
        assert!(errors.is_empty(), "Errors: {:?}", errors);
        PackageScope::from_files("p", [&file])
    }

    #[test]
    fn test_constants_fold_in_any_order() {
        let scope = scope(
            "package p\nconst Double = Limit * 2\nconst Limit = 10\nconst (\n    Name = \"x\" + \"y\"\n    Neg = -Limit\n    On = !false\n)\n",
        );
        assert_eq!(scope.constant("Double"), Some(&Value::Int(20)));
        assert_eq!(scope.constant("Name"), Some(&Value::Str("xy".into())));
        assert_eq!(scope.constant("Neg"), Some(&Value::Int(-10)));
        assert_eq!(scope.constant("On"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_cyclic_constants_do_not_fold() {
        let scope = scope("package p\nconst A = B + 1\nconst B = A + 1\n");
        assert_eq!(scope.constant("A"), None);
        assert_eq!(scope.constant("B"), None);
    }

    #[test]
    fn test_deep_constants_do_not_fold() {
        let shallow = vec!["1"; 100].join(" + ");
        let deep = vec!["1"; MAX_DEPTH + 100].join(" + ");
        let scope = scope(&format!(
            "package p\nconst Shallow = {}\nconst Deep = {}\n",
            shallow, deep
        ));
        assert_eq!(scope.constant("Shallow"), Some(&Value::Int(100)));
        assert_eq!(scope.constant("Deep"), None);
    }

    #[test]
    fn test_signatures_and_methods() {
        let scope = scope(
            "package p\nimport \"lib\"\ntype Buffer struct {\n    n int\n}\nfunc New() *Buffer\nfunc (b *Buffer) Grow(n int) error\nfunc Open(name string) (lib.File, error)\n",
        );
        assert_eq!(
            scope.function("New").unwrap().results,
            vec![TypeInfo::Named {
                unit: "p".into(),
                name: "Buffer".into()
            }]
        );
        assert!(scope.method("Buffer", "Grow").unwrap().returns_error());
        assert_eq!(
            scope.function("Open").unwrap().results,
            vec![
                TypeInfo::Named {
                    unit: "lib".into(),
                    name: "File".into()
                },
                TypeInfo::Error
            ]
        );
        assert!(!scope.function("Open").unwrap().returns_error());
        assert!(scope.declares("Buffer"));
    }

    #[test]
    fn test_variable_types() {
        let scope = scope(
            "package p\ntype T struct {\n}\nfunc Make() T\nvar err error\nvar t = Make()\nvar n = 3\n",
        );
        assert_eq!(scope.variables.get("err"), Some(&TypeInfo::Error));
        assert_eq!(
            scope.variables.get("t"),
            Some(&TypeInfo::Named {
                unit: "p".into(),
                name: "T".into()
            })
        );
        assert_eq!(scope.variables.get("n"), Some(&TypeInfo::Other));
    }
}
