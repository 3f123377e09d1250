//! Lowering
//!
//! Turns parsed files into the engine's [`UnitSyntax`]: function bodies are
//! reduced to guard-shaped statements, expressions to [`SourceExpr`], and
//! every call expression is recorded with its resolved callee.

use crate::scope::{convert_op, fold_expr, import_aliases, predeclared, PackageScope, Signature, TypeInfo};
use crate::ParsedFile;
use arguard_ast::{Block, Decl, Expr, ExprKind, FuncDecl, LitKind, Span, Stmt, StmtKind, ValueSpec};
use arguard_contracts::eval::MAX_DEPTH;
use arguard_contracts::{
    CallSite, FunctionDecl, FunctionId, Import, LiteralKind, ResultType, SourceExpr, Statement,
    UnitSyntax, Value,
};
use arguard_diagnostics::Position;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;

/// Scopes of the units imported by the unit being lowered, by import path
pub type Dependencies = FxHashMap<SmolStr, Arc<PackageScope>>;

/// Lower every file of a unit.
pub fn lower_unit(
    unit: &str,
    files: &[ParsedFile],
    scope: &PackageScope,
    deps: &Dependencies,
) -> UnitSyntax {
    let mut syntax = UnitSyntax {
        name: unit.into(),
        ..UnitSyntax::default()
    };
    for file in files {
        FileLowerer::new(unit, scope, deps, file).lower(&mut syntax);
    }
    syntax
}

/// Synthetic name of an unnamed or blank parameter; never a valid identifier
fn synthetic_name(index: usize) -> SmolStr {
    SmolStr::new(format!("_#{}", index))
}

fn literal_kind(kind: LitKind) -> LiteralKind {
    match kind {
        LitKind::Int => LiteralKind::Int,
        LitKind::Float => LiteralKind::Float,
        LitKind::Char => LiteralKind::Char,
        LitKind::String => LiteralKind::String,
    }
}

#[derive(Debug, Clone)]
enum Local {
    Var(TypeInfo),
    Const(Value),
}

struct FileLowerer<'a> {
    unit: &'a str,
    scope: &'a PackageScope,
    deps: &'a Dependencies,
    file: &'a ParsedFile,
    imports: FxHashMap<SmolStr, SmolStr>,
    locals: Vec<FxHashMap<SmolStr, Local>>,
    calls: Vec<CallSite>,
}

impl<'a> FileLowerer<'a> {
    fn new(unit: &'a str, scope: &'a PackageScope, deps: &'a Dependencies, file: &'a ParsedFile) -> Self {
        Self {
            unit,
            scope,
            deps,
            file,
            imports: import_aliases(&file.ast),
            locals: Vec::new(),
            calls: Vec::new(),
        }
    }

    fn lower(mut self, syntax: &mut UnitSyntax) {
        let file = self.file;
        for import in &file.ast.imports {
            syntax.imports.push(Import {
                name: import.path.node.clone(),
                position: self.position(import.span),
            });
        }

        for decl in &file.ast.decls {
            match decl {
                Decl::Func(func) => {
                    let lowered = self.lower_func(func);
                    syntax.functions.push(lowered);
                }
                Decl::Var(specs) | Decl::Const(specs) => {
                    for spec in specs {
                        for value in &spec.values {
                            self.visit_expr(value);
                        }
                    }
                }
                Decl::Type(_) => {}
            }
        }

        syntax.calls.append(&mut self.calls);
    }

    fn position(&self, span: Span) -> Position {
        let (line, column) = self.file.lines.line_col(span.start);
        Position::new(self.file.name.clone(), line, column)
    }

    fn snippet(&self, span: Span) -> &str {
        self.file
            .source
            .get(span.start..span.end)
            .unwrap_or("expression")
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn push_scope(&mut self) {
        self.locals.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare(&mut self, name: &SmolStr, local: Local) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.clone(), local);
        }
    }

    fn local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find_map(|scope| scope.get(name))
    }

    fn resolve_type(&self, ty: &arguard_ast::TypeExpr) -> TypeInfo {
        TypeInfo::resolve(ty, self.unit, &self.imports)
    }

    /// Type of a variable in scope; `None` when `name` is not a variable
    fn variable_type(&self, name: &str) -> Option<TypeInfo> {
        match self.local(name) {
            Some(Local::Var(ty)) => Some(ty.clone()),
            Some(Local::Const(_)) => None,
            None => self.scope.variables.get(name).cloned(),
        }
    }

    /// Import path behind `alias`, unless something closer shadows it
    fn import_path(&self, alias: &str) -> Option<&SmolStr> {
        if self.local(alias).is_some() || self.scope.declares(alias) {
            return None;
        }
        self.imports.get(alias)
    }

    fn scope_of(&self, unit: &str) -> Option<&'a PackageScope> {
        if unit == self.unit {
            Some(self.scope)
        } else {
            self.deps.get(unit).map(|scope| &**scope)
        }
    }

    fn constant_value(&self, name: &str) -> Option<Value> {
        if let Some((alias, field)) = name.split_once('.') {
            let path = self.import_path(alias)?;
            return self.deps.get(path)?.constant(field).cloned();
        }
        match self.local(name) {
            Some(Local::Const(value)) => Some(value.clone()),
            Some(Local::Var(_)) => None,
            None if self.scope.declares(name) => self.scope.constant(name).cloned(),
            None => predeclared(name),
        }
    }

    fn fold(&self, expr: &Expr) -> Option<Value> {
        fold_expr(expr, &mut |name: &str| self.constant_value(name))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn lower_func(&mut self, func: &FuncDecl) -> FunctionDecl {
        let receiver_type = func
            .receiver
            .as_ref()
            .and_then(|r| r.ty.node.base_name())
            .map(|name| name.as_str());
        let id = FunctionId::new(self.unit, receiver_type, &func.name.node);

        let parameter_names: Vec<SmolStr> = func
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| match &param.name {
                Some(name) if name.node != "_" => name.node.clone(),
                _ => synthetic_name(i),
            })
            .collect();

        self.push_scope();
        let named = func.receiver.iter().chain(&func.params).chain(&func.results);
        for param in named {
            if let Some(name) = &param.name {
                let ty = if param.variadic {
                    TypeInfo::Other
                } else {
                    self.resolve_type(&param.ty)
                };
                self.declare(&name.node, Local::Var(ty));
            }
        }
        let body = func.body.as_ref().map(|block| self.lower_statements(&block.node));
        self.pop_scope();

        FunctionDecl {
            id,
            name: func.name.node.clone(),
            position: self.position(func.span),
            parameter_names,
            body,
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn lower_block(&mut self, block: &Block) -> Vec<Statement> {
        self.push_scope();
        let statements = self.lower_statements(&block.node);
        self.pop_scope();
        statements
    }

    fn lower_statements(&mut self, stmts: &[Stmt]) -> Vec<Statement> {
        stmts.iter().map(|stmt| self.lower_stmt(stmt)).collect()
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Statement {
        let position = self.position(stmt.span);
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.visit_expr(expr);
                if let ExprKind::Call { func, args, .. } = &expr.unparen().kind {
                    if self.is_panic(func) {
                        return Statement::Abort {
                            position,
                            arguments: args.iter().map(|arg| self.lower_expr(arg)).collect(),
                        };
                    }
                }
                Statement::Other { position }
            }

            StmtKind::Define { names, values } => {
                for value in values {
                    self.visit_expr(value);
                }
                let types = self.infer_types(names.len(), values);
                for (name, ty) in names.iter().zip(types) {
                    self.declare(&name.node, Local::Var(ty));
                }
                Statement::Other { position }
            }

            StmtKind::Assign { targets, values, .. } => {
                for expr in targets.iter().chain(values) {
                    self.visit_expr(expr);
                }
                Statement::Other { position }
            }

            StmtKind::IncDec { target, .. } => {
                self.visit_expr(target);
                Statement::Other { position }
            }

            StmtKind::Var(spec) => {
                self.lower_var(spec);
                Statement::Other { position }
            }

            StmtKind::Const(spec) => {
                for value in &spec.values {
                    self.visit_expr(value);
                }
                for (i, name) in spec.names.iter().enumerate() {
                    let local = match spec.values.get(i).and_then(|value| self.fold(value)) {
                        Some(value) => Local::Const(value),
                        None => Local::Var(TypeInfo::Other),
                    };
                    self.declare(&name.node, local);
                }
                Statement::Other { position }
            }

            StmtKind::If {
                init,
                condition,
                then_block,
                else_branch,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.lower_stmt(init);
                }
                self.visit_expr(condition);
                let lowered = self.lower_expr(condition);
                let body = self.lower_block(then_block);
                if let Some(else_branch) = else_branch {
                    self.lower_stmt(else_branch);
                }
                self.pop_scope();

                if init.is_some() {
                    return Statement::Other { position };
                }
                Statement::If {
                    position,
                    condition: lowered,
                    body,
                    has_else: else_branch.is_some(),
                }
            }

            StmtKind::For {
                init,
                condition,
                post,
                body,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.lower_stmt(init);
                }
                if let Some(condition) = condition {
                    self.visit_expr(condition);
                }
                if let Some(post) = post {
                    self.lower_stmt(post);
                }
                self.lower_block(body);
                self.pop_scope();
                Statement::Other { position }
            }

            StmtKind::Return(values) => {
                for value in values {
                    self.visit_expr(value);
                }
                let results = values
                    .iter()
                    .map(|value| {
                        if self.is_error_expr(value) {
                            ResultType::Error
                        } else {
                            ResultType::Other
                        }
                    })
                    .collect();
                Statement::Return { position, results }
            }

            StmtKind::Block(block) => {
                self.lower_block(block);
                Statement::Other { position }
            }
        }
    }

    fn lower_var(&mut self, spec: &ValueSpec) {
        for value in &spec.values {
            self.visit_expr(value);
        }
        let types = match &spec.ty {
            Some(ty) => vec![self.resolve_type(ty); spec.names.len()],
            None => self.infer_types(spec.names.len(), &spec.values),
        };
        for (name, ty) in spec.names.iter().zip(types) {
            self.declare(&name.node, Local::Var(ty));
        }
    }

    /// Types of `count` names initialized from `values`
    fn infer_types(&self, count: usize, values: &[Expr]) -> Vec<TypeInfo> {
        if values.len() == count {
            return values.iter().map(|value| self.type_of(value)).collect();
        }
        if let [single] = values {
            if let ExprKind::Call { func, .. } = &single.unparen().kind {
                if let Some((_, signature)) = self.resolve_callee(func) {
                    if signature.results.len() == count {
                        return signature.results.clone();
                    }
                }
            }
        }
        vec![TypeInfo::Other; count]
    }

    fn type_of(&self, expr: &Expr) -> TypeInfo {
        match &expr.unparen().kind {
            ExprKind::Call { func, .. } => self
                .resolve_callee(func)
                .and_then(|(_, signature)| match signature.results.as_slice() {
                    [single] => Some(single.clone()),
                    _ => None,
                })
                .unwrap_or(TypeInfo::Other),
            ExprKind::Ident(name) => self.variable_type(name).unwrap_or(TypeInfo::Other),
            _ => TypeInfo::Other,
        }
    }

    fn is_error_expr(&self, expr: &Expr) -> bool {
        match &expr.unparen().kind {
            ExprKind::Call { func, .. } => self
                .resolve_callee(func)
                .map_or(false, |(_, signature)| signature.returns_error()),
            ExprKind::Ident(name) => self.variable_type(name).map_or(false, |ty| ty.is_error()),
            _ => false,
        }
    }

    fn is_panic(&self, func: &Expr) -> bool {
        matches!(&func.unparen().kind, ExprKind::Ident(name)
            if name == "panic" && self.local(name).is_none() && !self.scope.declares(name))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Statically known function behind a call's function expression
    fn resolve_callee(&self, func: &Expr) -> Option<(FunctionId, &'a Signature)> {
        match &func.unparen().kind {
            ExprKind::Ident(name) => {
                if self.local(name).is_some() {
                    return None;
                }
                let signature = self.scope.function(name)?;
                Some((FunctionId::function(self.unit, name), signature))
            }
            ExprKind::Selector { operand, field } => {
                let ExprKind::Ident(base) = &operand.unparen().kind else {
                    return None;
                };
                if let Some(ty) = self.variable_type(base) {
                    let TypeInfo::Named { unit, name } = ty else {
                        return None;
                    };
                    let signature = self.scope_of(&unit)?.method(&name, &field.node)?;
                    return Some((FunctionId::method(&unit, &name, &field.node), signature));
                }
                let path = self.import_path(base)?;
                let signature = self.deps.get(path)?.function(&field.node)?;
                Some((FunctionId::function(path, &field.node), signature))
            }
            _ => None,
        }
    }

    /// Record every call in `expr`, outer calls first
    fn visit_expr(&mut self, expr: &Expr) {
        self.visit_at(expr, 0);
    }

    /// Calls nested deeper than `MAX_DEPTH` are not recorded
    fn visit_at(&mut self, expr: &Expr, depth: usize) {
        if depth >= MAX_DEPTH {
            return;
        }
        let depth = depth + 1;
        match &expr.kind {
            ExprKind::Call { func, args, .. } => {
                let callee = self.resolve_callee(func).map(|(id, _)| id);
                let arguments = args.iter().map(|arg| self.lower_expr(arg)).collect();
                let position = self.position(expr.span);
                self.calls.push(CallSite {
                    position,
                    callee,
                    arguments,
                });
                self.visit_at(func, depth);
                for arg in args {
                    self.visit_at(arg, depth);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.visit_at(left, depth);
                self.visit_at(right, depth);
            }
            ExprKind::Index { operand, index } => {
                self.visit_at(operand, depth);
                self.visit_at(index, depth);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Selector { operand, .. } => {
                self.visit_at(operand, depth);
            }
            ExprKind::Paren(inner) => self.visit_at(inner, depth),
            ExprKind::Literal { .. } | ExprKind::Ident(_) => {}
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Only literals, identifiers and binary operators survive lowering.
    /// Parentheses, unary operators, selectors, calls and indexing become
    /// `Unsupported`, as does anything nested deeper than `MAX_DEPTH`.
    fn lower_expr(&self, expr: &Expr) -> SourceExpr {
        self.lower_at(expr, 0)
    }

    fn lower_at(&self, expr: &Expr, depth: usize) -> SourceExpr {
        if depth >= MAX_DEPTH {
            return self.unsupported(expr);
        }
        match &expr.kind {
            ExprKind::Literal { kind, text } => SourceExpr::Literal {
                kind: literal_kind(*kind),
                text: text.clone(),
            },
            ExprKind::Ident(name) => self.lower_ident(name),
            ExprKind::Binary { op, left, right } => SourceExpr::binary(
                convert_op(*op),
                self.lower_at(left, depth + 1),
                self.lower_at(right, depth + 1),
            ),
            ExprKind::Paren(_)
            | ExprKind::Unary { .. }
            | ExprKind::Selector { .. }
            | ExprKind::Call { .. }
            | ExprKind::Index { .. } => self.unsupported(expr),
        }
    }

    fn lower_ident(&self, name: &SmolStr) -> SourceExpr {
        match self.local(name) {
            Some(Local::Var(_)) => return SourceExpr::variable(name),
            Some(Local::Const(value)) => return SourceExpr::constant(name, &value.to_literal()),
            None => {}
        }
        if self.scope.declares(name) {
            return match self.scope.constant(name) {
                Some(value) => SourceExpr::constant(name, &value.to_literal()),
                None => SourceExpr::variable(name),
            };
        }
        match predeclared(name) {
            Some(value) => SourceExpr::constant(name, &value.to_literal()),
            None => SourceExpr::variable(name),
        }
    }

    fn unsupported(&self, expr: &Expr) -> SourceExpr {
        SourceExpr::unsupported(self.snippet(expr.span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arguard_diagnostics::LineIndex;
    use pretty_assertions::assert_eq;

    fn lower_source(source: &str) -> UnitSyntax {
        let (ast, errors) = arguard_parser::parse(source);
        assert!(errors.is_empty(), "Errors: {:?}", errors);
        let file = ParsedFile {
            name: "p.ag".into(),
            lines: LineIndex::new(source),
            source: source.to_string(),
            ast,
        };
        let scope = PackageScope::from_files("p", [&file.ast]);
        lower_unit("p", std::slice::from_ref(&file), &scope, &Dependencies::default())
    }

    fn body(unit: &UnitSyntax, name: &str) -> Vec<Statement> {
        unit.functions
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.body.clone())
            .unwrap()
    }

    #[test]
    fn test_panic_guard_lowers_to_abort() {
        let unit = lower_source("package p\nfunc F(in int) {\n    if in == 0 {\n        panic(\"zero\")\n    }\n}\n");
        let stmts = body(&unit, "F");
        let Statement::If { position, condition, body, has_else } = &stmts[0] else {
            panic!("expected if, got {:?}", stmts[0]);
        };
        assert_eq!(position, &Position::new("p.ag", 3, 5));
        assert!(!has_else);
        assert_eq!(
            condition,
            &SourceExpr::binary(
                arguard_contracts::BinaryOp::Eq,
                SourceExpr::variable("in"),
                SourceExpr::int("0")
            )
        );
        assert!(matches!(&body[0], Statement::Abort { arguments, .. } if arguments == &vec![SourceExpr::string("\"zero\"")]));
    }

    #[test]
    fn test_shadowed_panic_is_a_plain_call() {
        let unit = lower_source("package p\nfunc F(in int, panic func(string)) {\n    if in == 0 {\n        panic(\"zero\")\n    }\n}\n");
        let stmts = body(&unit, "F");
        let Statement::If { body, .. } = &stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(body[0], Statement::Other { .. }));
    }

    #[test]
    fn test_error_returns() {
        let unit = lower_source(
            "package p\nfunc check(n int) error\nfunc F(n int, err error) (int, error) {\n    return 0, err\n}\nfunc G(n int) error {\n    return check(n)\n}\nfunc H(n int) error {\n    return nil\n}\n",
        );
        let returns = |name: &str| match &body(&unit, name)[0] {
            Statement::Return { results, .. } => results.clone(),
            other => panic!("expected return, got {:?}", other),
        };
        assert_eq!(returns("F"), vec![ResultType::Other, ResultType::Error]);
        assert_eq!(returns("G"), vec![ResultType::Error]);
        assert_eq!(returns("H"), vec![ResultType::Other]);
    }

    #[test]
    fn test_constants_fold_and_locals_shadow() {
        let unit = lower_source(
            "package p\nconst Max = 10\nfunc F(n int) {\n    if n > Max {\n        panic(\"big\")\n    }\n}\nfunc G(Max int) {\n    if Max > 1 {\n        panic(\"big\")\n    }\n}\n",
        );
        let condition = |name: &str| match &body(&unit, name)[0] {
            Statement::If { condition, .. } => condition.clone(),
            other => panic!("expected if, got {:?}", other),
        };
        assert_eq!(
            condition("F"),
            SourceExpr::binary(
                arguard_contracts::BinaryOp::Gt,
                SourceExpr::variable("n"),
                SourceExpr::constant("Max", "10")
            )
        );
        assert_eq!(
            condition("G"),
            SourceExpr::binary(
                arguard_contracts::BinaryOp::Gt,
                SourceExpr::variable("Max"),
                SourceExpr::int("1")
            )
        );
    }

    #[test]
    fn test_synthetic_parameter_names() {
        let unit = lower_source("package p\nfunc F(_ int, x int) {\n}\nfunc G(int, string)\n");
        let names = |i: usize| -> Vec<&str> {
            unit.functions[i]
                .parameter_names
                .iter()
                .map(|n| n.as_str())
                .collect()
        };
        assert_eq!(names(0), vec!["_#0", "x"]);
        assert_eq!(names(1), vec!["_#0", "_#1"]);
    }

    #[test]
    fn test_calls_in_pre_order_with_callees() {
        let unit = lower_source(
            "package p\ntype Buffer struct {\n}\nfunc (b *Buffer) Write(n int) {\n}\nfunc New() *Buffer\nfunc F(x int) int\nvar global = F(1)\nfunc main() {\n    b := New()\n    b.Write(F(2))\n    var local func(int)\n    local(3)\n}\n",
        );
        let callees: Vec<_> = unit
            .calls
            .iter()
            .map(|c| c.callee.map(|id| id.to_string()))
            .collect();
        assert_eq!(
            callees,
            vec![
                Some("p.F".to_string()),
                Some("p.New".to_string()),
                Some("p.Buffer.Write".to_string()),
                Some("p.F".to_string()),
                None,
            ]
        );
        assert_eq!(unit.calls[2].arguments, vec![SourceExpr::unsupported("F(2)")]);
        assert_eq!(unit.calls[3].arguments, vec![SourceExpr::int("2")]);
    }

    #[test]
    fn test_unary_and_parenthesized_arguments_are_unsupported() {
        let unit = lower_source(
            "package p\nconst Max = 10\nfunc F(x int)\nfunc main() {\n    F(-1)\n    F((1))\n    F(-Max)\n    F(Max)\n}\n",
        );
        let arguments: Vec<_> = unit.calls.iter().map(|c| c.arguments[0].clone()).collect();
        assert_eq!(
            arguments,
            vec![
                SourceExpr::unsupported("-1"),
                SourceExpr::unsupported("(1)"),
                SourceExpr::unsupported("-Max"),
                SourceExpr::constant("Max", "10"),
            ]
        );
    }

    #[test]
    fn test_deep_expressions_are_cut_off() {
        let condition = vec!["x"; MAX_DEPTH + 100].join(" + ");
        let source = format!(
            "package p\nfunc F(x int) {{\n    if {} > 0 {{\n        panic(\"deep\")\n    }}\n}}\n",
            condition
        );
        let unit = lower_source(&source);
        let stmts = body(&unit, "F");
        let Statement::If { condition, .. } = &stmts[0] else {
            panic!("expected if");
        };

        let mut depth = 0;
        let mut node = condition;
        while let SourceExpr::Binary { left, .. } = node {
            depth += 1;
            node = left;
        }
        assert_eq!(depth, MAX_DEPTH);
        assert!(matches!(node, SourceExpr::Unsupported { .. }));
    }

    #[test]
    fn test_if_with_init_is_not_a_guard() {
        let unit = lower_source(
            "package p\nfunc F(x int) {\n    if y := x; y == 0 {\n        panic(\"zero\")\n    }\n}\n",
        );
        assert!(matches!(body(&unit, "F")[0], Statement::Other { .. }));
    }
}
