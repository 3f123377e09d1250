//! arguard Abstract Syntax Tree
//!
//! Syntax tree for `.ag` source units. The tree is purely syntactic: names are
//! not resolved and no types are checked. The front-end resolves what the
//! contract engine needs while lowering this tree.

pub use arguard_lexer::Span;
pub use smol_str::SmolStr;
use std::fmt;

/// A spanned value - wraps any value with source location info
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

/// Identifier (variable, function, package and type names)
pub type Ident = Spanned<SmolStr>;

// ============================================================================
// File Structure
// ============================================================================

/// One parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package: Ident,
    pub imports: Vec<ImportDecl>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// `import alias "path"`; `path` is stored without its quotes
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub alias: Option<Ident>,
    pub path: Spanned<SmolStr>,
    pub span: Span,
}

impl ImportDecl {
    /// The name the import is referenced by inside the file: the alias, or
    /// the last path segment.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias.node.as_str(),
            None => self
                .path
                .node
                .rsplit('/')
                .next()
                .unwrap_or(self.path.node.as_str()),
        }
    }
}

/// Top-level declarations
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Const(Vec<ValueSpec>),
    Var(Vec<ValueSpec>),
    Type(TypeDecl),
}

/// `name1, name2 [Type] [= value1, value2]`
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `func [(recv T)] Name(params) [results] [body]`
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub receiver: Option<Param>,
    pub name: Ident,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Option<Block>,
    pub span: Span,
}

/// A single parameter or result. Grouped declarations (`x, y int`) are
/// expanded to one `Param` per name.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
    pub variadic: bool,
    pub span: Span,
}

// ============================================================================
// Types
// ============================================================================

pub type TypeExpr = Spanned<TypeKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// `int`, `error`, `T`
    Named(SmolStr),
    /// `pkg.T`
    Qualified { package: SmolStr, name: SmolStr },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(Box<TypeExpr>),
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Func { params: Vec<Param>, results: Vec<Param> },
    /// Struct bodies are skipped
    Struct,
    /// Interface bodies are skipped
    Interface,
}

impl TypeKind {
    /// The named type behind any number of pointer indirections
    pub fn base_name(&self) -> Option<&SmolStr> {
        match self {
            TypeKind::Named(name) => Some(name),
            TypeKind::Pointer(inner) => inner.node.base_name(),
            _ => None,
        }
    }

    pub fn is_named(&self, expected: &str) -> bool {
        matches!(self, TypeKind::Named(name) if name == expected)
    }
}

// ============================================================================
// Statements
// ============================================================================

pub type Block = Spanned<Vec<Stmt>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    /// `a, b := x, y`
    Define { names: Vec<Ident>, values: Vec<Expr> },
    /// `a = x`, `a += x`
    Assign {
        targets: Vec<Expr>,
        op: AssignOp,
        values: Vec<Expr>,
    },
    /// `x++` / `x--`
    IncDec { target: Expr, increment: bool },
    Var(ValueSpec),
    Const(ValueSpec),
    If {
        init: Option<Box<Stmt>>,
        condition: Expr,
        then_block: Block,
        /// Either another `If` statement or a `Block`
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Return(Vec<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Strip any number of enclosing parentheses
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal with its exact source text (quotes included)
    Literal { kind: LitKind, text: SmolStr },
    Ident(SmolStr),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Paren(Box<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        /// Trailing `...` on the last argument
        spread: bool,
    },
    Selector { operand: Box<Expr>, field: Ident },
    Index { operand: Box<Expr>, index: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Logical
    Or,
    And,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Additive
    Add,
    Sub,
    BitOr,
    BitXor,
    // Multiplicative
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    AndNot,
}

impl BinaryOp {
    /// Binding power, Go style: `||` 1, `&&` 2, comparisons 3, additive 4,
    /// multiplicative 5.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 4,
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::BitAnd
            | BinaryOp::AndNot => 5,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::AndNot => "&^",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `^x`
    Complement,
    /// `*x`
    Deref,
    /// `&x`
    AddrOf,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::Complement => "^",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
        };
        f.write_str(symbol)
    }
}
