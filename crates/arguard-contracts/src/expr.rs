//! The expression model: the only expression shapes the engine understands.

use indexmap::IndexSet;
use smol_str::SmolStr;
use std::fmt;

/// Binary operators, Go spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    BitOr,
    BitXor,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    AndNot,
}

impl BinaryOp {
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
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A guard condition or a call argument, detached from any syntax tree.
///
/// Literals keep their exact source text; interpretation of that text is
/// deferred to evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Literal(SmolStr),
    Identifier(SmolStr),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn literal(text: impl Into<SmolStr>) -> Self {
        Expression::Literal(text.into())
    }

    pub fn identifier(name: impl Into<SmolStr>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Identifier names in first-occurrence order.
    pub fn identifiers(&self) -> IndexSet<SmolStr> {
        let mut names = IndexSet::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers(&self, names: &mut IndexSet<SmolStr>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Identifier(name) => {
                names.insert(name.clone());
            }
            Expression::Binary { left, right, .. } => {
                left.collect_identifiers(names);
                right.collect_identifiers(names);
            }
        }
    }

    /// True when the expression mentions no identifier at all.
    pub fn is_closed(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::Identifier(_) => false,
            Expression::Binary { left, right, .. } => left.is_closed() && right.is_closed(),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: BinaryOp, right: bool) -> fmt::Result {
        match self {
            Expression::Binary { op, .. }
                if op.precedence() < parent.precedence()
                    || (right && op.precedence() == parent.precedence()) =>
            {
                write!(f, "({})", self)
            }
            _ => write!(f, "{}", self),
        }
    }
}

/// Renders `<left> <op> <right>`; a nested operand is parenthesized only
/// when the tree shape would otherwise read differently.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(text) => f.write_str(text),
            Expression::Identifier(name) => f.write_str(name),
            Expression::Binary { op, left, right } => {
                left.fmt_operand(f, *op, false)?;
                write!(f, " {} ", op)?;
                right.fmt_operand(f, *op, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Expression {
        Expression::identifier(name)
    }

    fn lit(text: &str) -> Expression {
        Expression::literal(text)
    }

    #[test]
    fn test_display_flat() {
        let expr = Expression::binary(BinaryOp::Eq, ident("in"), lit("0"));
        assert_eq!(expr.to_string(), "in == 0");
    }

    #[test]
    fn test_display_keeps_left_associative_chains_flat() {
        let expr = Expression::binary(
            BinaryOp::Or,
            Expression::binary(
                BinaryOp::Or,
                Expression::binary(BinaryOp::Lt, ident("x"), lit("0")),
                Expression::binary(BinaryOp::Gt, ident("x"), lit("10")),
            ),
            Expression::binary(BinaryOp::Eq, ident("y"), lit(r#""""#)),
        );
        assert_eq!(expr.to_string(), r#"x < 0 || x > 10 || y == """#);
    }

    #[test]
    fn test_display_parenthesizes_when_needed() {
        let sum = Expression::binary(BinaryOp::Add, ident("a"), ident("b"));
        let product = Expression::binary(BinaryOp::Mul, sum.clone(), lit("2"));
        assert_eq!(product.to_string(), "(a + b) * 2");

        let difference = Expression::binary(BinaryOp::Sub, lit("1"), sum);
        assert_eq!(difference.to_string(), "1 - (a + b)");
    }

    #[test]
    fn test_identifiers_first_occurrence_order() {
        let expr = Expression::binary(
            BinaryOp::And,
            Expression::binary(BinaryOp::Eq, ident("y"), ident("x")),
            Expression::binary(BinaryOp::Eq, ident("x"), lit("1")),
        );
        let names: Vec<_> = expr.identifiers().into_iter().collect();
        assert_eq!(names, vec![SmolStr::new("y"), SmolStr::new("x")]);
        assert!(!expr.is_closed());
        assert!(Expression::binary(BinaryOp::Add, lit("1"), lit("2")).is_closed());
    }
}
