//! Constant values and their algebra.
//!
//! Integers are wide (`i128`) so untyped constant arithmetic rarely
//! overflows; when it does, the operation fails instead of wrapping.

use super::EvaluationError;
use crate::expr::BinaryOp;
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(SmolStr),
}

/// Both operands of a numeric operation, promoted to a common kind.
enum Numeric {
    Int(i128, i128),
    Float(f64, f64),
}

fn numeric_pair(lhs: &Value, rhs: &Value) -> Option<Numeric> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Numeric::Int(*a, *b)),
        (Value::Float(a), Value::Float(b)) => Some(Numeric::Float(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Some(Numeric::Float(*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Some(Numeric::Float(*a, *b as f64)),
        _ => None,
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Parse literal source text: `true`/`false`, integers in any base with
    /// `_` separators, floats, interpreted and raw strings, and runes. A
    /// leading sign is accepted so folded negative constants read back.
    pub fn parse_literal(text: &str) -> Result<Value, EvaluationError> {
        let invalid = || EvaluationError::InvalidLiteral {
            text: SmolStr::new(text),
        };

        match text {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }

        if let Some(body) = text.strip_prefix('"') {
            let body = body.strip_suffix('"').ok_or_else(invalid)?;
            return unescape(body, '"')
                .map(|s| Value::Str(s.into()))
                .ok_or_else(invalid);
        }

        if let Some(body) = text.strip_prefix('`') {
            let body = body.strip_suffix('`').ok_or_else(invalid)?;
            if body.contains('`') {
                return Err(invalid());
            }
            return Ok(Value::Str(body.replace('\r', "").into()));
        }

        if let Some(body) = text.strip_prefix('\'') {
            let body = body.strip_suffix('\'').ok_or_else(invalid)?;
            let decoded = unescape(body, '\'').ok_or_else(invalid)?;
            let mut chars = decoded.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(c as i128)),
                _ => Err(invalid()),
            };
        }

        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let value = parse_number(digits).ok_or_else(invalid)?;
        if negative {
            value.negate()
        } else {
            Ok(value)
        }
    }

    /// Apply a binary operator. `&&` and `||` here are strict; the
    /// evaluator short-circuits before calling this.
    pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvaluationError> {
        let mismatch = || EvaluationError::InvalidOperation {
            operation: format!("{} {} {}", lhs.type_name(), op, rhs.type_name()),
        };

        match op {
            BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                    *a && *b
                } else {
                    *a || *b
                })),
                _ => Err(mismatch()),
            },

            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = match (lhs, rhs) {
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    (Value::Str(a), Value::Str(b)) => a == b,
                    _ => match numeric_pair(lhs, rhs) {
                        Some(Numeric::Int(a, b)) => a == b,
                        Some(Numeric::Float(a, b)) => a == b,
                        None => return Err(mismatch()),
                    },
                };
                Ok(Value::Bool(equal == (op == BinaryOp::Eq)))
            }

            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = match (lhs, rhs) {
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => match numeric_pair(lhs, rhs) {
                        Some(Numeric::Int(a, b)) => a.cmp(&b),
                        Some(Numeric::Float(a, b)) => a.partial_cmp(&b).ok_or_else(mismatch)?,
                        None => return Err(mismatch()),
                    },
                };
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }

            BinaryOp::Add => match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b).into())),
                _ => arithmetic(lhs, rhs, i128::checked_add, |a, b| a + b).ok_or_else(mismatch)?,
            },
            BinaryOp::Sub => {
                arithmetic(lhs, rhs, i128::checked_sub, |a, b| a - b).ok_or_else(mismatch)?
            }
            BinaryOp::Mul => {
                arithmetic(lhs, rhs, i128::checked_mul, |a, b| a * b).ok_or_else(mismatch)?
            }
            BinaryOp::Div => {
                if rhs.is_zero() && numeric_pair(lhs, rhs).is_some() {
                    return Err(EvaluationError::DivisionByZero);
                }
                arithmetic(lhs, rhs, i128::checked_div, |a, b| a / b).ok_or_else(mismatch)?
            }

            BinaryOp::Rem => integer(lhs, rhs, |a, b| {
                if b == 0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                a.checked_rem(b).ok_or(EvaluationError::Overflow)
            })
            .ok_or_else(mismatch)?,
            BinaryOp::Shl => integer(lhs, rhs, shift_left).ok_or_else(mismatch)?,
            BinaryOp::Shr => integer(lhs, rhs, shift_right).ok_or_else(mismatch)?,
            BinaryOp::BitAnd => integer(lhs, rhs, |a, b| Ok(a & b)).ok_or_else(mismatch)?,
            BinaryOp::BitOr => integer(lhs, rhs, |a, b| Ok(a | b)).ok_or_else(mismatch)?,
            BinaryOp::BitXor => integer(lhs, rhs, |a, b| Ok(a ^ b)).ok_or_else(mismatch)?,
            BinaryOp::AndNot => integer(lhs, rhs, |a, b| Ok(a & !b)).ok_or_else(mismatch)?,
        }
    }

    /// Unary `-`
    pub fn negate(&self) -> Result<Value, EvaluationError> {
        match self {
            Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(EvaluationError::Overflow),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvaluationError::InvalidOperation {
                operation: format!("-{}", other.type_name()),
            }),
        }
    }

    /// Unary `!`
    pub fn not(&self) -> Result<Value, EvaluationError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(EvaluationError::InvalidOperation {
                operation: format!("!{}", other.type_name()),
            }),
        }
    }

    /// Unary `^` (bitwise complement)
    pub fn complement(&self) -> Result<Value, EvaluationError> {
        match self {
            Value::Int(i) => Ok(Value::Int(!i)),
            other => Err(EvaluationError::InvalidOperation {
                operation: format!("^{}", other.type_name()),
            }),
        }
    }

    /// Literal text that [`Value::parse_literal`] reads back to this value.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{:?}", f),
            Value::Str(s) => quote(s),
        }
    }
}

/// Numeric operation with Int/Float promotion. `None` when an operand is
/// not numeric.
fn arithmetic<F, G>(
    lhs: &Value,
    rhs: &Value,
    int_op: F,
    float_op: G,
) -> Option<Result<Value, EvaluationError>>
where
    F: Fn(i128, i128) -> Option<i128>,
    G: Fn(f64, f64) -> f64,
{
    let result = match numeric_pair(lhs, rhs)? {
        Numeric::Int(a, b) => int_op(a, b)
            .map(Value::Int)
            .ok_or(EvaluationError::Overflow),
        Numeric::Float(a, b) => {
            let r = float_op(a, b);
            if r.is_finite() {
                Ok(Value::Float(r))
            } else {
                Err(EvaluationError::Overflow)
            }
        }
    };
    Some(result)
}

/// Integer-only operation. `None` when an operand is not an integer.
fn integer<F>(lhs: &Value, rhs: &Value, op: F) -> Option<Result<Value, EvaluationError>>
where
    F: Fn(i128, i128) -> Result<i128, EvaluationError>,
{
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(op(*a, *b).map(Value::Int)),
        _ => None,
    }
}

fn shift_left(a: i128, count: i128) -> Result<i128, EvaluationError> {
    if count < 0 {
        return Err(EvaluationError::NegativeShift);
    }
    if a == 0 {
        return Ok(0);
    }
    if count >= 127 {
        return Err(EvaluationError::Overflow);
    }
    let shifted = a << count as u32;
    if shifted >> count as u32 != a {
        return Err(EvaluationError::Overflow);
    }
    Ok(shifted)
}

fn shift_right(a: i128, count: i128) -> Result<i128, EvaluationError> {
    if count < 0 {
        return Err(EvaluationError::NegativeShift);
    }
    Ok(a >> count.min(127) as u32)
}

fn parse_number(text: &str) -> Option<Value> {
    let first = text.chars().next()?;
    if !first.is_ascii_digit() && first != '.' {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|&c| c != '_')
        .collect::<String>()
        .to_ascii_lowercase();

    let prefixed = [("0x", 16), ("0o", 8), ("0b", 2)]
        .into_iter()
        .find_map(|(prefix, radix)| cleaned.strip_prefix(prefix).map(|d| (d, radix)));
    if let Some((digits, radix)) = prefixed {
        return parse_radix(digits, radix);
    }

    if cleaned.contains(|c: char| c == '.' || c == 'e') {
        let value: f64 = cleaned.parse().ok()?;
        return value.is_finite().then_some(Value::Float(value));
    }

    if cleaned.len() > 1 && cleaned.starts_with('0') {
        return parse_radix(&cleaned[1..], 8);
    }

    parse_radix(&cleaned, 10)
}

fn parse_radix(digits: &str, radix: u32) -> Option<Value> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    i128::from_str_radix(digits, radix).ok().map(Value::Int)
}

/// Decode the escapes of a quoted literal body. `None` on a malformed
/// escape or an unescaped quote.
fn unescape(body: &str, quote: char) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c == quote || c == '\n' {
            return None;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            '\\' => '\\',
            '\'' if quote == '\'' => '\'',
            '"' if quote == '"' => '"',
            'x' => hex_escape(&mut chars, 2)?,
            'u' => hex_escape(&mut chars, 4)?,
            'U' => hex_escape(&mut chars, 8)?,
            d @ '0'..='7' => {
                let mut code = d.to_digit(8)?;
                for _ in 0..2 {
                    code = code * 8 + chars.next()?.to_digit(8)?;
                }
                char::from_u32(code)?
            }
            _ => return None,
        };
        out.push(escaped);
    }

    Some(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, width: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..width {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Value {
        Value::parse_literal(text).unwrap()
    }

    #[test]
    fn test_parse_integers() {
        assert_eq!(parse("42"), Value::Int(42));
        assert_eq!(parse("1_000_000"), Value::Int(1_000_000));
        assert_eq!(parse("0x1F"), Value::Int(31));
        assert_eq!(parse("0o17"), Value::Int(15));
        assert_eq!(parse("017"), Value::Int(15));
        assert_eq!(parse("0b101"), Value::Int(5));
        assert_eq!(parse("0"), Value::Int(0));
        assert_eq!(parse("-7"), Value::Int(-7));
    }

    #[test]
    fn test_parse_floats() {
        assert_eq!(parse("1.5"), Value::Float(1.5));
        assert_eq!(parse("1."), Value::Float(1.0));
        assert_eq!(parse(".5"), Value::Float(0.5));
        assert_eq!(parse("1e3"), Value::Float(1000.0));
        assert_eq!(parse("-2.5"), Value::Float(-2.5));
    }

    #[test]
    fn test_parse_strings_and_runes() {
        assert_eq!(parse(r#""must not be zero""#), Value::Str("must not be zero".into()));
        assert_eq!(parse(r#""a\tb\"c\x41é""#), Value::Str("a\tb\"cAé".into()));
        assert_eq!(parse("`raw\\n`"), Value::Str("raw\\n".into()));
        assert_eq!(parse("'a'"), Value::Int(97));
        assert_eq!(parse(r"'\n'"), Value::Int(10));
        assert_eq!(parse(r"'\''"), Value::Int(39));
        assert_eq!(parse("true"), Value::Bool(true));
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["", "abc", "0x", "09", "1.5.5", r#""open"#, "'ab'", "0b102", "--1", "1i"] {
            assert!(
                matches!(
                    Value::parse_literal(text),
                    Err(EvaluationError::InvalidLiteral { .. })
                ),
                "expected {:?} to be rejected",
                text
            );
        }
    }

    #[test]
    fn test_arithmetic_and_promotion() {
        let int = |i| Value::Int(i);
        assert_eq!(Value::binary(BinaryOp::Add, &int(2), &int(3)), Ok(int(5)));
        assert_eq!(Value::binary(BinaryOp::Div, &int(7), &int(2)), Ok(int(3)));
        assert_eq!(Value::binary(BinaryOp::Rem, &int(-7), &int(2)), Ok(int(-1)));
        assert_eq!(
            Value::binary(BinaryOp::Div, &int(7), &Value::Float(2.0)),
            Ok(Value::Float(3.5))
        );
        assert_eq!(Value::binary(BinaryOp::Shl, &int(1), &int(10)), Ok(int(1024)));
        assert_eq!(Value::binary(BinaryOp::Shr, &int(-8), &int(200)), Ok(int(-1)));
        assert_eq!(Value::binary(BinaryOp::AndNot, &int(0b1111), &int(0b0101)), Ok(int(0b1010)));
        assert_eq!(
            Value::binary(BinaryOp::Add, &Value::Str("ab".into()), &Value::Str("c".into())),
            Ok(Value::Str("abc".into()))
        );
    }

    #[test]
    fn test_comparisons() {
        let t = Ok(Value::Bool(true));
        assert_eq!(Value::binary(BinaryOp::Eq, &Value::Int(1), &Value::Float(1.0)), t);
        assert_eq!(Value::binary(BinaryOp::LtEq, &Value::Int(2), &Value::Int(2)), t);
        assert_eq!(
            Value::binary(BinaryOp::Lt, &Value::Str("a".into()), &Value::Str("b".into())),
            t
        );
        assert_eq!(
            Value::binary(BinaryOp::NotEq, &Value::Bool(true), &Value::Bool(false)),
            t
        );
    }

    #[test]
    fn test_faults_are_errors() {
        assert_eq!(
            Value::binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(EvaluationError::DivisionByZero)
        );
        assert_eq!(
            Value::binary(BinaryOp::Rem, &Value::Int(1), &Value::Int(0)),
            Err(EvaluationError::DivisionByZero)
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::Int(i128::MAX), &Value::Int(2)),
            Err(EvaluationError::Overflow)
        );
        assert_eq!(
            Value::binary(BinaryOp::Shl, &Value::Int(1), &Value::Int(127)),
            Err(EvaluationError::Overflow)
        );
        assert_eq!(
            Value::binary(BinaryOp::Shl, &Value::Int(1), &Value::Int(-1)),
            Err(EvaluationError::NegativeShift)
        );
        assert_eq!(
            Value::binary(BinaryOp::Add, &Value::Int(1), &Value::Str("x".into())),
            Err(EvaluationError::InvalidOperation {
                operation: "int + string".to_string()
            })
        );
        assert_eq!(
            Value::binary(BinaryOp::Rem, &Value::Float(1.0), &Value::Float(2.0)),
            Err(EvaluationError::InvalidOperation {
                operation: "float % float".to_string()
            })
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(Value::Int(5).negate(), Ok(Value::Int(-5)));
        assert_eq!(Value::Int(i128::MIN).negate(), Err(EvaluationError::Overflow));
        assert_eq!(Value::Bool(true).not(), Ok(Value::Bool(false)));
        assert_eq!(Value::Int(0).complement(), Ok(Value::Int(-1)));
        assert!(Value::Str("x".into()).negate().is_err());
    }

    #[test]
    fn test_to_literal_reads_back() {
        for value in [
            Value::Bool(false),
            Value::Int(-12),
            Value::Float(2.5),
            Value::Float(1e21),
            Value::Float(-3.0),
            Value::Str("quote \" and \\ and \n".into()),
        ] {
            assert_eq!(Value::parse_literal(&value.to_literal()), Ok(value));
        }
    }
}
