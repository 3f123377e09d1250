//! arguard Lexer
//!
//! Tokenizes `.ag` source units: a small, statically typed, Go-shaped
//! language used by the reference front-end. Uses the `logos` crate.
//!
//! Newlines are significant (they terminate statements) and are emitted as
//! [`TokenKind::Newline`]. Comments and other whitespace are skipped.

use logos::Logos;
use smol_str::SmolStr;
use std::fmt;
use std::ops::Range;

/// Source span representing a byte range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// A token with its kind and source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All token types of the source language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("func")]
    Func,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("type")]
    Type,
    #[token("struct")]
    Struct,
    #[token("interface")]
    Interface,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("return")]
    Return,

    // ========== Operators ==========
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AmpCaret,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,
    #[token(":=")]
    ColonEq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&^=")]
    AmpCaretEq,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("...")]
    Ellipsis,

    // ========== Delimiters ==========
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,

    // ========== Literals ==========
    /// Integer literal (decimal, hex, octal, binary)
    #[regex(r"[0-9][0-9_]*", |lex| SmolStr::new(lex.slice()))]
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| SmolStr::new(lex.slice()))]
    #[regex(r"0[oO][0-7_]+", |lex| SmolStr::new(lex.slice()))]
    #[regex(r"0[bB][01_]+", |lex| SmolStr::new(lex.slice()))]
    Integer(SmolStr),

    /// Float literal (`1.5`, `1.`, `.5`, `1e9`)
    #[regex(r"[0-9][0-9_]*\.[0-9_]*(?:[eE][+-]?[0-9_]+)?", |lex| SmolStr::new(lex.slice()))]
    #[regex(r"\.[0-9][0-9_]*(?:[eE][+-]?[0-9_]+)?", |lex| SmolStr::new(lex.slice()))]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9_]+", |lex| SmolStr::new(lex.slice()))]
    Float(SmolStr),

    /// Interpreted string (double quotes), kept with its quotes
    #[regex(r#""(?:[^"\\\n]|\\.)*""#, |lex| SmolStr::new(lex.slice()))]
    String(SmolStr),

    /// Raw string (back quotes), kept with its quotes
    #[regex(r"`[^`]*`", |lex| SmolStr::new(lex.slice()))]
    RawString(SmolStr),

    /// Character (rune) literal, kept with its quotes
    #[regex(r"'(?:[^'\\\n]|\\.|\\[xuU0-7][0-9a-fA-F]*)'", |lex| SmolStr::new(lex.slice()))]
    Char(SmolStr),

    // ========== Identifiers ==========
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Identifier(SmolStr),

    // ========== Whitespace ==========
    /// Newline (statement terminator)
    #[regex(r"\n")]
    Newline,

    // ========== Error ==========
    /// Lexer error - unrecognized character
    Error,
}

impl TokenKind {
    /// Returns true for tokens that may end a statement when followed by a
    /// newline: identifiers, literals, closing delimiters, `return`, `++`, `--`.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::RawString(_)
                | TokenKind::Char(_)
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Return
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
        )
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Package
                | TokenKind::Import
                | TokenKind::Func
                | TokenKind::Const
                | TokenKind::Var
                | TokenKind::Type
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::Return
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Package => "package",
            TokenKind::Import => "import",
            TokenKind::Func => "func",
            TokenKind::Const => "const",
            TokenKind::Var => "var",
            TokenKind::Type => "type",
            TokenKind::Struct => "struct",
            TokenKind::Interface => "interface",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::Return => "return",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::AmpCaret => "&^",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Bang => "!",
            TokenKind::Eq => "=",
            TokenKind::ColonEq => ":=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::ShlEq => "<<=",
            TokenKind::ShrEq => ">>=",
            TokenKind::AmpCaretEq => "&^=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Ellipsis => "...",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Integer(s)
            | TokenKind::Float(s)
            | TokenKind::String(s)
            | TokenKind::RawString(s)
            | TokenKind::Char(s)
            | TokenKind::Identifier(s) => return write!(f, "{}", s),
            TokenKind::Newline => "newline",
            TokenKind::Error => "<error>",
        };
        write!(f, "{}", text)
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerError {
    #[error("unexpected character '{1}' at position {0}")]
    UnexpectedCharacter(usize, char),

    #[error("unterminated literal starting at position {0}")]
    UnterminatedLiteral(usize),
}

impl LexerError {
    pub fn offset(&self) -> usize {
        match self {
            LexerError::UnexpectedCharacter(offset, _) => *offset,
            LexerError::UnterminatedLiteral(offset) => *offset,
        }
    }
}

/// Lexer for `.ag` source code
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
        }
    }

    /// Get the source code being lexed
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Tokenize the entire source into a vector of tokens.
    ///
    /// Unrecognized input becomes a [`TokenKind::Error`] token plus a
    /// [`LexerError`]; lexing always runs to the end of input.
    pub fn tokenize(self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for (result, span) in self.inner.spanned() {
            match result {
                Ok(kind) => tokens.push(Token::new(kind, Span::from(span))),
                Err(()) => {
                    let bad_char = self.source[span.clone()].chars().next().unwrap_or('?');
                    let error = match bad_char {
                        '"' | '`' | '\'' => LexerError::UnterminatedLiteral(span.start),
                        _ => LexerError::UnexpectedCharacter(span.start, bad_char),
                    };
                    errors.push(error);
                    tokens.push(Token::new(TokenKind::Error, Span::from(span)));
                }
            }
        }

        (tokens, errors)
    }
}
