//! arguard Parser
//!
//! Recursive descent parser that produces a [`File`] syntax tree from the
//! token stream of one `.ag` source file.
//!
//! Newlines terminate statements. They are skipped wherever a construct is
//! obviously incomplete: after `(`, `[`, `{`, `,` and binary operators.

use arguard_ast::*;
use arguard_lexer::{Lexer, LexerError, Token, TokenKind};
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected token: expected {expected}, found `{found}`")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("invalid expression: {hint}")]
    InvalidExpression { span: Span, hint: String },

    #[error("invalid statement: {hint}")]
    InvalidStatement { span: Span, hint: String },

    #[error("invalid type: {hint}")]
    InvalidType { span: Span, hint: String },

    #[error("{error}")]
    Lexer { error: LexerError, span: Span },
}

impl ParseError {
    /// Source range the error points at, if it has one
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidExpression { span, .. }
            | ParseError::InvalidStatement { span, .. }
            | ParseError::InvalidType { span, .. }
            | ParseError::Lexer { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } => None,
        }
    }
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// One entry of a parameter list before Go-style grouping is resolved
struct ParamEntry {
    name: Option<Ident>,
    ty: Option<TypeExpr>,
    variadic: bool,
    span: Span,
}

/// Parser state
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    /// Create a new parser from source code
    pub fn new(source: &'src str) -> Self {
        let (tokens, lex_errors) = Lexer::new(source).tokenize();

        let errors = lex_errors
            .into_iter()
            .map(|error| {
                let offset = error.offset();
                ParseError::Lexer {
                    error,
                    span: Span::new(offset, offset + 1),
                }
            })
            .collect();

        Self {
            source,
            tokens: tokens
                .into_iter()
                .filter(|t| t.kind != TokenKind::Error)
                .collect(),
            pos: 0,
            errors,
        }
    }

    /// Parse a whole source file
    pub fn parse_file(&mut self) -> ParseResult<File> {
        self.skip_terminators();
        let start = self.current_span();

        self.expect(TokenKind::Package)?;
        let package = self.parse_identifier()?;
        self.expect_terminator()?;
        self.skip_terminators();

        let mut imports = Vec::new();
        let mut decls = Vec::new();

        while !self.is_eof() {
            let result = if self.check(&TokenKind::Import) {
                self.parse_import_decl(&mut imports)
            } else {
                self.parse_decl().map(|decl| decls.push(decl))
            };

            match result.and_then(|()| self.expect_terminator()) {
                Ok(()) => {}
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_next_decl();
                }
            }
            self.skip_terminators();
        }

        Ok(File {
            package,
            imports,
            decls,
            span: start.merge(self.previous_span()),
        })
    }

    /// Get collected errors
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.current()
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(self.source.len(), self.source.len()))
    }

    fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens
                .get(self.pos - 1)
                .map(|t| t.span)
                .unwrap_or(Span::new(0, 0))
        } else {
            Span::new(0, 0)
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_eof() {
            self.pos += 1;
        }
        self.tokens.get(self.pos - 1)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_terminators(&mut self) {
        while matches!(
            self.current_kind(),
            Some(TokenKind::Newline) | Some(TokenKind::Semi)
        ) {
            self.advance();
        }
    }

    /// True when the current token ends a statement or a list
    fn at_terminator(&self) -> bool {
        matches!(
            self.current_kind(),
            None | Some(TokenKind::Newline)
                | Some(TokenKind::Semi)
                | Some(TokenKind::RParen)
                | Some(TokenKind::RBrace)
        )
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current_kind() {
            Some(kind) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: kind.to_string(),
                span: self.current_span(),
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(&kind) {
            let token = self.current().cloned().ok_or_else(|| self.unexpected(""))?;
            self.advance();
            Ok(token)
        } else {
            Err(self.unexpected(&format!("`{}`", kind)))
        }
    }

    fn expect_terminator(&mut self) -> ParseResult<()> {
        match self.current_kind() {
            Some(TokenKind::Newline) | Some(TokenKind::Semi) => {
                self.advance();
                Ok(())
            }
            None | Some(TokenKind::RBrace) | Some(TokenKind::RParen) => Ok(()),
            Some(_) => Err(self.unexpected("newline or `;`")),
        }
    }

    fn parse_identifier(&mut self) -> ParseResult<Ident> {
        match self.current_kind() {
            Some(TokenKind::Identifier(name)) => {
                let ident = Spanned::new(name.clone(), self.current_span());
                self.advance();
                Ok(ident)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn recover_to_next_decl(&mut self) {
        while !self.is_eof() {
            let at_line_start = self.pos == 0
                || matches!(
                    self.tokens.get(self.pos - 1).map(|t| &t.kind),
                    Some(TokenKind::Newline)
                );
            if at_line_start
                && matches!(
                    self.current_kind(),
                    Some(
                        TokenKind::Func
                            | TokenKind::Const
                            | TokenKind::Var
                            | TokenKind::Type
                            | TokenKind::Import
                    )
                )
            {
                break;
            }
            self.advance();
        }
    }

    /// Skip to the end of the current line, or to the `}` closing the
    /// enclosing block.
    fn recover_to_next_statement(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.current_kind() {
            match kind {
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    break;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth == 0 => break,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_import_decl(&mut self, imports: &mut Vec<ImportDecl>) -> ParseResult<()> {
        self.expect(TokenKind::Import)?;

        if self.check(&TokenKind::LParen) {
            self.advance();
            self.skip_terminators();
            while !self.check(&TokenKind::RParen) && !self.is_eof() {
                imports.push(self.parse_import_spec()?);
                self.expect_terminator()?;
                self.skip_terminators();
            }
            self.expect(TokenKind::RParen)?;
        } else {
            imports.push(self.parse_import_spec()?);
        }
        Ok(())
    }

    fn parse_import_spec(&mut self) -> ParseResult<ImportDecl> {
        let start = self.current_span();

        let alias = match self.current_kind() {
            Some(TokenKind::Identifier(_)) => Some(self.parse_identifier()?),
            Some(TokenKind::Dot) => {
                let span = self.current_span();
                self.advance();
                Some(Spanned::new(SmolStr::new("."), span))
            }
            _ => None,
        };

        let path = match self.current_kind() {
            Some(TokenKind::String(text)) | Some(TokenKind::RawString(text)) => {
                let unquoted = SmolStr::new(&text[1..text.len() - 1]);
                Spanned::new(unquoted, self.current_span())
            }
            _ => return Err(self.unexpected("import path")),
        };
        self.advance();

        Ok(ImportDecl {
            alias,
            path,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_decl(&mut self) -> ParseResult<Decl> {
        match self.current_kind() {
            Some(TokenKind::Func) => Ok(Decl::Func(self.parse_func_decl()?)),
            Some(TokenKind::Const) => Ok(Decl::Const(self.parse_value_specs()?)),
            Some(TokenKind::Var) => Ok(Decl::Var(self.parse_value_specs()?)),
            Some(TokenKind::Type) => Ok(Decl::Type(self.parse_type_decl()?)),
            _ => Err(self.unexpected("declaration")),
        }
    }

    /// `const X = 1` or `const ( X = 1 \n Y = 2 )`; same for `var`
    fn parse_value_specs(&mut self) -> ParseResult<Vec<ValueSpec>> {
        self.advance();

        if !self.check(&TokenKind::LParen) {
            return Ok(vec![self.parse_value_spec()?]);
        }

        self.advance();
        self.skip_terminators();
        let mut specs = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_eof() {
            specs.push(self.parse_value_spec()?);
            self.expect_terminator()?;
            self.skip_terminators();
        }
        self.expect(TokenKind::RParen)?;
        Ok(specs)
    }

    fn parse_value_spec(&mut self) -> ParseResult<ValueSpec> {
        let start = self.current_span();

        let mut names = vec![self.parse_identifier()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.parse_identifier()?);
        }

        let ty = if !self.check(&TokenKind::Eq) && !self.at_terminator() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let values = if self.check(&TokenKind::Eq) {
            self.advance();
            self.skip_newlines();
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        Ok(ValueSpec {
            names,
            ty,
            values,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_type_decl(&mut self) -> ParseResult<TypeDecl> {
        let start = self.current_span();
        self.advance();

        let name = self.parse_identifier()?;
        if self.check(&TokenKind::Eq) {
            self.advance();
        }
        let ty = self.parse_type()?;

        Ok(TypeDecl {
            name,
            ty,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_func_decl(&mut self) -> ParseResult<FuncDecl> {
        let start = self.current_span();
        self.expect(TokenKind::Func)?;

        let receiver = if self.check(&TokenKind::LParen) {
            let recv_span = self.current_span();
            let mut params = self.parse_params()?;
            if params.len() != 1 {
                return Err(ParseError::InvalidType {
                    span: recv_span.merge(self.previous_span()),
                    hint: "a method has exactly one receiver".to_string(),
                });
            }
            params.pop()
        } else {
            None
        };

        let name = self.parse_identifier()?;
        let params = self.parse_params()?;
        let results = self.parse_results()?;

        let body = if self.check(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(FuncDecl {
            receiver,
            name,
            params,
            results,
            body,
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `( ... )` with Go grouping: in `(a, b int, c string)` the
    /// lone names take the type of the next typed entry. When no entry has
    /// both a name and a type, every entry is a type.
    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect(TokenKind::LParen)?;
        self.skip_newlines();

        let mut entries = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_eof() {
            entries.push(self.parse_param_entry()?);
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let named = entries.iter().any(|e| e.name.is_some() && e.ty.is_some());
        if !named {
            return Ok(entries
                .into_iter()
                .map(|entry| {
                    let ty = match (entry.ty, entry.name) {
                        (Some(ty), _) => ty,
                        (None, Some(name)) => name.map(TypeKind::Named),
                        (None, None) => Spanned::new(TypeKind::Named("_".into()), entry.span),
                    };
                    Param {
                        name: None,
                        ty,
                        variadic: entry.variadic,
                        span: entry.span,
                    }
                })
                .collect());
        }

        let mut params = Vec::with_capacity(entries.len());
        let mut group_type: Option<TypeExpr> = None;
        for entry in entries.into_iter().rev() {
            if entry.name.is_none() {
                return Err(ParseError::InvalidType {
                    span: entry.span,
                    hint: "mixed named and unnamed parameters".to_string(),
                });
            }
            let (ty, variadic) = match entry.ty {
                Some(ty) => {
                    group_type = Some(ty.clone());
                    (ty, entry.variadic)
                }
                None => match &group_type {
                    Some(ty) => (ty.clone(), false),
                    None => {
                        return Err(ParseError::InvalidType {
                            span: entry.span,
                            hint: "missing parameter type".to_string(),
                        })
                    }
                },
            };
            params.push(Param {
                name: entry.name,
                ty,
                variadic,
                span: entry.span,
            });
        }
        params.reverse();
        Ok(params)
    }

    fn parse_param_entry(&mut self) -> ParseResult<ParamEntry> {
        let start = self.current_span();

        if let Some(TokenKind::Identifier(name)) = self.current_kind() {
            let is_map_type = name == "map" && self.peek_kind() == Some(&TokenKind::LBracket);
            match self.peek_kind().cloned() {
                Some(TokenKind::Comma) | Some(TokenKind::RParen) | Some(TokenKind::Newline) => {
                    let ident = self.parse_identifier()?;
                    return Ok(ParamEntry {
                        name: Some(ident),
                        ty: None,
                        variadic: false,
                        span: start,
                    });
                }
                Some(TokenKind::Dot) => {}
                _ if is_map_type => {}
                _ => {
                    let ident = self.parse_identifier()?;
                    let variadic = self.eat_ellipsis();
                    let ty = self.parse_type()?;
                    return Ok(ParamEntry {
                        name: Some(ident),
                        ty: Some(ty),
                        variadic,
                        span: start.merge(self.previous_span()),
                    });
                }
            }
        }

        let variadic = self.eat_ellipsis();
        let ty = self.parse_type()?;
        Ok(ParamEntry {
            name: None,
            ty: Some(ty),
            variadic,
            span: start.merge(self.previous_span()),
        })
    }

    fn eat_ellipsis(&mut self) -> bool {
        if self.check(&TokenKind::Ellipsis) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_results(&mut self) -> ParseResult<Vec<Param>> {
        if self.check(&TokenKind::LParen) {
            return self.parse_params();
        }
        if self.is_type_start() {
            let ty = self.parse_type()?;
            let span = ty.span;
            return Ok(vec![Param {
                name: None,
                ty,
                variadic: false,
                span,
            }]);
        }
        Ok(Vec::new())
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn is_type_start(&self) -> bool {
        matches!(
            self.current_kind(),
            Some(TokenKind::Identifier(_))
                | Some(TokenKind::Star)
                | Some(TokenKind::LBracket)
                | Some(TokenKind::Func)
                | Some(TokenKind::Struct)
                | Some(TokenKind::Interface)
        )
    }

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let start = self.current_span();

        let kind = match self.current_kind() {
            Some(TokenKind::Star) => {
                self.advance();
                TypeKind::Pointer(Box::new(self.parse_type()?))
            }
            Some(TokenKind::LBracket) => {
                self.advance();
                if self.check(&TokenKind::RBracket) {
                    self.advance();
                    TypeKind::Slice(Box::new(self.parse_type()?))
                } else {
                    if !self.eat_ellipsis() {
                        self.parse_expression()?;
                    }
                    self.expect(TokenKind::RBracket)?;
                    TypeKind::Array(Box::new(self.parse_type()?))
                }
            }
            Some(TokenKind::Identifier(name))
                if name == "map" && self.peek_kind() == Some(&TokenKind::LBracket) =>
            {
                self.advance();
                self.advance();
                let key = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                let value = self.parse_type()?;
                TypeKind::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            Some(TokenKind::Identifier(_)) => {
                let first = self.parse_identifier()?;
                if self.check(&TokenKind::Dot) {
                    self.advance();
                    let name = self.parse_identifier()?;
                    TypeKind::Qualified {
                        package: first.node,
                        name: name.node,
                    }
                } else {
                    TypeKind::Named(first.node)
                }
            }
            Some(TokenKind::Func) => {
                self.advance();
                let params = self.parse_params()?;
                let results = self.parse_results()?;
                TypeKind::Func { params, results }
            }
            Some(TokenKind::Struct) => {
                self.advance();
                self.skip_braced()?;
                TypeKind::Struct
            }
            Some(TokenKind::Interface) => {
                self.advance();
                self.skip_braced()?;
                TypeKind::Interface
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            Some(kind) => {
                return Err(ParseError::InvalidType {
                    span: start,
                    hint: format!("`{}` does not start a type", kind),
                })
            }
            None => {
                return Err(ParseError::UnexpectedEof {
                    expected: "type".to_string(),
                })
            }
        };

        Ok(Spanned::new(kind, start.merge(self.previous_span())))
    }

    /// Skip a balanced `{ ... }` group
    fn skip_braced(&mut self) -> ParseResult<()> {
        self.expect(TokenKind::LBrace)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.current_kind() {
                Some(TokenKind::LBrace) => depth += 1,
                Some(TokenKind::RBrace) => depth -= 1,
                Some(_) => {}
                None => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "`}`".to_string(),
                    })
                }
            }
            self.advance();
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.current_span();
        self.expect(TokenKind::LBrace)?;
        self.skip_terminators();

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            match self
                .parse_statement()
                .and_then(|stmt| self.expect_terminator().map(|()| stmt))
            {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_next_statement();
                }
            }
            self.skip_terminators();
        }

        self.expect(TokenKind::RBrace)?;
        Ok(Spanned::new(stmts, start.merge(self.previous_span())))
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();

        match self.current_kind() {
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Return) => {
                self.advance();
                let values = if self.at_terminator() {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                Ok(Stmt::new(
                    StmtKind::Return(values),
                    start.merge(self.previous_span()),
                ))
            }
            Some(TokenKind::Var) => {
                self.advance();
                let spec = self.parse_value_spec()?;
                Ok(Stmt::new(StmtKind::Var(spec), start.merge(self.previous_span())))
            }
            Some(TokenKind::Const) => {
                self.advance();
                let spec = self.parse_value_spec()?;
                Ok(Stmt::new(StmtKind::Const(spec), start.merge(self.previous_span())))
            }
            Some(TokenKind::LBrace) => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Stmt::new(StmtKind::Block(block), span))
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// Expression statement, assignment, short variable declaration or
    /// increment/decrement
    fn parse_simple_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let mut lhs = self.parse_expr_list()?;

        let assign_op = match self.current_kind() {
            Some(TokenKind::Eq) => Some(AssignOp::Assign),
            Some(kind) => compound_assign_op(kind).map(AssignOp::Compound),
            None => None,
        };

        let kind = if self.check(&TokenKind::ColonEq) {
            self.advance();
            self.skip_newlines();
            let mut names = Vec::with_capacity(lhs.len());
            for expr in lhs {
                match expr.kind {
                    ExprKind::Ident(name) => names.push(Spanned::new(name, expr.span)),
                    _ => {
                        return Err(ParseError::InvalidStatement {
                            span: expr.span,
                            hint: "only identifiers may appear left of `:=`".to_string(),
                        })
                    }
                }
            }
            let values = self.parse_expr_list()?;
            StmtKind::Define { names, values }
        } else if let Some(op) = assign_op {
            self.advance();
            self.skip_newlines();
            let values = self.parse_expr_list()?;
            StmtKind::Assign {
                targets: lhs,
                op,
                values,
            }
        } else if matches!(
            self.current_kind(),
            Some(TokenKind::PlusPlus) | Some(TokenKind::MinusMinus)
        ) {
            let increment = self.check(&TokenKind::PlusPlus);
            self.advance();
            match lhs.pop() {
                Some(target) if lhs.is_empty() => StmtKind::IncDec { target, increment },
                _ => {
                    return Err(ParseError::InvalidStatement {
                        span: start,
                        hint: "`++` and `--` apply to a single operand".to_string(),
                    })
                }
            }
        } else {
            match lhs.pop() {
                Some(expr) if lhs.is_empty() => StmtKind::Expr(expr),
                _ => {
                    return Err(ParseError::InvalidStatement {
                        span: start.merge(self.previous_span()),
                        hint: "expression list is not a statement".to_string(),
                    })
                }
            }
        };

        Ok(Stmt::new(kind, start.merge(self.previous_span())))
    }

    /// `if [init;] cond { } [else if ... | else { }]`
    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(TokenKind::If)?;

        let first = self.parse_simple_stmt()?;
        let (init, condition) = if self.check(&TokenKind::Semi) {
            self.advance();
            (Some(Box::new(first)), self.parse_expression()?)
        } else {
            match first.kind {
                StmtKind::Expr(condition) => (None, condition),
                _ => {
                    return Err(ParseError::InvalidStatement {
                        span: first.span,
                        hint: "expected a condition after `if`".to_string(),
                    })
                }
            }
        };

        let then_block = self.parse_block()?;

        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                let block = self.parse_block()?;
                let span = block.span;
                Some(Box::new(Stmt::new(StmtKind::Block(block), span)))
            }
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                init,
                condition,
                then_block,
                else_branch,
            },
            start.merge(self.previous_span()),
        ))
    }

    /// `for { }`, `for cond { }` or `for init; cond; post { }`
    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(TokenKind::For)?;

        let mut init = None;
        let mut condition = None;
        let mut post = None;

        if !self.check(&TokenKind::LBrace) {
            let first = if self.check(&TokenKind::Semi) {
                None
            } else {
                Some(self.parse_simple_stmt()?)
            };

            if self.check(&TokenKind::Semi) {
                self.advance();
                init = first.map(Box::new);
                if !self.check(&TokenKind::Semi) {
                    condition = Some(self.parse_expression()?);
                }
                self.expect(TokenKind::Semi)?;
                if !self.check(&TokenKind::LBrace) {
                    post = Some(Box::new(self.parse_simple_stmt()?));
                }
            } else {
                match first.map(|s| (s.kind, s.span)) {
                    Some((StmtKind::Expr(expr), _)) => condition = Some(expr),
                    Some((_, span)) => {
                        return Err(ParseError::InvalidStatement {
                            span,
                            hint: "expected a loop condition".to_string(),
                        })
                    }
                    None => {}
                }
            }
        }

        let body = self.parse_block()?;
        Ok(Stmt::new(
            StmtKind::For {
                init,
                condition,
                post,
                body,
            },
            start.merge(self.previous_span()),
        ))
    }

    // ========================================================================
    // Expressions (precedence climbing)
    // ========================================================================

    fn parse_expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expression()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            exprs.push(self.parse_expression()?);
        }
        Ok(exprs)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.current_kind().and_then(binary_op) {
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            self.skip_newlines();

            let right = self.parse_binary(op.precedence() + 1)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();

        let op = match self.current_kind() {
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::Caret) => UnaryOp::Complement,
            Some(TokenKind::Star) => UnaryOp::Deref,
            Some(TokenKind::Amp) => UnaryOp::AddrOf,
            _ => return self.parse_postfix(),
        };
        self.advance();

        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_kind() {
                Some(TokenKind::Dot) => {
                    self.advance();
                    let field = self.parse_identifier()?;
                    let span = expr.span.merge(field.span);
                    expr = Expr::new(
                        ExprKind::Selector {
                            operand: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expression()?;
                    self.skip_newlines();
                    self.expect(TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            operand: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                Some(TokenKind::LParen) => {
                    self.advance();
                    let (args, spread) = self.parse_call_args()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            spread,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Arguments after the opening `(`, consuming the closing `)`
    fn parse_call_args(&mut self) -> ParseResult<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut spread = false;

        self.skip_newlines();
        while !self.check(&TokenKind::RParen) && !self.is_eof() {
            args.push(self.parse_expression()?);
            if self.eat_ellipsis() {
                spread = true;
            }
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok((args, spread))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();

        let kind = match self.current_kind() {
            Some(TokenKind::Integer(text)) => ExprKind::Literal {
                kind: LitKind::Int,
                text: text.clone(),
            },
            Some(TokenKind::Float(text)) => ExprKind::Literal {
                kind: LitKind::Float,
                text: text.clone(),
            },
            Some(TokenKind::String(text)) | Some(TokenKind::RawString(text)) => ExprKind::Literal {
                kind: LitKind::String,
                text: text.clone(),
            },
            Some(TokenKind::Char(text)) => ExprKind::Literal {
                kind: LitKind::Char,
                text: text.clone(),
            },
            Some(TokenKind::Identifier(name)) => ExprKind::Ident(name.clone()),
            Some(TokenKind::LParen) => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expression()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen)?;
                return Ok(Expr::new(
                    ExprKind::Paren(Box::new(inner)),
                    span.merge(self.previous_span()),
                ));
            }
            Some(kind) => {
                return Err(ParseError::InvalidExpression {
                    span,
                    hint: format!("expected an expression, found `{}`", kind),
                })
            }
            None => {
                return Err(ParseError::UnexpectedEof {
                    expected: "expression".to_string(),
                })
            }
        };

        self.advance();
        Ok(Expr::new(kind, span))
    }
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::AmpAmp => BinaryOp::And,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        TokenKind::Shl => BinaryOp::Shl,
        TokenKind::Shr => BinaryOp::Shr,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::AmpCaret => BinaryOp::AndNot,
        _ => return None,
    };
    Some(op)
}

fn compound_assign_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::PlusEq => BinaryOp::Add,
        TokenKind::MinusEq => BinaryOp::Sub,
        TokenKind::StarEq => BinaryOp::Mul,
        TokenKind::SlashEq => BinaryOp::Div,
        TokenKind::PercentEq => BinaryOp::Rem,
        TokenKind::AmpEq => BinaryOp::BitAnd,
        TokenKind::PipeEq => BinaryOp::BitOr,
        TokenKind::CaretEq => BinaryOp::BitXor,
        TokenKind::ShlEq => BinaryOp::Shl,
        TokenKind::ShrEq => BinaryOp::Shr,
        TokenKind::AmpCaretEq => BinaryOp::AndNot,
        _ => return None,
    };
    Some(op)
}

/// Convenience function to parse a source file.
///
/// Always returns a tree; when the package clause itself is malformed the
/// tree is empty and the error is included in the returned list.
pub fn parse(source: &str) -> (File, Vec<ParseError>) {
    let mut parser = Parser::new(source);
    match parser.parse_file() {
        Ok(file) => (file, parser.errors().to_vec()),
        Err(e) => {
            let mut errors = parser.errors().to_vec();
            errors.push(e);
            let file = File {
                package: Spanned::dummy(SmolStr::default()),
                imports: Vec::new(),
                decls: Vec::new(),
                span: Span::new(0, source.len()),
            };
            (file, errors)
        }
    }
}
