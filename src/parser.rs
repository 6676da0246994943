//! # JSSON Parser
//!
//! A Pratt (precedence-climbing) parser from the token stream to the typed
//! AST. Statements are dispatched on their first two tokens; expressions are
//! parsed by prefix/infix dispatch over the precedence ladder below.
//!
//! Two precedence rules are load-bearing:
//!
//! - `..` binds tighter than arithmetic and `map` tighter than `..`, but the
//!   *end* of a range is parsed with a ceiling of `map` so that
//!   `1..3 map (x) = x * 2` maps over the whole range rather than over `3`.
//! - Ternary branches are parsed below `?`'s own precedence, which makes
//!   `a ? b ? c : d : e` nest right-associatively without parentheses.
//!
//! The parser never aborts: every syntactic problem is recorded in
//! [`Parser::errors`] (lexer errors are surfaced there too) and parsing
//! continues with whatever structure can still be recovered. Callers must
//! refuse to evaluate when the error list is non-empty.

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind, Stage};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use crate::utils;
use miette::NamedSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Binding power, low to high. `Range` sits above arithmetic and `Map` above
/// `Range`; `Index` (member access) binds tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Ternary,
    Logical,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Range,
    Map,
    Index,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::And | TokenKind::Or => Precedence::Logical,
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Slash | TokenKind::Asterisk | TokenKind::Percent => Precedence::Product,
        TokenKind::Question => Precedence::Ternary,
        TokenKind::Dot => Precedence::Index,
        TokenKind::Range => Precedence::Range,
        TokenKind::Map => Precedence::Map,
        _ => Precedence::Lowest,
    }
}

fn binary_op_of(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Asterisk => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Ge => BinaryOp::Ge,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        _ => return None,
    })
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    errors: Vec<ParseError>,
    src: Arc<NamedSource<String>>,
    file: Option<PathBuf>,
}

impl Parser {
    /// Lexes `source` up front and prepares the parser. Lexer errors are
    /// converted into parse-error entries immediately so a single `errors()`
    /// check covers both stages.
    #[must_use]
    pub fn new(source: &str, file: Option<&Path>) -> Self {
        let name = file.map_or_else(
            || "source.jsson".to_string(),
            |p| p.display().to_string(),
        );
        let src = Arc::new(NamedSource::new(name, source.to_string()));

        let mut lexer = Lexer::new(source);
        let tokens = lexer.lex();

        let mut parser = Self {
            tokens,
            position: 0,
            errors: Vec::new(),
            src,
            file: file.map(Path::to_path_buf),
        };
        for lex_err in lexer.errors() {
            parser.record_at(
                lex_err.line,
                lex_err.column,
                1,
                ParseErrorKind::Lex(lex_err.kind.clone()),
                Stage::Lex,
            );
        }
        parser
    }

    /// All errors recorded so far (lexer errors first, then parse errors in
    /// discovery order).
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    /// Parses the whole token stream into a [`Program`], skipping over
    /// anything unrecognizable at statement position.
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while self.cur().kind != TokenKind::Eof {
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
            self.next_token();
        }
        program
    }

    // === Statements ===

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur().kind {
            TokenKind::Ident => match self.peek().kind {
                TokenKind::Declare => self.parse_var_decl(),
                TokenKind::Assign => self.parse_assignment(),
                TokenKind::LBrace => self.parse_object_statement(),
                TokenKind::LBracket => self.parse_array_template_statement(),
                _ => None,
            },
            TokenKind::Include => self.parse_include(),
            TokenKind::At if self.peek().kind == TokenKind::Preset => self.parse_preset(),
            // Anything else at statement position is tolerated silently.
            _ => None,
        }
    }

    fn parse_assignment(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        let name = self.cur().literal.clone();
        self.next_token(); // onto '='
        self.next_token(); // onto the expression
        let value = self.parse_expression(Precedence::Lowest)?;
        Some(Statement::Assignment { name, value, pos })
    }

    fn parse_var_decl(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        let name = self.cur().literal.clone();
        self.next_token(); // onto ':='
        self.next_token(); // onto the expression
        let value = self.parse_expression(Precedence::Lowest)?;
        Some(Statement::VarDecl { name, value, pos })
    }

    /// `name { … }`: an assignment whose value is an object literal.
    fn parse_object_statement(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        let name = self.cur().literal.clone();
        self.next_token(); // onto '{'
        let value = self.parse_expression(Precedence::Lowest)?;
        Some(Statement::Assignment { name, value, pos })
    }

    /// `name [ … ]`: an assignment whose value is an array template.
    fn parse_array_template_statement(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        let name = self.cur().literal.clone();
        self.next_token(); // onto '['
        let value = self.parse_array_template()?;
        Some(Statement::Assignment { name, value, pos })
    }

    fn parse_include(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        self.next_token(); // past 'include'
        if self.cur().kind != TokenKind::Str && self.cur().kind != TokenKind::RawStr {
            self.record(ParseErrorKind::IncludePathExpected);
            return None;
        }
        Some(Statement::Include {
            path: self.cur().literal.clone(),
            pos,
        })
    }

    /// `@preset "name" { … }`
    fn parse_preset(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        self.next_token(); // onto 'preset'
        if self.peek().kind != TokenKind::Str {
            self.record(ParseErrorKind::PresetNameExpected);
            return None;
        }
        self.next_token(); // onto the name
        let name = self.cur().literal.clone();
        if self.peek().kind != TokenKind::LBrace {
            self.record_expected("'{' to open the preset body");
            return None;
        }
        self.next_token(); // onto '{'
        let body = self.parse_object_literal();
        Some(Statement::Preset { name, body, pos })
    }

    // === Expressions ===

    /// Parses an expression at the given binding power. On entry the cursor
    /// is at the first token of the expression; on exit it rests on its last.
    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while self.peek().kind != TokenKind::Eof && precedence < precedence_of(self.peek().kind) {
            left = match self.peek().kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Slash
                | TokenKind::Asterisk
                | TokenKind::Percent
                | TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Le
                | TokenKind::Ge
                | TokenKind::And
                | TokenKind::Or => {
                    self.next_token();
                    self.parse_binary(left)?
                }
                TokenKind::Question => {
                    self.next_token();
                    self.parse_conditional(left)?
                }
                TokenKind::Dot => {
                    self.next_token();
                    self.parse_member(left)?
                }
                TokenKind::Range => {
                    self.next_token();
                    self.parse_range(left)?
                }
                TokenKind::Map => {
                    self.next_token();
                    self.parse_map_expression(left)?
                }
                _ => return Some(left),
            };
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        let pos = self.cur_pos();
        match self.cur().kind {
            TokenKind::Ident => Some(Expression::Ident {
                name: self.cur().literal.clone(),
                pos,
            }),
            TokenKind::Int => self.parse_int_literal(),
            TokenKind::Float => self.parse_float_literal(),
            TokenKind::Str => Some(Expression::Str {
                value: self.cur().literal.clone(),
                is_raw: false,
                pos,
            }),
            TokenKind::RawStr => Some(self.parse_raw_string()),
            TokenKind::TemplateStr => Some(self.parse_template_string()),
            TokenKind::True | TokenKind::False => Some(Expression::Bool {
                value: self.cur().kind == TokenKind::True,
                pos,
            }),
            TokenKind::Null => Some(Expression::Null { pos }),
            TokenKind::LParen => self.parse_grouped(),
            TokenKind::LBracket => Some(self.parse_array_literal()),
            TokenKind::LBrace => Some(Expression::Object(self.parse_object_literal())),
            TokenKind::Minus => self.parse_unary_minus(),
            TokenKind::At => self.parse_at_expression(),
            _ => {
                self.record_expected("an expression");
                None
            }
        }
    }

    fn parse_int_literal(&mut self) -> Option<Expression> {
        let pos = self.cur_pos();
        let literal = self.cur().literal.clone();
        match literal.parse::<i64>() {
            Ok(value) => Some(Expression::Int { value, pos }),
            Err(_) => {
                self.record(ParseErrorKind::BadIntegerLiteral { literal });
                None
            }
        }
    }

    fn parse_float_literal(&mut self) -> Option<Expression> {
        let pos = self.cur_pos();
        let literal = self.cur().literal.clone();
        match literal.parse::<f64>() {
            Ok(value) => Some(Expression::Float { value, pos }),
            Err(_) => {
                self.record(ParseErrorKind::BadFloatLiteral { literal });
                None
            }
        }
    }

    /// Unary minus folds straight into numeric literals, so `-5` really is
    /// the literal `-5`. Anything else desugars to `0 - expr`.
    fn parse_unary_minus(&mut self) -> Option<Expression> {
        let pos = self.cur_pos();
        match self.peek().kind {
            TokenKind::Int => {
                self.next_token();
                let literal = self.cur().literal.clone();
                match literal.parse::<i64>() {
                    Ok(value) => Some(Expression::Int { value: -value, pos }),
                    Err(_) => {
                        self.record(ParseErrorKind::BadIntegerLiteral { literal });
                        None
                    }
                }
            }
            TokenKind::Float => {
                self.next_token();
                let literal = self.cur().literal.clone();
                match literal.parse::<f64>() {
                    Ok(value) => Some(Expression::Float { value: -value, pos }),
                    Err(_) => {
                        self.record(ParseErrorKind::BadFloatLiteral { literal });
                        None
                    }
                }
            }
            _ => {
                self.next_token();
                let right = self.parse_expression(Precedence::Prefix)?;
                Some(Expression::Binary {
                    op: BinaryOp::Sub,
                    left: Box::new(Expression::Int { value: 0, pos }),
                    right: Box::new(right),
                    pos,
                })
            }
        }
    }

    fn parse_grouped(&mut self) -> Option<Expression> {
        self.next_token(); // past '('
        let expr = self.parse_expression(Precedence::Lowest)?;
        if self.peek().kind != TokenKind::RParen {
            self.record(ParseErrorKind::MissingClosingParen);
            return None;
        }
        self.next_token(); // onto ')'
        Some(expr)
    }

    fn parse_binary(&mut self, left: Expression) -> Option<Expression> {
        let pos = self.cur_pos();
        let op = binary_op_of(self.cur().kind)?;
        let precedence = precedence_of(self.cur().kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            pos,
        })
    }

    fn parse_member(&mut self, left: Expression) -> Option<Expression> {
        let pos = self.cur_pos();
        self.next_token(); // past '.'
        if self.cur().kind != TokenKind::Ident {
            self.record(ParseErrorKind::ExpectedIdentifierAfterDot);
            return None;
        }
        Some(Expression::Member {
            object: Box::new(left),
            property: self.cur().literal.clone(),
            pos,
        })
    }

    /// Both branches are parsed below `?`'s precedence, giving nested
    /// ternaries right associativity in either arm.
    fn parse_conditional(&mut self, condition: Expression) -> Option<Expression> {
        let pos = self.cur_pos();
        self.next_token(); // onto the consequence
        let consequence = self.parse_expression(Precedence::Lowest)?;
        if self.peek().kind != TokenKind::Colon {
            self.record(ParseErrorKind::MissingColonInTernary);
            return None;
        }
        self.next_token(); // onto ':'
        self.next_token(); // onto the alternative
        let alternative = self.parse_expression(Precedence::Lowest)?;
        Some(Expression::Conditional {
            condition: Box::new(condition),
            consequence: Box::new(consequence),
            alternative: Box::new(alternative),
            pos,
        })
    }

    /// The end of a range is parsed with a ceiling of [`Precedence::Map`] so
    /// a following `map` keyword attaches to the whole range, not to the end
    /// expression.
    fn parse_range(&mut self, start: Expression) -> Option<Expression> {
        let pos = self.cur_pos();
        self.next_token(); // onto the end expression
        let end = self.parse_expression(Precedence::Map)?;

        // The step expression gets the same ceiling, so a trailing `map`
        // applies to the stepped range.
        let step = if self.peek().kind == TokenKind::Step {
            self.next_token(); // onto 'step'
            self.next_token(); // onto the step expression
            Some(Box::new(self.parse_expression(Precedence::Map)?))
        } else {
            None
        };

        Some(Expression::Range {
            start: Box::new(start),
            end: Box::new(end),
            step,
            pos,
        })
    }

    /// Infix `source map (param) = body`.
    fn parse_map_expression(&mut self, source: Expression) -> Option<Expression> {
        let pos = self.cur_pos();
        if self.peek().kind != TokenKind::LParen {
            self.record_expected_peek("'(' after map");
            return None;
        }
        self.next_token(); // onto '('
        if self.peek().kind != TokenKind::Ident {
            self.record_expected_peek("an iterator name");
            return None;
        }
        self.next_token(); // onto the parameter
        let param = self.cur().literal.clone();
        if self.peek().kind != TokenKind::RParen {
            self.record_expected_peek("')' after the iterator name");
            return None;
        }
        self.next_token(); // onto ')'
        if self.peek().kind != TokenKind::Assign {
            self.record_expected_peek("'=' before the map body");
            return None;
        }
        self.next_token(); // onto '='
        self.next_token(); // onto the body
        let body = self.parse_expression(Precedence::Lowest)?;
        Some(Expression::MapExpr {
            source: Box::new(source),
            param,
            body: Box::new(body),
            pos,
        })
    }

    // === Objects, arrays, templates ===

    /// `{ … }`. On entry the cursor is at `{`, on exit at the matching `}`
    /// (a missing one is recorded and whatever was parsed is returned).
    fn parse_object_literal(&mut self) -> ObjectLiteral {
        let pos = self.cur_pos();
        let mut obj = ObjectLiteral {
            declarations: Vec::new(),
            properties: Vec::new(),
            pos,
        };

        self.next_token(); // past '{'

        while self.cur().kind != TokenKind::RBrace && self.cur().kind != TokenKind::Eof {
            if self.cur().kind != TokenKind::Ident {
                self.next_token();
                continue;
            }

            let key_pos = self.cur_pos();
            let key = self.cur().literal.clone();
            self.next_token(); // past the key

            match self.cur().kind {
                TokenKind::Declare => {
                    self.next_token();
                    if let Some(value) = self.parse_expression(Precedence::Lowest) {
                        obj.declarations.push(Declaration {
                            name: key,
                            value,
                            pos: key_pos,
                        });
                    }
                    self.next_token();
                }
                TokenKind::Assign | TokenKind::Colon => {
                    self.next_token();
                    let value = self.parse_expression(Precedence::Lowest);
                    obj.properties.push((key, value));
                    self.next_token();
                }
                TokenKind::LBrace => {
                    let value = self.parse_expression(Precedence::Lowest);
                    obj.properties.push((key, value));
                    self.next_token();
                }
                TokenKind::LBracket => {
                    let value = self.parse_array_literal();
                    obj.properties.push((key, Some(value)));
                    self.next_token();
                }
                _ => {
                    // Bare key with no value: an absent property.
                    obj.properties.push((key, None));
                }
            }

            if self.cur().kind == TokenKind::Comma {
                self.next_token();
            }
        }

        if self.cur().kind != TokenKind::RBrace {
            self.record(ParseErrorKind::MissingClosingBrace);
        }

        obj
    }

    /// `[ … ]` at expression position, a plain array literal. Tolerates
    /// trailing commas; ends on the closing `]`.
    fn parse_array_literal(&mut self) -> Expression {
        let pos = self.cur_pos();
        let mut elements = Vec::new();

        self.next_token(); // past '['

        while self.cur().kind != TokenKind::RBracket && self.cur().kind != TokenKind::Eof {
            if let Some(element) = self.parse_expression(Precedence::Lowest) {
                elements.push(element);
            }
            self.next_token();
            if self.cur().kind == TokenKind::Comma {
                self.next_token();
            }
        }

        Expression::Array { elements, pos }
    }

    /// The tabular `name [ template {…} map(p)=body rows… ]` body; the
    /// cursor is at `[` on entry. Row reading is deliberately tolerant of
    /// stray commas and leftover closing braces.
    fn parse_array_template(&mut self) -> Option<Expression> {
        let pos = self.cur_pos();
        self.next_token(); // past '['

        let mut keys: Vec<String> = Vec::new();
        let mut implicit = false;
        let has_template = self.cur().kind == TokenKind::Template;

        if has_template {
            self.next_token(); // onto '{'
            let header = self.parse_object_literal();
            keys = header.properties.into_iter().map(|(k, _)| k).collect();
            self.next_token(); // past '}'
        }

        let map = if self.cur().kind == TokenKind::Map {
            let clause = self.parse_map_clause()?;
            if !has_template {
                // A bare `map` synthesizes a single-key template named after
                // its parameter; rows are then scalars, not objects.
                keys = vec![clause.param.clone()];
                implicit = true;
            }
            Some(clause)
        } else {
            None
        };

        if keys.is_empty() {
            self.record(ParseErrorKind::TemplateOrMapExpected);
            while self.cur().kind != TokenKind::RBracket && self.cur().kind != TokenKind::Eof {
                self.next_token();
            }
            return None;
        }

        let expected_cols = keys.len();
        let mut rows: Vec<Vec<Expression>> = Vec::new();

        while self.cur().kind != TokenKind::RBracket && self.cur().kind != TokenKind::Eof {
            // Stray closers can remain after nested object parsing.
            while self.cur().kind == TokenKind::RBrace {
                self.next_token();
            }
            if self.cur().kind == TokenKind::RBracket || self.cur().kind == TokenKind::Eof {
                break;
            }

            let mut row = Vec::new();
            for _ in 0..expected_cols {
                if self.cur().kind == TokenKind::Comma {
                    self.next_token();
                }
                if self.cur().kind == TokenKind::RBracket {
                    break;
                }
                if let Some(expr) = self.parse_expression(Precedence::Lowest) {
                    row.push(expr);
                }
                self.next_token();
            }
            if !row.is_empty() {
                rows.push(row);
            }
            if self.cur().kind == TokenKind::Comma {
                self.next_token();
            }
        }

        Some(Expression::ArrayTemplate(ArrayTemplate {
            keys,
            implicit,
            map,
            rows,
            pos,
        }))
    }

    /// The `map (p) = body` tail inside an array template. Unlike the infix
    /// form this consumes past its body, leaving the cursor on the first row
    /// token.
    fn parse_map_clause(&mut self) -> Option<MapClause> {
        let pos = self.cur_pos();
        if self.peek().kind != TokenKind::LParen {
            self.record_expected_peek("'(' after map");
            return None;
        }
        self.next_token(); // onto '('
        if self.peek().kind != TokenKind::Ident {
            self.record_expected_peek("an iterator name");
            return None;
        }
        self.next_token(); // onto the parameter
        let param = self.cur().literal.clone();
        if self.peek().kind != TokenKind::RParen {
            self.record_expected_peek("')' after the iterator name");
            return None;
        }
        self.next_token(); // onto ')'
        if self.peek().kind != TokenKind::Assign {
            self.record_expected_peek("'=' before the map body");
            return None;
        }
        self.next_token(); // onto '='
        self.next_token(); // onto the body
        let body = self.parse_expression(Precedence::Lowest)?;
        self.next_token(); // past the body
        Some(MapClause {
            param,
            body: Box::new(body),
            pos,
        })
    }

    // === `@` forms: presets and validators ===

    fn parse_at_expression(&mut self) -> Option<Expression> {
        let pos = self.cur_pos();
        match self.peek().kind {
            TokenKind::Use => {
                self.next_token(); // onto 'use'
                if self.peek().kind != TokenKind::Str {
                    self.record_expected_peek("a preset name string after @use");
                    return None;
                }
                self.next_token(); // onto the name
                let name = self.cur().literal.clone();
                let overrides = self.parse_optional_overrides();
                Some(Expression::PresetRef {
                    name,
                    overrides,
                    pos,
                })
            }
            // Legacy `@"name"` reference.
            TokenKind::Str => {
                self.next_token();
                let name = self.cur().literal.clone();
                let overrides = self.parse_optional_overrides();
                Some(Expression::PresetRef {
                    name,
                    overrides,
                    pos,
                })
            }
            TokenKind::Ident => {
                self.next_token();
                let name = self.cur().literal.clone();
                let Some(kind) = ValidatorKind::from_name(&name) else {
                    self.record(ParseErrorKind::UnknownValidator { name });
                    return None;
                };
                let args = self.parse_optional_validator_args();
                let pattern = match (kind, args.first()) {
                    (ValidatorKind::Regex, Some(Expression::Str { value, .. })) => {
                        Some(value.clone())
                    }
                    _ => None,
                };
                Some(Expression::Validator {
                    kind,
                    pattern,
                    args,
                    pos,
                })
            }
            _ => {
                self.record_expected_peek("a validator or preset reference after '@'");
                None
            }
        }
    }

    fn parse_optional_overrides(&mut self) -> Option<ObjectLiteral> {
        if self.peek().kind == TokenKind::LBrace {
            self.next_token(); // onto '{'
            Some(self.parse_object_literal())
        } else {
            None
        }
    }

    /// Optional `( … )` after a validator name. Both `@uuid` and `@uuid()`
    /// are accepted; arguments are arbitrary expressions.
    fn parse_optional_validator_args(&mut self) -> Vec<Expression> {
        let mut args = Vec::new();
        if self.peek().kind != TokenKind::LParen {
            return args;
        }
        self.next_token(); // onto '('
        if self.peek().kind == TokenKind::RParen {
            self.next_token(); // onto ')'
            return args;
        }
        loop {
            self.next_token(); // onto the argument
            if let Some(arg) = self.parse_expression(Precedence::Lowest) {
                args.push(arg);
            }
            if self.peek().kind == TokenKind::Comma {
                self.next_token(); // onto ','
                continue;
            }
            break;
        }
        if self.peek().kind == TokenKind::RParen {
            self.next_token(); // onto ')'
        } else {
            self.record(ParseErrorKind::MissingClosingParen);
        }
        args
    }

    // === Interpolated strings ===

    fn parse_raw_string(&mut self) -> Expression {
        let pos = self.cur_pos();
        let value = self.cur().literal.clone();
        // Legacy interpolation form: `{expr}` inside raw strings.
        if value.contains('{') {
            return self.split_interpolation(&value, false, pos);
        }
        Expression::Str {
            value,
            is_raw: true,
            pos,
        }
    }

    fn parse_template_string(&mut self) -> Expression {
        let pos = self.cur_pos();
        let value = self.cur().literal.clone();
        if value.contains("${") {
            return self.split_interpolation(&value, true, pos);
        }
        Expression::Str {
            value,
            is_raw: true,
            pos,
        }
    }

    /// Splits a template (`${…}`) or legacy raw (`{…}`) literal into
    /// alternating text and embedded expressions. Each embedded snippet is
    /// re-lexed and re-parsed with a fresh sub-parser; a snippet that fails
    /// to parse stays literal text, markers included.
    fn split_interpolation(&mut self, content: &str, template: bool, pos: Pos) -> Expression {
        let bytes = content.as_bytes();
        let mut parts: Vec<StrPart> = Vec::new();
        let mut text = String::new();
        let mut i = 0;

        while i < bytes.len() {
            let at_marker = if template {
                i + 1 < bytes.len() && bytes[i] == b'$' && bytes[i + 1] == b'{'
            } else {
                bytes[i] == b'{'
            };

            if at_marker {
                let marker_len = if template { 2 } else { 1 };
                let start = i + marker_len;
                let mut depth = 1;
                let mut j = start;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }

                if depth == 0 {
                    if !text.is_empty() {
                        parts.push(StrPart::Text(std::mem::take(&mut text)));
                    }
                    let snippet = &content[start..j - 1];
                    match parse_snippet(snippet) {
                        Some(expr) => parts.push(StrPart::Expr(expr)),
                        None => {
                            // Unparseable: keep the segment verbatim.
                            if template {
                                text.push_str("${");
                            } else {
                                text.push('{');
                            }
                            text.push_str(snippet);
                            text.push('}');
                        }
                    }
                    i = j;
                } else {
                    // Unmatched opener: literal to the end.
                    text.push_str(&content[i..]);
                    i = bytes.len();
                }
            } else {
                let ch_len = utf8_len(bytes[i]);
                text.push_str(&content[i..i + ch_len]);
                i += ch_len;
            }
        }

        if !text.is_empty() {
            parts.push(StrPart::Text(text));
        }

        Expression::Interpolated {
            parts,
            template,
            pos,
        }
    }

    // === Token helpers ===

    fn cur(&self) -> &Token {
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().expect("lexer always emits EOF"))
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.position + 1)
            .unwrap_or_else(|| self.tokens.last().expect("lexer always emits EOF"))
    }

    fn cur_pos(&self) -> Pos {
        Pos::new(self.cur().line, self.cur().column)
    }

    fn next_token(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn record(&mut self, kind: ParseErrorKind) {
        let (line, column, len) = {
            let tok = self.cur();
            (tok.line, tok.column, tok.literal.len().max(1))
        };
        self.record_at(line, column, len, kind, Stage::Parse);
    }

    fn record_expected(&mut self, expected: &str) {
        let found = describe_token(self.cur());
        self.record(ParseErrorKind::UnexpectedToken {
            expected: expected.to_string(),
            found,
        });
    }

    fn record_expected_peek(&mut self, expected: &str) {
        let found = describe_token(self.peek());
        let (line, column, len) = {
            let tok = self.peek();
            (tok.line, tok.column, tok.literal.len().max(1))
        };
        self.record_at(
            line,
            column,
            len,
            ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found,
            },
            Stage::Parse,
        );
    }

    fn record_at(
        &mut self,
        line: usize,
        column: usize,
        len: usize,
        kind: ParseErrorKind,
        stage: Stage,
    ) {
        let offset = utils::offset_of(self.src.inner(), line, column);
        self.errors.push(ParseError {
            kind,
            stage,
            src: (*self.src).clone(),
            span: (offset, len).into(),
            line,
            column,
            file: self.file.clone(),
        });
    }
}

/// Parses one embedded interpolation snippet with a throwaway parser.
fn parse_snippet(text: &str) -> Option<Expression> {
    let mut parser = Parser::new(text, None);
    let expr = parser.parse_expression(Precedence::Lowest);
    if parser.errors.is_empty() {
        expr
    } else {
        None
    }
}

fn describe_token(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        "end of file".to_string()
    } else {
        format!("{:?}", token.literal)
    }
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let mut parser = Parser::new(source, None);
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "unexpected parse errors for {source:?}: {:?}",
            parser.errors()
        );
        program
    }

    fn first_value(program: &Program) -> &Expression {
        match &program.statements[0] {
            Statement::Assignment { value, .. } => value,
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_statement_dispatch() {
        let program = parse_ok("a = 1\nb := 2\nobj { x = 1 }\ninclude \"other.jsson\"");
        assert_eq!(program.statements.len(), 4);
        assert!(matches!(
            program.statements[0],
            Statement::Assignment { .. }
        ));
        assert!(matches!(program.statements[1], Statement::VarDecl { .. }));
        assert!(matches!(
            program.statements[2],
            Statement::Assignment { .. }
        ));
        assert!(matches!(program.statements[3], Statement::Include { .. }));
    }

    #[test]
    fn test_arithmetic_precedence() {
        let program = parse_ok("x = 1 + 2 * 3");
        match first_value(&program) {
            Expression::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => {
                assert!(matches!(
                    **right,
                    Expression::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected addition at the root, got {other:?}"),
        }
    }

    #[test]
    fn test_range_then_map_binds_whole_range() {
        let program = parse_ok("r = 1..3 map (x) = x * 2");
        match first_value(&program) {
            Expression::MapExpr { source, param, .. } => {
                assert_eq!(param, "x");
                assert!(matches!(**source, Expression::Range { .. }));
            }
            other => panic!("expected map over a range, got {other:?}"),
        }
    }

    #[test]
    fn test_range_with_step() {
        let program = parse_ok("r = 0..10 step 2");
        match first_value(&program) {
            Expression::Range { step, .. } => assert!(step.is_some()),
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_step() {
        let program = parse_ok("r = 10..0 step -2");
        match first_value(&program) {
            Expression::Range { step: Some(s), .. } => {
                assert!(matches!(**s, Expression::Int { value: -2, .. }));
            }
            other => panic!("expected range with step, got {other:?}"),
        }
    }

    #[test]
    fn test_ternary_right_associativity() {
        let program = parse_ok("v = a ? b ? c : d : e");
        match first_value(&program) {
            Expression::Conditional { consequence, .. } => {
                assert!(matches!(**consequence, Expression::Conditional { .. }));
            }
            other => panic!("expected ternary, got {other:?}"),
        }
    }

    #[test]
    fn test_ternary_binds_looser_than_comparison() {
        let program = parse_ok("v = x > 1 ? 1 : 2");
        match first_value(&program) {
            Expression::Conditional { condition, .. } => {
                assert!(matches!(
                    **condition,
                    Expression::Binary {
                        op: BinaryOp::Gt,
                        ..
                    }
                ));
            }
            other => panic!("expected ternary, got {other:?}"),
        }
    }

    #[test]
    fn test_unary_minus_folds_into_literals() {
        let program = parse_ok("a = -5\nb = -2.5\nc = -foo");
        match &program.statements[0] {
            Statement::Assignment { value, .. } => {
                assert!(matches!(value, Expression::Int { value: -5, .. }));
            }
            _ => unreachable!(),
        }
        match &program.statements[1] {
            Statement::Assignment { value, .. } => match value {
                Expression::Float { value, .. } => assert!((value + 2.5).abs() < f64::EPSILON),
                other => panic!("expected float literal, got {other:?}"),
            },
            _ => unreachable!(),
        }
        match &program.statements[2] {
            Statement::Assignment { value, .. } => {
                assert!(matches!(
                    value,
                    Expression::Binary {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_object_literal_shape() {
        let program = parse_ok("obj { base := 10, a = 1, b: 2, nested { c = 3 }, tags [1, 2], bare }");
        match first_value(&program) {
            Expression::Object(obj) => {
                assert_eq!(obj.declarations.len(), 1);
                assert_eq!(obj.declarations[0].name, "base");
                let keys: Vec<&str> = obj.properties.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["a", "b", "nested", "tags", "bare"]);
                assert!(obj.properties[4].1.is_none(), "bare key has no value");
            }
            other => panic!("expected object literal, got {other:?}"),
        }
    }

    #[test]
    fn test_array_template_with_header_and_map() {
        let program = parse_ok(
            r#"users [
                template { id, name }
                map (u) = { user_id = u.id }
                1..3, "alice"
            ]"#,
        );
        match first_value(&program) {
            Expression::ArrayTemplate(template) => {
                assert_eq!(template.keys, ["id", "name"]);
                assert!(!template.implicit);
                assert!(template.map.is_some());
                assert_eq!(template.rows.len(), 1);
                assert_eq!(template.rows[0].len(), 2);
            }
            other => panic!("expected array template, got {other:?}"),
        }
    }

    #[test]
    fn test_array_template_implicit_from_map() {
        let program = parse_ok("squares [ map (n) = n * n\n 1..4 ]");
        match first_value(&program) {
            Expression::ArrayTemplate(template) => {
                assert_eq!(template.keys, ["n"]);
                assert!(template.implicit);
                assert!(template.map.is_some());
            }
            other => panic!("expected array template, got {other:?}"),
        }
    }

    #[test]
    fn test_array_template_multiple_rows() {
        let program = parse_ok(
            r#"hosts [
                template { name, port }
                "web", 80
                "db", 5432
            ]"#,
        );
        match first_value(&program) {
            Expression::ArrayTemplate(template) => {
                assert_eq!(template.rows.len(), 2);
            }
            other => panic!("expected array template, got {other:?}"),
        }
    }

    #[test]
    fn test_preset_definition_and_use() {
        let program = parse_ok(
            r#"@preset "base" { port = 8080 }
               prod = @use "base" { port = 443 }
               legacy = @"base""#,
        );
        assert!(matches!(
            program.statements[0],
            Statement::Preset { ref name, .. } if name == "base"
        ));
        match &program.statements[1] {
            Statement::Assignment { value, .. } => match value {
                Expression::PresetRef {
                    name, overrides, ..
                } => {
                    assert_eq!(name, "base");
                    assert!(overrides.is_some());
                }
                other => panic!("expected preset ref, got {other:?}"),
            },
            _ => unreachable!(),
        }
        match &program.statements[2] {
            Statement::Assignment { value, .. } => {
                assert!(matches!(
                    value,
                    Expression::PresetRef {
                        overrides: None,
                        ..
                    }
                ));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_validators() {
        let program = parse_ok(
            "a = @uuid\nb = @uuid()\nc = @int(1, 100)\nd = @regex(\"^x+$\")\ne = @float(0.5, 2.5)",
        );
        let kinds: Vec<ValidatorKind> = program
            .statements
            .iter()
            .map(|s| match s {
                Statement::Assignment {
                    value: Expression::Validator { kind, .. },
                    ..
                } => *kind,
                other => panic!("expected validator assignment, got {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            [
                ValidatorKind::Uuid,
                ValidatorKind::Uuid,
                ValidatorKind::Int,
                ValidatorKind::Regex,
                ValidatorKind::Float,
            ]
        );
        match &program.statements[2] {
            Statement::Assignment {
                value: Expression::Validator { args, .. },
                ..
            } => assert_eq!(args.len(), 2),
            _ => unreachable!(),
        }
        match &program.statements[3] {
            Statement::Assignment {
                value: Expression::Validator { pattern, .. },
                ..
            } => assert_eq!(pattern.as_deref(), Some("^x+$")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_unknown_validator_is_an_error() {
        let mut parser = Parser::new("a = @nonsense", None);
        parser.parse_program();
        assert!(parser
            .errors()
            .iter()
            .any(|e| matches!(e.kind, ParseErrorKind::UnknownValidator { .. })));
    }

    #[test]
    fn test_template_string_interpolation() {
        let program = parse_ok("greeting = `hello ${name}, you are ${age + 1}!`");
        match first_value(&program) {
            Expression::Interpolated {
                parts, template, ..
            } => {
                assert!(*template);
                assert_eq!(parts.len(), 5);
                assert!(matches!(&parts[0], StrPart::Text(t) if t == "hello "));
                assert!(matches!(&parts[1], StrPart::Expr(Expression::Ident { name, .. }) if name == "name"));
                assert!(matches!(&parts[3], StrPart::Expr(Expression::Binary { .. })));
                assert!(matches!(&parts[4], StrPart::Text(t) if t == "!"));
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_interpolation_segment_stays_literal() {
        let program = parse_ok("s = `bad ${]} segment`");
        match first_value(&program) {
            Expression::Interpolated { parts, .. } => {
                let rendered: String = parts
                    .iter()
                    .map(|p| match p {
                        StrPart::Text(t) => t.clone(),
                        StrPart::Expr(_) => panic!("segment should not have parsed"),
                    })
                    .collect();
                assert_eq!(rendered, "bad ${]} segment");
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }
    }

    #[test]
    fn test_legacy_raw_string_interpolation() {
        let program = parse_ok("s = \"\"\"total: {count}\"\"\"");
        match first_value(&program) {
            Expression::Interpolated {
                parts, template, ..
            } => {
                assert!(!*template);
                assert!(matches!(&parts[1], StrPart::Expr(Expression::Ident { name, .. }) if name == "count"));
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }
    }

    #[test]
    fn test_member_access_chain() {
        let program = parse_ok("v = a.b.c");
        match first_value(&program) {
            Expression::Member {
                object, property, ..
            } => {
                assert_eq!(property, "c");
                assert!(matches!(**object, Expression::Member { .. }));
            }
            other => panic!("expected member access, got {other:?}"),
        }
    }

    #[test]
    fn test_errors_accumulate() {
        let mut parser = Parser::new("a = @bogus\nb = (1 + 2\nobj { x = 1 ", None);
        parser.parse_program();
        assert!(parser.errors().len() >= 3, "errors: {:?}", parser.errors());
    }

    #[test]
    fn test_missing_include_path() {
        let mut parser = Parser::new("include 42", None);
        parser.parse_program();
        assert!(parser
            .errors()
            .iter()
            .any(|e| matches!(e.kind, ParseErrorKind::IncludePathExpected)));
    }

    #[test]
    fn test_missing_ternary_colon() {
        let mut parser = Parser::new("v = a ? b", None);
        parser.parse_program();
        assert!(parser
            .errors()
            .iter()
            .any(|e| matches!(e.kind, ParseErrorKind::MissingColonInTernary)));
    }

    #[test]
    fn test_lexer_errors_surface_through_parser() {
        let mut parser = Parser::new("a = \"endless", None);
        parser.parse_program();
        assert!(parser.errors().iter().any(|e| e.stage == Stage::Lex));
    }

    #[test]
    fn test_node_positions_are_recorded() {
        let program = parse_ok("first = 1\nsecond = 2");
        assert_eq!(program.statements[0].pos(), Pos::new(1, 1));
        assert_eq!(program.statements[1].pos(), Pos::new(2, 1));
    }
}
