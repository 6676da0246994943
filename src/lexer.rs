//! # JSSON Lexer (Tokenizer)
//!
//! The lexer is the first stage of the pipeline. It converts a raw source
//! string into a sequence of [`Token`]s: literals, operators, delimiters,
//! keywords, and the four string flavors (`"…"`, `"""…"""`, `` `…` ``,
//! ```` ```…``` ````).
//!
//! It is a hand-written, stateful scanner over a character cursor. Every
//! token records the 1-based line and column of the character that started
//! it; newlines inside raw and template strings advance the line counter, so
//! positions stay accurate across multi-line literals.
//!
//! Lexing never stops at an error: an unrecognizable character or an
//! unterminated string produces an [`TokenKind::Illegal`] token, the error is
//! recorded, and scanning continues. Callers check [`Lexer::errors`] when
//! they care.
//!
//! ```rust
//! use jsson_core::lexer::Lexer;
//! use jsson_core::token::TokenKind;
//!
//! let mut lexer = Lexer::new("port = 8080 // comment");
//! assert_eq!(lexer.next_token().kind, TokenKind::Ident);
//! assert_eq!(lexer.next_token().kind, TokenKind::Assign);
//! assert_eq!(lexer.next_token().kind, TokenKind::Int);
//! assert_eq!(lexer.next_token().kind, TokenKind::Eof);
//! ```

use crate::error::{LexError, LexErrorKind};
use crate::token::{lookup_ident, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    errors: Vec<LexError>,
}

impl Lexer {
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
        }
    }

    /// Tokenizes the entire input, including the final [`TokenKind::Eof`].
    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Recoverable errors collected so far, in source order.
    #[must_use]
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    /// Scans and returns the next token. At end of input it returns
    /// [`TokenKind::Eof`] tokens forever.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.current() else {
            return Token::new(TokenKind::Eof, "", line, column);
        };

        match ch {
            '=' => self.one_or_two(line, column, TokenKind::Assign, '=', TokenKind::Eq),
            '<' => self.one_or_two(line, column, TokenKind::Lt, '=', TokenKind::Le),
            '>' => self.one_or_two(line, column, TokenKind::Gt, '=', TokenKind::Ge),
            ':' => self.one_or_two(line, column, TokenKind::Colon, '=', TokenKind::Declare),
            '.' => self.one_or_two(line, column, TokenKind::Dot, '.', TokenKind::Range),
            '!' => self.required_pair(line, column, '=', TokenKind::NotEq),
            '&' => self.required_pair(line, column, '&', TokenKind::And),
            '|' => self.required_pair(line, column, '|', TokenKind::Or),
            '?' => self.single(line, column, TokenKind::Question, ch),
            ',' => self.single(line, column, TokenKind::Comma, ch),
            '{' => self.single(line, column, TokenKind::LBrace, ch),
            '}' => self.single(line, column, TokenKind::RBrace, ch),
            '[' => self.single(line, column, TokenKind::LBracket, ch),
            ']' => self.single(line, column, TokenKind::RBracket, ch),
            '(' => self.single(line, column, TokenKind::LParen, ch),
            ')' => self.single(line, column, TokenKind::RParen, ch),
            '+' => self.single(line, column, TokenKind::Plus, ch),
            '-' => self.single(line, column, TokenKind::Minus, ch),
            '*' => self.single(line, column, TokenKind::Asterisk, ch),
            '/' => self.single(line, column, TokenKind::Slash, ch),
            '%' => self.single(line, column, TokenKind::Percent, ch),
            '@' => self.single(line, column, TokenKind::At, ch),
            '"' => self.read_quote_flavor(line, column),
            '`' => self.read_backtick_flavor(line, column),
            c if is_letter(c) => self.read_identifier(line, column),
            c if c.is_ascii_digit() => self.read_number(line, column),
            c => {
                self.record(line, column, LexErrorKind::IllegalCharacter(c));
                self.advance();
                Token::new(TokenKind::Illegal, c, line, column)
            }
        }
    }

    // === Cursor primitives ===

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(c) if c == ' ' || c == '\t' || c == '\n' || c == '\r' => self.advance(),
                Some('/') if self.peek() == Some('/') => {
                    while let Some(c) = self.current() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn record(&mut self, line: usize, column: usize, kind: LexErrorKind) {
        self.errors.push(LexError { kind, line, column });
    }

    // === Token builders ===

    fn single(&mut self, line: usize, column: usize, kind: TokenKind, ch: char) -> Token {
        self.advance();
        Token::new(kind, ch, line, column)
    }

    /// One-character token, upgraded to a two-character token when the next
    /// character matches (`=` → `==`, `.` → `..`, `:` → `:=`, …).
    fn one_or_two(
        &mut self,
        line: usize,
        column: usize,
        single: TokenKind,
        second: char,
        double: TokenKind,
    ) -> Token {
        let first = self.current().unwrap_or_default();
        if self.peek() == Some(second) {
            self.advance();
            self.advance();
            Token::new(double, format!("{first}{second}"), line, column)
        } else {
            self.advance();
            Token::new(single, first, line, column)
        }
    }

    /// Operators whose first character is illegal on its own (`!`, `&`, `|`).
    fn required_pair(
        &mut self,
        line: usize,
        column: usize,
        second: char,
        kind: TokenKind,
    ) -> Token {
        let first = self.current().unwrap_or_default();
        if self.peek() == Some(second) {
            self.advance();
            self.advance();
            Token::new(kind, format!("{first}{second}"), line, column)
        } else {
            self.record(line, column, LexErrorKind::IllegalCharacter(first));
            self.advance();
            Token::new(TokenKind::Illegal, first, line, column)
        }
    }

    // === Strings ===

    /// Dispatches `"` between a quoted string, the empty string `""`, and the
    /// triple-quoted raw form `"""…"""`.
    fn read_quote_flavor(&mut self, line: usize, column: usize) -> Token {
        self.advance(); // opening quote
        if self.current() == Some('"') {
            if self.peek() == Some('"') {
                self.advance();
                self.advance(); // past the third quote
                return match self.read_raw('"') {
                    Some(value) => Token::new(TokenKind::RawStr, value, line, column),
                    None => self.unterminated(line, column),
                };
            }
            // Just two quotes: the empty string.
            self.advance();
            return Token::new(TokenKind::Str, "", line, column);
        }
        match self.read_quoted() {
            Some(value) => Token::new(TokenKind::Str, value, line, column),
            None => self.unterminated(line, column),
        }
    }

    /// Dispatches `` ` `` between a template string, the empty template
    /// ``` `` ```, and the triple-backtick raw form.
    fn read_backtick_flavor(&mut self, line: usize, column: usize) -> Token {
        self.advance(); // opening backtick
        if self.current() == Some('`') {
            if self.peek() == Some('`') {
                self.advance();
                self.advance();
                return match self.read_raw('`') {
                    Some(value) => Token::new(TokenKind::RawStr, value, line, column),
                    None => self.unterminated(line, column),
                };
            }
            self.advance();
            return Token::new(TokenKind::TemplateStr, "", line, column);
        }
        match self.read_template() {
            Some(value) => Token::new(TokenKind::TemplateStr, value, line, column),
            None => self.unterminated(line, column),
        }
    }

    fn unterminated(&mut self, line: usize, column: usize) -> Token {
        self.record(line, column, LexErrorKind::UnterminatedString);
        Token::new(TokenKind::Illegal, "", line, column)
    }

    /// Body of a `"…"` string, opening quote already consumed. Recognizes
    /// `\n \t \" \\`; any other escape keeps its backslash verbatim.
    fn read_quoted(&mut self) -> Option<String> {
        let mut value = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Some(value);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => return None,
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return None,
            }
        }
    }

    /// Body of a triple-delimited raw string, taken byte-verbatim until the
    /// first run of three `term` characters. The opening run is already
    /// consumed.
    fn read_raw(&mut self, term: char) -> Option<String> {
        let mut value = String::new();
        loop {
            match self.current() {
                Some(c) if c == term && self.peek() == Some(term) => {
                    self.advance(); // sitting on the second delimiter now
                    if self.peek() == Some(term) {
                        self.advance();
                        self.advance(); // past the closing run
                        return Some(value);
                    }
                    // Only two delimiters: literal content.
                    value.push(term);
                    value.push(term);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return None,
            }
        }
    }

    /// Body of a `` `…` `` template string, verbatim; `${…}` is left for the
    /// parser to split.
    fn read_template(&mut self) -> Option<String> {
        let mut value = String::new();
        loop {
            match self.current() {
                Some('`') => {
                    self.advance();
                    return Some(value);
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return None,
            }
        }
    }

    // === Identifiers and numbers ===

    fn read_identifier(&mut self, line: usize, column: usize) -> Token {
        let mut ident = String::new();
        while let Some(c) = self.current() {
            if is_letter(c) || c.is_ascii_digit() {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(lookup_ident(&ident), ident, line, column)
    }

    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let mut number = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                number.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            number.push('.');
            self.advance();
            while let Some(c) = self.current() {
                if c.is_ascii_digit() {
                    number.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            return Token::new(TokenKind::Float, number, line, column);
        }
        Token::new(TokenKind::Int, number, line, column)
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}
