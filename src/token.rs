/// The kinds of tokens the lexer can produce.
///
/// Validator names (`uuid`, `email`, `int`, …) are deliberately absent from
/// this enum and from [`lookup_ident`]: they only have meaning after an `@`,
/// so the parser resolves them from plain [`TokenKind::Ident`] tokens. This
/// keeps `email = "ops@example.com"` a perfectly ordinary property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input.
    Eof,
    /// A character sequence the lexer could not make sense of.
    Illegal,

    // == Literals ==
    /// An identifier: keys, variable names, bare-word strings.
    Ident,
    /// Integer literal: `123`.
    Int,
    /// Float literal: `123.45`.
    Float,
    /// Quoted string with escape processing: `"hello\n"`.
    Str,
    /// Raw string, taken verbatim: `"""…"""` or ``` ```…``` ```.
    RawStr,
    /// Backtick template string; `${…}` segments are split by the parser.
    TemplateStr,

    // == Operators ==
    Assign,  // =
    Declare, // :=
    Colon,
    Question,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Range, // ..
    Dot,
    Plus,
    Minus,
    Slash,
    Asterisk,
    Percent,
    And, // &&
    Or,  // ||

    // == Delimiters ==
    Comma,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    /// `@`, the preset/validator prefix.
    At,

    // == Keywords ==
    True,
    False,
    Null,
    Template,
    Map,
    Include,
    Step,
    Preset,
    Use,
}

/// A single lexical token with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    /// 1-based line of the character that started the token.
    pub line: usize,
    /// 1-based column (in characters) of the character that started the token.
    pub column: usize,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: usize, column: usize) -> Token {
        Token {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }
}

/// Maps an identifier to its keyword token kind, or [`TokenKind::Ident`].
///
/// `yes`/`on` and `no`/`off` are alternate spellings of the boolean literals.
#[must_use]
pub fn lookup_ident(ident: &str) -> TokenKind {
    match ident {
        "true" | "yes" | "on" => TokenKind::True,
        "false" | "no" | "off" => TokenKind::False,
        "null" => TokenKind::Null,
        "template" => TokenKind::Template,
        "map" => TokenKind::Map,
        "include" => TokenKind::Include,
        "step" => TokenKind::Step,
        "preset" => TokenKind::Preset,
        "use" => TokenKind::Use,
        _ => TokenKind::Ident,
    }
}
