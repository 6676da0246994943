//! The typed syntax tree produced by the parser.
//!
//! Every node carries the [`Pos`] of the token it grew from; positions are
//! never synthesized. Object literals record their keys in insertion order so
//! the evaluator and serializers can preserve it.

/// 1-based line/column of a node's first token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Pos {
        Pos { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name = value`, evaluated into the output root.
    Assignment {
        name: String,
        value: Expression,
        pos: Pos,
    },
    /// `name := value`, bound in the symbol table and never emitted.
    VarDecl {
        name: String,
        value: Expression,
        pos: Pos,
    },
    /// `include "file"`, merging another file's root into this one.
    Include { path: String, pos: Pos },
    /// `@preset "name" { … }`, storing the body for later references.
    Preset {
        name: String,
        body: ObjectLiteral,
        pos: Pos,
    },
}

/// A local `name := value` inside an object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: Expression,
    pub pos: Pos,
}

/// `{ decls… props… }`. Declarations bind into a child scope first;
/// properties then evaluate under that scope, in recorded order. A property
/// with no value (bare key) is carried as `None` and produces nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLiteral {
    pub declarations: Vec<Declaration>,
    pub properties: Vec<(String, Option<Expression>)>,
    pub pos: Pos,
}

/// The `map (p) = body` tail of an array template.
#[derive(Debug, Clone, PartialEq)]
pub struct MapClause {
    pub param: String,
    pub body: Box<Expression>,
    pub pos: Pos,
}

/// The tabular `name [ template {k1, …} map(p)=body rows… ]` form.
///
/// `implicit` marks a template synthesized from a bare `map` clause: its
/// single key equals the map parameter and rows are scalars, not objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayTemplate {
    pub keys: Vec<String>,
    pub implicit: bool,
    pub map: Option<MapClause>,
    pub rows: Vec<Vec<Expression>>,
    pub pos: Pos,
}

/// A piece of an interpolated string: literal text or an embedded expression.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Text(String),
    Expr(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The built-in value generators reachable through `@name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorKind {
    Uuid,
    Email,
    Url,
    Ipv4,
    Ipv6,
    Filepath,
    Date,
    Datetime,
    Regex,
    Int,
    Float,
    Bool,
}

impl ValidatorKind {
    /// Resolves a bare name following `@`. Returns `None` for anything that
    /// is not a validator, letting the parser report it.
    #[must_use]
    pub fn from_name(name: &str) -> Option<ValidatorKind> {
        Some(match name {
            "uuid" => ValidatorKind::Uuid,
            "email" => ValidatorKind::Email,
            "url" => ValidatorKind::Url,
            "ipv4" => ValidatorKind::Ipv4,
            "ipv6" => ValidatorKind::Ipv6,
            "filepath" => ValidatorKind::Filepath,
            "date" => ValidatorKind::Date,
            "datetime" => ValidatorKind::Datetime,
            "regex" => ValidatorKind::Regex,
            "int" => ValidatorKind::Int,
            "float" => ValidatorKind::Float,
            "bool" => ValidatorKind::Bool,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Int {
        value: i64,
        pos: Pos,
    },
    Float {
        value: f64,
        pos: Pos,
    },
    Bool {
        value: bool,
        pos: Pos,
    },
    Null {
        pos: Pos,
    },
    Str {
        value: String,
        is_raw: bool,
        pos: Pos,
    },
    Ident {
        name: String,
        pos: Pos,
    },
    Validator {
        kind: ValidatorKind,
        pattern: Option<String>,
        args: Vec<Expression>,
        pos: Pos,
    },
    /// Built at parse time from a template (or legacy raw) string containing
    /// interpolation markers. `template` selects the `${name}` placeholder
    /// form when an identifier stays unresolved at evaluation.
    Interpolated {
        parts: Vec<StrPart>,
        template: bool,
        pos: Pos,
    },
    Object(ObjectLiteral),
    Array {
        elements: Vec<Expression>,
        pos: Pos,
    },
    ArrayTemplate(ArrayTemplate),
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
        step: Option<Box<Expression>>,
        pos: Pos,
    },
    MapExpr {
        source: Box<Expression>,
        param: String,
        body: Box<Expression>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        pos: Pos,
    },
    Conditional {
        condition: Box<Expression>,
        consequence: Box<Expression>,
        alternative: Box<Expression>,
        pos: Pos,
    },
    Member {
        object: Box<Expression>,
        property: String,
        pos: Pos,
    },
    /// `@use "name" { overrides? }` or legacy `@"name" { overrides? }`.
    PresetRef {
        name: String,
        overrides: Option<ObjectLiteral>,
        pos: Pos,
    },
}

impl Expression {
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Expression::Int { pos, .. }
            | Expression::Float { pos, .. }
            | Expression::Bool { pos, .. }
            | Expression::Null { pos }
            | Expression::Str { pos, .. }
            | Expression::Ident { pos, .. }
            | Expression::Validator { pos, .. }
            | Expression::Interpolated { pos, .. }
            | Expression::Array { pos, .. }
            | Expression::Range { pos, .. }
            | Expression::MapExpr { pos, .. }
            | Expression::Binary { pos, .. }
            | Expression::Conditional { pos, .. }
            | Expression::Member { pos, .. }
            | Expression::PresetRef { pos, .. } => *pos,
            Expression::Object(obj) => obj.pos,
            Expression::ArrayTemplate(template) => template.pos,
        }
    }
}

impl Statement {
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Statement::Assignment { pos, .. }
            | Statement::VarDecl { pos, .. }
            | Statement::Include { pos, .. }
            | Statement::Preset { pos, .. } => *pos,
        }
    }
}
