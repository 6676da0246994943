//! Error types for the three pipeline stages.
//!
//! Lexer and parser errors accumulate so a single run can report every
//! problem in a file; evaluation stops at the first error. Every error can be
//! rendered for the console with [`LexError::render`], [`ParseError::render`]
//! or [`EvalError::render`], which produce the stable `Role: file:line:col`
//! format downstream tools parse. The same errors implement
//! [`miette::Diagnostic`] so callers that want annotated source reports get
//! them for free.

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which pipeline stage produced a diagnostic. Controls the role prefix in
/// console renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Eval,
}

impl Stage {
    /// The role name used in console renderings. These exact strings are part
    /// of the diagnostics contract and must not change.
    #[must_use]
    pub fn herald(self) -> &'static str {
        match self {
            Stage::Lex => "Lex goblin",
            Stage::Parse => "Syntax wizard",
            Stage::Eval => "Transpile gremlin",
        }
    }
}

/// Formats the `file:line:col` context block shared by all renderers.
///
/// With a file and the text of the offending line, the line is echoed with a
/// caret under the column and the rendering ends there; otherwise the context
/// collapses to `line:col` (or `basename:line:col`) and the caller appends
/// the message. The flag reports whether the caret block was produced.
fn render_context(
    file: Option<&Path>,
    line_text: Option<&str>,
    line: usize,
    column: usize,
) -> (String, bool) {
    match file {
        Some(path) => {
            let basename = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            match line_text {
                Some(text) => (
                    format!(
                        "{}:{}:{}\n    {}\n    {}^",
                        basename,
                        line,
                        column,
                        text,
                        " ".repeat(column.saturating_sub(1))
                    ),
                    true,
                ),
                None => (format!("{basename}:{line}:{column}"), false),
            }
        }
        None => (format!("{line}:{column}"), false),
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("stumbled upon a strange character: {0:?}")]
    IllegalCharacter(char),
    #[error("found an endless string (missing closing quote)")]
    UnterminatedString,
}

/// A recoverable lexing error. The lexer keeps producing tokens after one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    #[must_use]
    pub fn render(&self, file: Option<&Path>, source: Option<&str>) -> String {
        let line_text = source.and_then(|s| crate::utils::line_text(s, self.line));
        let (context, has_snippet) = render_context(file, line_text, self.line, self.column);
        if has_snippet {
            format!("{}: {}", Stage::Lex.herald(), context)
        } else {
            format!("{}: {} — {}", Stage::Lex.herald(), context, self.kind)
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Lex(LexErrorKind),
    #[error("expected {expected} but found {found} instead")]
    UnexpectedToken { expected: String, found: String },
    #[error("expected '}}' — wizard can't find the closing brace")]
    MissingClosingBrace,
    #[error("expected ')' — wizard needs balanced parentheses")]
    MissingClosingParen,
    #[error("expected identifier after '.' — maybe use letters, not emojis")]
    ExpectedIdentifierAfterDot,
    #[error("expected ':' in ternary expression — wizard needs both ? and :")]
    MissingColonInTernary,
    #[error("could not parse {literal:?} as integer — maybe it's too spicy for me")]
    BadIntegerLiteral { literal: String },
    #[error("could not parse {literal:?} as float")]
    BadFloatLiteral { literal: String },
    #[error("expected a path string after include — wizard needs directions")]
    IncludePathExpected,
    #[error("expected a preset name string after @preset")]
    PresetNameExpected,
    #[error("array must have either a 'template' definition or a 'map' clause")]
    TemplateOrMapExpected,
    #[error("unknown validator @{name}")]
    UnknownValidator { name: String },
}

/// A parse error with full source attachment. The parser records these and
/// keeps going; callers check the accumulated list before evaluating.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{kind}")]
#[diagnostic(code(jsson::parse))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// `Stage::Lex` when this entry surfaces a tokenizer error.
    pub stage: Stage,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("{kind}")]
    pub span: SourceSpan,
    pub line: usize,
    pub column: usize,
    pub file: Option<PathBuf>,
}

impl ParseError {
    /// Console rendering: `Role: basename:line:col` with the source line and
    /// a caret when a file is known (the caret ends the rendering),
    /// `Role: line:col — message` otherwise.
    #[must_use]
    pub fn render(&self) -> String {
        let line_text = crate::utils::line_text(self.src.inner(), self.line);
        let (context, has_snippet) =
            render_context(self.file.as_deref(), line_text, self.line, self.column);
        if has_snippet {
            format!("{}: {}", self.stage.herald(), context)
        } else {
            format!("{}: {} — {}", self.stage.herald(), context, self.kind)
        }
    }
}

// ============================================================================
// Evaluator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("range bounds must be integers: {start} .. {end} — gremlin can't count with those")]
    RangeBoundsNotIntegers { start: String, end: String },
    #[error("step must be an integer: {step} — gremlin needs whole numbers to step")]
    StepNotInteger { step: String },
    #[error("step cannot be 0 — gremlin would be stuck forever!")]
    StepZero,
    #[error("string range requires a numeric suffix in both start and end (e.g., \"host01\"..\"host09\")")]
    StringRangeSuffixMissing,
    #[error("string range prefixes must match (start: {start:?}, end: {end:?})")]
    StringRangePrefixMismatch { start: String, end: String },
    #[error("division by zero — even gremlins can't divide by nothing!")]
    DivisionByZero,
    #[error("modulo by zero — gremlins are confused!")]
    ModuloByZero,
    #[error("unsupported binary operation: {left} {op} {right} — gremlin doesn't know how to do that math")]
    UnsupportedBinaryOp {
        left: String,
        op: String,
        right: String,
    },
    #[error("can't compare {left} and {right} — gremlin doesn't know how")]
    UnsupportedComparison { left: String, right: String },
    #[error("cannot apply operator {op:?} to a range — expand it or use it in an array context")]
    OperatorOnRange { op: String },
    #[error("property {name:?} not found — gremlin searched everywhere")]
    PropertyNotFound { name: String },
    #[error("left side of '.' is not an object — gremlin expected a map, found {found}")]
    MemberOnNonObject { found: String },
    #[error("map target is not an array, it's a {found} — gremlin is confused")]
    MapTargetNotArray { found: String },
    #[error("preset {name:?} not found — define it with @preset \"{name}\" {{ ... }}")]
    UnknownPreset { name: String },
    #[error("preset overrides must be an object")]
    PresetOverridesNotObject,
    #[error("cyclic include detected: {path} — gremlin is going in circles!")]
    CyclicInclude { path: String },
    #[error("could not read include file {path:?} — gremlin can't find it: {reason}")]
    IncludeUnreadable { path: String, reason: String },
    #[error("parse errors in included file {path:?} — wizard got confused:\n{details}")]
    IncludeParseErrors { path: String, details: String },
    #[error("transpile error in included file {path:?}: {source}")]
    IncludeEvalError {
        path: String,
        #[source]
        source: Box<EvalError>,
    },
    #[error("include merge conflict for key {key:?} from {path}")]
    IncludeMergeConflict { key: String, path: String },
}

/// An evaluation error. The first one aborts the evaluation.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[error("{kind}")]
#[diagnostic(code(jsson::eval))]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub line: usize,
    pub column: usize,
    pub file: Option<PathBuf>,
    /// Text of the offending source line, captured when the evaluator knows
    /// its source. Drives the caret rendering.
    pub source_line: Option<String>,
}

impl EvalError {
    #[must_use]
    pub fn render(&self) -> String {
        let (context, has_snippet) = render_context(
            self.file.as_deref(),
            self.source_line.as_deref(),
            self.line,
            self.column,
        );
        if has_snippet {
            format!("{}: {}", Stage::Eval.herald(), context)
        } else {
            format!("{}: {} — {}", Stage::Eval.herald(), context, self.kind)
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Error returned by the high-level [`transpile`](crate::transpile) entry
/// point.
#[derive(Debug, Error, Diagnostic)]
pub enum JssonError {
    #[error("parsing failed with {} error(s)", .errors.len())]
    #[diagnostic(code(jsson::parse))]
    Parse {
        #[related]
        errors: Vec<ParseError>,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

impl JssonError {
    /// Console renderings for every diagnostic carried by this error.
    #[must_use]
    pub fn render_all(&self) -> Vec<String> {
        match self {
            JssonError::Parse { errors } => errors.iter().map(ParseError::render).collect(),
            JssonError::Eval(err) => vec![err.render()],
        }
    }
}

/// Returned by [`MergeMode::from_str`](std::str::FromStr) on unknown input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid merge mode {0:?} (expected keep, overwrite or error)")]
pub struct InvalidMergeMode(pub String);

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.herald())
    }
}
