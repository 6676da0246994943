use crate::ast::Program;
use crate::error::{JssonError, ParseError};
use crate::evaluator::{Evaluator, MergeMode};
use crate::parser::Parser;
use crate::serialization;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Parses a source string into its AST, returning every syntax error found.
/// An empty error list means the program is safe to evaluate.
pub fn parse(source: &str, source_path: Option<&Path>) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(source, source_path);
    let program = parser.parse_program();
    (program, parser.into_errors())
}

/// The result of a successful transpilation: the fully evaluated root
/// object, ready to serialize into any of the output formats.
#[derive(Debug)]
pub struct Transpilation {
    pub root: Value,
}

impl Transpilation {
    /// Pretty-printed JSON, the canonical output format.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serialization::serialize_json(&self.root)
    }

    /// Block-style YAML.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serialization::serialize_yaml(&self.root)
    }

    /// TOML via the standard encoder. Roots containing `null` are not
    /// representable and fail here.
    ///
    /// # Errors
    /// Returns a `toml::ser::Error` if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        serialization::serialize_toml(&self.root)
    }

    /// TypeScript `as const` exports with `typeof` type aliases.
    #[must_use]
    pub fn to_typescript(&self) -> String {
        serialization::serialize_typescript(&self.root)
    }
}

/// Parses and evaluates a source string with the default `keep` merge mode.
///
/// This is the primary convenience entry point. `file_name` anchors both
/// diagnostics and relative `include` paths; pass `""` when the source has
/// no file (includes then resolve against the working directory).
///
/// # Errors
/// Returns [`JssonError::Parse`] carrying every syntax error when parsing
/// fails (evaluation is never attempted on a broken tree), or
/// [`JssonError::Eval`] for the first evaluation error.
pub fn transpile(source: &str, file_name: &str) -> Result<Transpilation, JssonError> {
    transpile_with(source, file_name, MergeMode::Keep)
}

/// [`transpile`] with an explicit include merge mode.
///
/// # Errors
/// Same conditions as [`transpile`].
pub fn transpile_with(
    source: &str,
    file_name: &str,
    merge_mode: MergeMode,
) -> Result<Transpilation, JssonError> {
    let path = (!file_name.is_empty()).then(|| Path::new(file_name));
    let (program, errors) = parse(source, path);
    if !errors.is_empty() {
        return Err(JssonError::Parse { errors });
    }

    let abs = path.map(|p| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(p)
        }
    });
    let base_dir = abs
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(
            || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            Path::to_path_buf,
        );

    let mut evaluator = Evaluator::new(&program, base_dir, merge_mode);
    if let Some(abs) = abs {
        evaluator = evaluator.with_source_file(abs, source);
    }

    let root = evaluator.evaluate()?;
    Ok(Transpilation { root })
}
