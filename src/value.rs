//! The evaluated value tree.
//!
//! [`Value`] is the JSON-compatible output of the evaluator, plus one
//! internal-only variant: [`Value::Range`]. A range must be iterable by `map`
//! and template-row zipping *and* splice itself into surrounding array
//! literals, but it must never reach serialization. Producers tag it at
//! construction; every consumer either splices, iterates, or rejects it, and
//! the evaluator unwraps it to a plain array at each binding site.

use indexmap::IndexMap;
use serde::Serialize;

/// A fully evaluated JSSON value.
///
/// Objects preserve key insertion order; duplicate keys keep their first
/// position and their last value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Internal result of a `..` expression. Flattens when spliced into an
    /// array literal, zips inside template rows, iterates under `map`, and is
    /// rejected by every operator. Serializes as a plain array as a last
    /// line of defense, but [`Value::unwrap_range`] runs first at every
    /// binding site.
    Range(Vec<Value>),
}

impl Value {
    /// Converts an internal range into the plain array it represents.
    /// Identity for every other variant.
    #[must_use]
    pub fn unwrap_range(self) -> Value {
        match self {
            Value::Range(items) => Value::Array(items),
            other => other,
        }
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(self, Value::Range(_))
    }

    /// Human-readable type name for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Range(_) => "range",
        }
    }

    /// The default string conversion used by `+` concatenation and string
    /// interpolation: booleans lowercase, integers as digits, floats via the
    /// shortest round-trip form, arrays and objects as compact JSON.
    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) | Value::Range(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Short rendering used in operator error messages: strings quoted,
    /// compound values by type name.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Value::String(s) => format!("{s:?}"),
            Value::Array(_) | Value::Object(_) | Value::Range(_) => self.type_name().to_string(),
            other => other.display_string(),
        }
    }
}
