//! Output serializers over the evaluated [`Value`] tree.
//!
//! JSON is the canonical form: pretty-printed, two-space indentation, object
//! keys in insertion order. YAML and TOML reuse the same tree through each
//! encoder's defaults (TOML itself orders plain values before tables and has
//! no null, so a root containing `null` fails there). The TypeScript form
//! emits one `as const` export per top-level key plus a `typeof` type alias.

use crate::value::Value;
use std::fmt::Write as _;

/// Canonical pretty JSON.
pub fn serialize_json(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Block-style YAML via the encoder's defaults.
pub fn serialize_yaml(value: &Value) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}

/// TOML via the standard encoder.
pub fn serialize_toml(value: &Value) -> Result<String, toml::ser::Error> {
    toml::to_string(value)
}

/// TypeScript module source: `export const key = … as const;` for each root
/// key, followed by `export type Key = typeof key;` aliases.
#[must_use]
pub fn serialize_typescript(value: &Value) -> String {
    let mut out = String::new();
    let Value::Object(root) = value else {
        return out;
    };

    for (key, val) in root {
        let _ = write!(out, "export const {key} = ");
        write_ts_value(&mut out, val, 0);
        out.push_str(" as const;\n\n");
    }

    out.push_str("// Generated types\n");
    for key in root.keys() {
        let _ = writeln!(out, "export type {} = typeof {key};", capitalize(key));
    }

    out
}

fn write_ts_value(out: &mut String, value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Value::String(s) => {
            let _ = write!(out, "\"{}\"", escape_ts(s));
        }
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(",\n");
                }
                let _ = write!(out, "{pad}  {key}: ");
                write_ts_value(out, val, indent + 1);
            }
            let _ = write!(out, "\n{pad}}}");
        }
        Value::Array(items) | Value::Range(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                let _ = write!(out, "{pad}  ");
                write_ts_value(out, item, indent + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            let _ = write!(out, "{pad}]");
        }
    }
}

fn escape_ts(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Uppercases the first character; the rest of the key is untouched.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
