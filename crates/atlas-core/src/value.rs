//! Typed values for Atlas variables and parameters.
//!
//! The DSL is loosely typed at the surface: a `set` line carries an untyped
//! literal whose shape decides the runtime type. This module closes that over
//! a fixed sum type so every consumer (substitution, comparison, reporting)
//! works against explicit, documented rules instead of runtime inspection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A runtime value bound to a variable or parameter.
///
/// Equality in `$var == "…"` conditions is always string-based: both sides
/// are rendered with [`Value::to_display_string`] and compared as text. There
/// is deliberately no numeric coercion in comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Dict(BTreeMap<String, String>),
}

impl Value {
    /// Parse a DSL literal into a value.
    ///
    /// Recognized forms: `"quoted string"`, `'quoted string'`, `true`/`false`,
    /// integer, float, `[a, b, c]` (string list). Anything else is kept as a
    /// bare string.
    pub fn parse_literal(text: &str) -> Value {
        let trimmed = text.trim();
        if let Some(inner) = strip_quotes(trimmed) {
            return Value::Str(inner.to_string());
        }
        match trimmed {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Int(n);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        if let Some(body) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let items = if body.trim().is_empty() {
                Vec::new()
            } else {
                body.split(',')
                    .map(|item| {
                        let item = item.trim();
                        strip_quotes(item).unwrap_or(item).to_string()
                    })
                    .collect()
            };
            return Value::List(items);
        }
        Value::Str(trimmed.to_string())
    }

    /// Render the value for `$name` substitution and log output.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => format!("[{}]", items.join(", ")),
            Value::Dict(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// Strip one pair of matching surrounding quotes, if present.
pub(crate) fn strip_quotes(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}
