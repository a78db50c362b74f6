//! Variable and parameter bindings with `$name` text substitution.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Keywords that can never be used as variable names.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "if", "else", "endif", "while", "end_while", "repeat", "end_repeat", "for_each", "end_for",
    "break", "continue", "set", "param",
];

/// 1-based iteration index bound by `repeat` loops.
pub const LOOP_COUNTER: &str = "_loop_counter";
/// 0-based element index bound by `for_each` loops.
pub const LOOP_INDEX: &str = "_loop_index";
/// 1-based iteration index bound by `while` loops.
pub const LOOP_ITERATION: &str = "_loop_iteration";

const INTERPRETER_OWNED: &[&str] = &[LOOP_COUNTER, LOOP_INDEX, LOOP_ITERATION];

/// A named binding declared by a `set` or `param` line.
///
/// Parameters keep their declared value in `default_value` so a store can be
/// reset between runs; plain variables do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    pub is_parameter: bool,
    pub default_value: Option<Value>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            is_parameter: false,
            default_value: None,
        }
    }

    pub fn parameter(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: value.clone(),
            is_parameter: true,
            default_value: Some(value),
        }
    }
}

/// Returns true if `name` is a legal, non-reserved variable name.
///
/// Names follow `[A-Za-z_][A-Za-z0-9_]*`. The interpreter-owned loop
/// counters are rejected here too, so user declarations cannot shadow them.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let legal_shape = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    legal_shape && !RESERVED_KEYWORDS.contains(&name) && !INTERPRETER_OWNED.contains(&name)
}

/// Collect every `$name` reference in a piece of text, in order.
pub fn variable_references(text: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            continue;
        }
        let mut ident = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                ident.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if !ident.is_empty() {
            refs.push(ident);
        }
    }
    refs
}

/// Ordered map of live bindings for one parse or execution session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    vars: BTreeMap<String, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a declared variable, replacing any previous binding of the
    /// same name.
    pub fn declare(&mut self, variable: Variable) {
        self.vars.insert(variable.name.clone(), variable);
    }

    /// Bind `name` to `value`, keeping the parameter flag and default of an
    /// existing binding. Used by the interpreter for assignments and for the
    /// loop counters.
    pub fn bind(&mut self, name: &str, value: Value) {
        match self.vars.get_mut(name) {
            Some(existing) => existing.value = value,
            None => {
                self.vars
                    .insert(name.to_string(), Variable::new(name, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.vars.get(name).map(|v| &v.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    /// Apply caller-supplied overrides to declared parameters.
    ///
    /// Overriding a name that is not a declared parameter is a no-op, not an
    /// error. Returns how many overrides took effect.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, Value>) -> usize {
        let mut applied = 0;
        for (name, value) in overrides {
            if let Some(var) = self.vars.get_mut(name) {
                if var.is_parameter {
                    var.value = value.clone();
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Restore every parameter to its declared default value.
    pub fn reset_parameters(&mut self) {
        for var in self.vars.values_mut() {
            if let Some(default) = &var.default_value {
                var.value = default.clone();
            }
        }
    }

    /// Replace `$name` tokens with the display form of the bound value.
    /// References to unknown names are left untouched.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            let mut ident = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    ident.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            match self.vars.get(&ident) {
                Some(var) => out.push_str(&var.value.to_display_string()),
                None => {
                    out.push('$');
                    out.push_str(&ident);
                }
            }
        }
        out
    }

    /// `$name` references in `text` that have no binding in this store.
    pub fn unresolved_references(&self, text: &str) -> Vec<String> {
        variable_references(text)
            .into_iter()
            .filter(|name| !self.vars.contains_key(name))
            .collect()
    }

    /// Snapshot of every binding's current value, for execution reports.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .map(|(name, var)| (name.clone(), var.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("counter"));
        assert!(is_valid_name("_private"));
        assert!(is_valid_name("x2"));
        assert!(!is_valid_name("2x"));
        assert!(!is_valid_name("my-var"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("while"));
        assert!(!is_valid_name("set"));
        assert!(!is_valid_name("_loop_counter"));
    }

    #[test]
    fn test_substitute_known_and_unknown() {
        let mut store = VariableStore::new();
        store.declare(Variable::new("name", Value::Str("Alice".to_string())));
        store.declare(Variable::new("n", Value::Int(3)));
        assert_eq!(store.substitute("type \"$name\""), "type \"Alice\"");
        assert_eq!(store.substitute("wait $n"), "wait 3");
        assert_eq!(store.substitute("click $missing"), "click $missing");
        assert_eq!(store.substitute("cost: $ 5"), "cost: $ 5");
    }

    #[test]
    fn test_variable_references() {
        assert_eq!(
            variable_references("type \"$a $b\" then $a"),
            vec!["a", "b", "a"]
        );
        assert!(variable_references("no refs here").is_empty());
    }

    #[test]
    fn test_unresolved_references() {
        let mut store = VariableStore::new();
        store.declare(Variable::new("x", Value::Int(1)));
        assert_eq!(store.unresolved_references("$x $y"), vec!["y"]);
    }

    #[test]
    fn test_overrides_only_touch_parameters() {
        let mut store = VariableStore::new();
        store.declare(Variable::parameter("user", Value::Str("default".to_string())));
        store.declare(Variable::new("plain", Value::Int(1)));

        let mut overrides = HashMap::new();
        overrides.insert("user".to_string(), Value::Str("alice".to_string()));
        overrides.insert("plain".to_string(), Value::Int(9));
        overrides.insert("ghost".to_string(), Value::Int(9));

        assert_eq!(store.apply_overrides(&overrides), 1);
        assert_eq!(store.value("user"), Some(&Value::Str("alice".to_string())));
        assert_eq!(store.value("plain"), Some(&Value::Int(1)));
        assert!(store.value("ghost").is_none());
    }

    #[test]
    fn test_reset_parameters() {
        let mut store = VariableStore::new();
        store.declare(Variable::parameter("user", Value::Str("default".to_string())));
        store.bind("user", Value::Str("changed".to_string()));
        store.reset_parameters();
        assert_eq!(
            store.value("user"),
            Some(&Value::Str("default".to_string()))
        );
    }

    #[test]
    fn test_bind_keeps_parameter_flag() {
        let mut store = VariableStore::new();
        store.declare(Variable::parameter("p", Value::Int(1)));
        store.bind("p", Value::Int(2));
        let var = store.get("p").unwrap();
        assert!(var.is_parameter);
        assert_eq!(var.default_value, Some(Value::Int(1)));
        assert_eq!(var.value, Value::Int(2));
    }
}
