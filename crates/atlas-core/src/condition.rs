//! Boolean predicates used by `if` and `while`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::probe::EnvironmentProbe;
use crate::value::strip_quotes;
use crate::variables::VariableStore;

/// A parsed condition, immutable once built.
///
/// Environment-backed kinds are evaluated through an [`EnvironmentProbe`];
/// variable comparisons only need the current [`VariableStore`]. Comparison
/// is string-based on both sides (see [`crate::value::Value`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    ElementExists { selector: String },
    PageContains { text: String },
    ElementVisible { selector: String },
    ElementClickable { selector: String },
    UrlContains { text: String },
    TitleContains { text: String },
    VariableEquals { name: String, value: String },
    VariableNotEquals { name: String, value: String },
}

/// Parse condition text. Never fails: unrecognized text degrades to a
/// `page_contains` check over the whole text, a deliberately permissive
/// fallback so a half-written condition still parses and runs.
pub fn parse_condition(text: &str) -> Condition {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix('$') {
        if let Some(cond) = parse_comparison(rest) {
            return cond;
        }
    }

    if let Some((keyword, arg)) = trimmed.split_once(char::is_whitespace) {
        let arg = arg.trim();
        if !arg.is_empty() {
            let arg = strip_quotes(arg).unwrap_or(arg).to_string();
            match keyword {
                "element_exists" => return Condition::ElementExists { selector: arg },
                "page_contains" => return Condition::PageContains { text: arg },
                "element_visible" => return Condition::ElementVisible { selector: arg },
                "element_clickable" => return Condition::ElementClickable { selector: arg },
                "url_contains" => return Condition::UrlContains { text: arg },
                "title_contains" => return Condition::TitleContains { text: arg },
                _ => {}
            }
        }
    }

    Condition::PageContains {
        text: trimmed.to_string(),
    }
}

/// `name == "value"` / `name != "value"` after the leading `$`.
fn parse_comparison(rest: &str) -> Option<Condition> {
    let (op_index, negated) = match (rest.find("=="), rest.find("!=")) {
        (Some(eq), Some(ne)) if ne < eq => (ne, true),
        (_, Some(ne)) if rest.find("==").is_none() => (ne, true),
        (Some(eq), _) => (eq, false),
        _ => return None,
    };

    let name = rest[..op_index].trim();
    let raw_value = rest[op_index + 2..].trim();
    if name.is_empty() || raw_value.is_empty() {
        return None;
    }
    let value = strip_quotes(raw_value).unwrap_or(raw_value).to_string();
    let name = name.to_string();

    Some(if negated {
        Condition::VariableNotEquals { name, value }
    } else {
        Condition::VariableEquals { name, value }
    })
}

impl Condition {
    /// Evaluate against the live environment and the current variable store.
    ///
    /// A comparison against an undefined variable is false for `==` and true
    /// for `!=`.
    pub async fn evaluate(
        &self,
        probe: &dyn EnvironmentProbe,
        variables: &VariableStore,
    ) -> bool {
        match self {
            Condition::ElementExists { selector } => probe.element_exists(selector).await,
            Condition::PageContains { text } => probe.page_contains(text).await,
            Condition::ElementVisible { selector } => probe.element_visible(selector).await,
            Condition::ElementClickable { selector } => probe.element_clickable(selector).await,
            Condition::UrlContains { text } => probe.url_contains(text).await,
            Condition::TitleContains { text } => probe.title_contains(text).await,
            Condition::VariableEquals { name, value } => variables
                .value(name)
                .map(|v| v.to_display_string() == *value)
                .unwrap_or(false),
            Condition::VariableNotEquals { name, value } => variables
                .value(name)
                .map(|v| v.to_display_string() != *value)
                .unwrap_or(true),
        }
    }

    /// The variable this condition reads, if it is a comparison.
    pub fn referenced_variable(&self) -> Option<&str> {
        match self {
            Condition::VariableEquals { name, .. }
            | Condition::VariableNotEquals { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::ElementExists { selector } => write!(f, "element_exists \"{}\"", selector),
            Condition::PageContains { text } => write!(f, "page_contains \"{}\"", text),
            Condition::ElementVisible { selector } => {
                write!(f, "element_visible \"{}\"", selector)
            }
            Condition::ElementClickable { selector } => {
                write!(f, "element_clickable \"{}\"", selector)
            }
            Condition::UrlContains { text } => write!(f, "url_contains \"{}\"", text),
            Condition::TitleContains { text } => write!(f, "title_contains \"{}\"", text),
            Condition::VariableEquals { name, value } => {
                write!(f, "${} == \"{}\"", name, value)
            }
            Condition::VariableNotEquals { name, value } => {
                write!(f, "${} != \"{}\"", name, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticProbe;
    use crate::value::Value;
    use crate::variables::Variable;

    #[test]
    fn test_parse_environment_conditions() {
        assert_eq!(
            parse_condition("element_exists \"login-button\""),
            Condition::ElementExists {
                selector: "login-button".to_string()
            }
        );
        assert_eq!(
            parse_condition("url_contains \"/checkout\""),
            Condition::UrlContains {
                text: "/checkout".to_string()
            }
        );
        assert_eq!(
            parse_condition("title_contains Dashboard"),
            Condition::TitleContains {
                text: "Dashboard".to_string()
            }
        );
    }

    #[test]
    fn test_parse_comparisons() {
        assert_eq!(
            parse_condition("$status == \"Ready\""),
            Condition::VariableEquals {
                name: "status".to_string(),
                value: "Ready".to_string()
            }
        );
        assert_eq!(
            parse_condition("$status != \"Error\""),
            Condition::VariableNotEquals {
                name: "status".to_string(),
                value: "Error".to_string()
            }
        );
        assert_eq!(
            parse_condition("$count == 3"),
            Condition::VariableEquals {
                name: "count".to_string(),
                value: "3".to_string()
            }
        );
    }

    #[test]
    fn test_unrecognized_text_falls_back_to_page_contains() {
        assert_eq!(
            parse_condition("the cart is empty"),
            Condition::PageContains {
                text: "the cart is empty".to_string()
            }
        );
        // A keyword with no argument is not a recognized condition either.
        assert_eq!(
            parse_condition("element_exists"),
            Condition::PageContains {
                text: "element_exists".to_string()
            }
        );
        // Malformed comparison.
        assert_eq!(
            parse_condition("$x =="),
            Condition::PageContains {
                text: "$x ==".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_evaluate_variable_comparison() {
        let probe = StaticProbe::new();
        let mut vars = VariableStore::new();
        vars.declare(Variable::new("status", Value::Str("Ready".to_string())));
        vars.declare(Variable::new("count", Value::Int(3)));

        assert!(
            parse_condition("$status == \"Ready\"")
                .evaluate(&probe, &vars)
                .await
        );
        // String comparison only; Int renders as its decimal form.
        assert!(parse_condition("$count == \"3\"").evaluate(&probe, &vars).await);
        assert!(
            parse_condition("$status != \"Error\"")
                .evaluate(&probe, &vars)
                .await
        );
    }

    #[tokio::test]
    async fn test_evaluate_undefined_variable() {
        let probe = StaticProbe::new();
        let vars = VariableStore::new();
        assert!(!parse_condition("$ghost == \"x\"").evaluate(&probe, &vars).await);
        assert!(parse_condition("$ghost != \"x\"").evaluate(&probe, &vars).await);
    }

    #[tokio::test]
    async fn test_evaluate_environment_conditions() {
        let probe = StaticProbe::new()
            .with_page_text("Order complete")
            .with_element(crate::probe::ElementHandle::new("ok-button"));
        let vars = VariableStore::new();

        assert!(
            parse_condition("element_exists \"ok-button\"")
                .evaluate(&probe, &vars)
                .await
        );
        assert!(
            parse_condition("page_contains \"complete\"")
                .evaluate(&probe, &vars)
                .await
        );
        assert!(
            !parse_condition("element_visible \"ok-button\"")
                .evaluate(&probe, &vars)
                .await
        );
    }
}
