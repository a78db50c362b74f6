//! Semantic lint pass over raw script text.
//!
//! Heuristics only, never fatal: odd wait durations, interactions with no
//! settling wait after them, references to applications or selectors absent
//! from the caller's resource inventory, and adjacent command pairs known to
//! conflict. Everything surfaces as advisory lists the caller may display or
//! ignore.

use serde::{Deserialize, Serialize};

/// Waits shorter than this are probably typos for a longer pause.
const MIN_REASONABLE_WAIT: f64 = 0.5;
/// Waits longer than this stall the whole run.
const MAX_REASONABLE_WAIT: f64 = 10.0;

/// How many following statements to scan for a settling `wait`.
const WAIT_LOOKAHEAD: usize = 2;

/// Commands that conventionally need a wait after them.
const NEEDS_SETTLING_WAIT: &[&str] = &["click", "navigate", "open", "press"];

/// Adjacent command pairs that conflict with each other.
const CONFLICTING_PAIRS: &[(&str, &str)] = &[
    ("navigate", "close_tab"),
    ("open", "close_app"),
    ("type", "navigate"),
];

/// Resource inventory supplied by the caller for cross-checking references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceInventory {
    /// Applications available on the target (matched against `open` args).
    pub applications: Vec<String>,
    /// Selectors known to exist (matched against `click`/`type` args).
    pub selectors: Vec<String>,
}

/// Advisory findings from one semantic pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticReport {
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub resource_issues: Vec<String>,
    pub timing_issues: Vec<String>,
    pub logic_issues: Vec<String>,
}

impl SemanticReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
            && self.suggestions.is_empty()
            && self.resource_issues.is_empty()
            && self.timing_issues.is_empty()
            && self.logic_issues.is_empty()
    }
}

/// Run the semantic lint pass. `context` is optional; resource checks are
/// skipped without it.
pub fn validate_semantics(
    script_text: &str,
    context: Option<&ResourceInventory>,
) -> SemanticReport {
    let mut report = SemanticReport::default();

    // Statements only, with their original line numbers.
    let statements: Vec<(usize, &str)> = script_text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .collect();

    for (position, &(line_no, statement)) in statements.iter().enumerate() {
        let (command, rest) = match statement.split_once(char::is_whitespace) {
            Some((c, rest)) => (c, rest.trim()),
            None => (statement, ""),
        };

        if command == "wait" {
            check_wait_duration(line_no, rest, &mut report);
        }

        if NEEDS_SETTLING_WAIT.contains(&command)
            && !followed_by_wait(&statements, position)
        {
            report.timing_issues.push(format!(
                "line {}: '{}' has no wait within the next {} statements",
                line_no, command, WAIT_LOOKAHEAD
            ));
            report.suggestions.push(format!(
                "line {}: add a short wait after '{}' to let the UI settle",
                line_no, command
            ));
        }

        if let Some(inventory) = context {
            check_resources(line_no, command, rest, inventory, &mut report);
        }

        if let Some(&(next_line, next)) = statements.get(position + 1) {
            let next_command = next.split_whitespace().next().unwrap_or("");
            if CONFLICTING_PAIRS
                .iter()
                .any(|&(a, b)| a == command && b == next_command)
            {
                report.logic_issues.push(format!(
                    "lines {}-{}: '{}' immediately followed by '{}' conflict",
                    line_no, next_line, command, next_command
                ));
            }
            if statement == next {
                report.logic_issues.push(format!(
                    "lines {}-{}: duplicate consecutive statement '{}'",
                    line_no, next_line, statement
                ));
            }
        }
    }

    report
}

fn check_wait_duration(line_no: usize, rest: &str, report: &mut SemanticReport) {
    let numeric = rest.strip_suffix('s').unwrap_or(rest);
    let Ok(duration) = numeric.parse::<f64>() else {
        // Malformed durations belong to the syntactic validator.
        return;
    };
    if duration < MIN_REASONABLE_WAIT {
        report.timing_issues.push(format!(
            "line {}: wait of {}s is shorter than {}s and may race the UI",
            line_no, duration, MIN_REASONABLE_WAIT
        ));
    } else if duration > MAX_REASONABLE_WAIT {
        report.timing_issues.push(format!(
            "line {}: wait of {}s is longer than {}s and will stall the run",
            line_no, duration, MAX_REASONABLE_WAIT
        ));
    }
}

fn followed_by_wait(statements: &[(usize, &str)], position: usize) -> bool {
    statements
        .iter()
        .skip(position + 1)
        .take(WAIT_LOOKAHEAD)
        .any(|(_, s)| s.split_whitespace().next() == Some("wait"))
}

fn first_quoted(text: &str) -> Option<&str> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn check_resources(
    line_no: usize,
    command: &str,
    rest: &str,
    inventory: &ResourceInventory,
    report: &mut SemanticReport,
) {
    match command {
        "open" => {
            if let Some(app) = first_quoted(rest) {
                if !inventory.applications.is_empty()
                    && !inventory.applications.iter().any(|a| a == app)
                {
                    report.resource_issues.push(format!(
                        "line {}: application '{}' not found in the resource inventory",
                        line_no, app
                    ));
                }
            }
        }
        "click" | "type" => {
            if let Some(selector) = first_quoted(rest) {
                if !inventory.selectors.is_empty()
                    && selector_unknown(selector, &inventory.selectors)
                {
                    report.resource_issues.push(format!(
                        "line {}: selector '{}' not found in the resource inventory",
                        line_no, selector
                    ));
                }
            }
        }
        _ => {}
    }
}

fn selector_unknown(selector: &str, known: &[String]) -> bool {
    // Substituted selectors can't be checked statically.
    !selector.contains('$') && !known.iter().any(|s| s == selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_script() {
        let report = validate_semantics("open \"app\"\nwait 2s\nclick \"x\"\nwait 1\n", None);
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn test_wait_duration_bounds() {
        let report = validate_semantics("wait 0.1\nwait 30s\nwait 2\n", None);
        assert_eq!(report.timing_issues.len(), 2);
        assert!(report.timing_issues[0].contains("shorter"));
        assert!(report.timing_issues[1].contains("longer"));
    }

    #[test]
    fn test_missing_settling_wait() {
        let report = validate_semantics("click \"a\"\ntype \"b\"\ntype \"c\"\n", None);
        assert_eq!(report.timing_issues.len(), 1);
        assert!(report.timing_issues[0].contains("'click'"));
        assert!(!report.suggestions.is_empty());
    }

    #[test]
    fn test_wait_within_lookahead_suppresses_issue() {
        let report = validate_semantics("click \"a\"\ntype \"b\"\nwait 1\n", None);
        assert!(report.timing_issues.is_empty());
    }

    #[test]
    fn test_resource_inventory_checks() {
        let inventory = ResourceInventory {
            applications: vec!["browser".to_string()],
            selectors: vec!["login".to_string()],
        };
        let report = validate_semantics(
            "open \"editor\"\nwait 1\nclick \"login\"\nwait 1\nclick \"logout\"\nwait 1\n",
            Some(&inventory),
        );
        assert_eq!(report.resource_issues.len(), 2);
        assert!(report.resource_issues[0].contains("'editor'"));
        assert!(report.resource_issues[1].contains("'logout'"));
    }

    #[test]
    fn test_substituted_selector_is_not_flagged() {
        let inventory = ResourceInventory {
            applications: vec![],
            selectors: vec!["login".to_string()],
        };
        let report = validate_semantics("click \"$target\"\nwait 1\n", Some(&inventory));
        assert!(report.resource_issues.is_empty());
    }

    #[test]
    fn test_conflicting_adjacent_pair() {
        let report = validate_semantics("navigate \"https://a.com\"\nclose_tab\n", None);
        assert_eq!(report.logic_issues.len(), 1);
        assert!(report.logic_issues[0].contains("close_tab"));
    }

    #[test]
    fn test_duplicate_consecutive_statement() {
        let report = validate_semantics("click \"a\"\nclick \"a\"\nwait 1\n", None);
        assert!(report
            .logic_issues
            .iter()
            .any(|i| i.contains("duplicate consecutive")));
    }
}
