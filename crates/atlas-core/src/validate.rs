//! Syntactic validation and line-local auto-fix.
//!
//! Token-level checks over raw script text, run before parsing: unknown
//! leading commands get nearest-match suggestions, a known-typo table can
//! rewrite misspelled command names in place when `auto_fix` is on, and
//! per-command argument formats are checked (`wait` durations, `navigate`
//! URLs). Auto-fix only ever rewrites line text; it never reorders or
//! deletes anything.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::DEFAULT_COMMANDS;
use crate::variables::RESERVED_KEYWORDS;

/// Minimum character-set overlap for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Report from one validation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    /// The rewritten script, present only when auto-fix changed something.
    pub fixed_text: Option<String>,
    pub fixes_applied: Vec<String>,
}

/// Validator instance owning its lookup tables (no process-wide state).
pub struct SyntaxValidator {
    known: HashSet<&'static str>,
    typo_table: HashMap<&'static str, &'static str>,
}

impl Default for SyntaxValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxValidator {
    pub fn new() -> Self {
        let mut known: HashSet<&'static str> = DEFAULT_COMMANDS.iter().copied().collect();
        known.extend(RESERVED_KEYWORDS.iter().copied());

        let typo_table: HashMap<&'static str, &'static str> = [
            ("clik", "click"),
            ("cick", "click"),
            ("clck", "click"),
            ("tpye", "type"),
            ("typr", "type"),
            ("wiat", "wait"),
            ("wati", "wait"),
            ("navigat", "navigate"),
            ("navgate", "navigate"),
            ("naviagte", "navigate"),
            ("opn", "open"),
            ("oepn", "open"),
            ("pres", "press"),
            ("prss", "press"),
            ("sytem_command", "system_command"),
            ("brek", "break"),
            ("contiune", "continue"),
            ("contine", "continue"),
            ("end_if", "endif"),
            ("endwhile", "end_while"),
            ("endrepeat", "end_repeat"),
            ("endfor", "end_for"),
        ]
        .into_iter()
        .collect();

        Self { known, typo_table }
    }

    /// Validate `script_text`, optionally rewriting known typos in place.
    pub fn validate(&self, script_text: &str, auto_fix: bool) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut lines: Vec<String> = script_text.lines().map(String::from).collect();

        for index in 0..lines.len() {
            let line_no = index + 1;
            let trimmed = lines[index].trim().to_string();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (first, rest) = match trimmed.split_once(char::is_whitespace) {
                Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
                None => (trimmed.clone(), String::new()),
            };

            let token = if self.known.contains(first.as_str()) {
                first
            } else if let Some(&fix) = self.typo_table.get(first.as_str()) {
                if auto_fix {
                    lines[index] = lines[index].replacen(&first, fix, 1);
                    report
                        .fixes_applied
                        .push(format!("line {}: '{}' -> '{}'", line_no, first, fix));
                    debug!(line = line_no, from = %first, to = fix, "typo fixed");
                    fix.to_string()
                } else {
                    report.errors.push(format!(
                        "line {}: unknown command '{}'",
                        line_no, first
                    ));
                    report
                        .suggestions
                        .push(format!("line {}: did you mean '{}'?", line_no, fix));
                    continue;
                }
            } else {
                report
                    .errors
                    .push(format!("line {}: unknown command '{}'", line_no, first));
                if let Some(best) = self.nearest_match(&first) {
                    report
                        .suggestions
                        .push(format!("line {}: did you mean '{}'?", line_no, best));
                }
                continue;
            };

            self.check_arguments(&token, &rest, line_no, &mut report);
        }

        report.is_valid = report.errors.is_empty();
        if !report.fixes_applied.is_empty() {
            report.fixed_text = Some(lines.join("\n"));
        }
        report
    }

    fn nearest_match(&self, token: &str) -> Option<&'static str> {
        self.known
            .iter()
            .map(|&candidate| (candidate, char_overlap_similarity(token, candidate)))
            .filter(|&(_, score)| score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(candidate, _)| candidate)
    }

    fn check_arguments(
        &self,
        token: &str,
        rest: &str,
        line_no: usize,
        report: &mut ValidationReport,
    ) {
        match token {
            "wait" => {
                if rest.is_empty() {
                    report
                        .errors
                        .push(format!("line {}: 'wait' requires a duration", line_no));
                    return;
                }
                let numeric = rest.strip_suffix('s').unwrap_or(rest);
                if numeric.parse::<f64>().is_err() {
                    report.errors.push(format!(
                        "line {}: 'wait' duration must be numeric (got '{}')",
                        line_no, rest
                    ));
                }
            }
            "navigate" => {
                let inner = rest
                    .strip_prefix('"')
                    .and_then(|r| r.strip_suffix('"'))
                    .unwrap_or("");
                if !(inner.starts_with("http://") || inner.starts_with("https://")) {
                    report.errors.push(format!(
                        "line {}: 'navigate' requires a quoted absolute URL",
                        line_no
                    ));
                }
            }
            "click" | "open" | "type" | "press" | "system_command" => {
                if rest.is_empty() {
                    report.errors.push(format!(
                        "line {}: '{}' requires an argument",
                        line_no, token
                    ));
                }
            }
            "if" | "while" => {
                if rest.is_empty() {
                    report.errors.push(format!(
                        "line {}: '{}' is missing its condition",
                        line_no, token
                    ));
                }
            }
            "repeat" => {
                let mut parts = rest.split_whitespace();
                let count_ok = parts
                    .next()
                    .map(|c| c.parse::<u32>().is_ok())
                    .unwrap_or(false);
                let times_ok = matches!(parts.next(), None | Some("times"));
                if !count_ok || !times_ok {
                    report.errors.push(format!(
                        "line {}: expected 'repeat <count> times'",
                        line_no
                    ));
                }
            }
            "for_each" => {
                if !rest.contains(" as ") {
                    report.errors.push(format!(
                        "line {}: expected 'for_each \"<selector>\" as <name>'",
                        line_no
                    ));
                }
            }
            "set" | "param" => {
                if !rest.contains('=') {
                    report.errors.push(format!(
                        "line {}: expected '{} <name> = <value>'",
                        line_no, token
                    ));
                }
            }
            "else" | "endif" | "end_repeat" | "end_while" | "end_for" | "break" | "continue" => {
                if !rest.is_empty() {
                    report.warnings.push(format!(
                        "line {}: trailing text after '{}' is ignored",
                        line_no, token
                    ));
                }
            }
            _ => {}
        }
    }
}

/// Character-set overlap (Jaccard index) between two tokens.
pub fn char_overlap_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_script_passes() {
        let validator = SyntaxValidator::new();
        let report = validator.validate(
            "open \"browser\"\nwait 2s\nnavigate \"https://example.com\"\nclick \"login\"\n",
            false,
        );
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.fixed_text.is_none());
    }

    #[test]
    fn test_typo_autofix() {
        let validator = SyntaxValidator::new();
        let report = validator.validate("clik button", true);
        assert!(report.is_valid);
        assert!(!report.fixes_applied.is_empty());
        assert!(report.fixed_text.unwrap().contains("click button"));
    }

    #[test]
    fn test_typo_without_autofix_is_error_with_suggestion() {
        let validator = SyntaxValidator::new();
        let report = validator.validate("clik button", false);
        assert!(!report.is_valid);
        assert!(report.errors[0].contains("unknown command 'clik'"));
        assert!(report.suggestions[0].contains("click"));
        assert!(report.fixed_text.is_none());
    }

    #[test]
    fn test_unknown_command_gets_nearest_match() {
        let validator = SyntaxValidator::new();
        let report = validator.validate("cliick \"x\"", false);
        assert!(!report.is_valid);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("click")));
    }

    #[test]
    fn test_wait_argument_checks() {
        let validator = SyntaxValidator::new();
        assert!(validator.validate("wait 2", false).is_valid);
        assert!(validator.validate("wait 0.5s", false).is_valid);
        assert!(!validator.validate("wait", false).is_valid);
        assert!(!validator.validate("wait forever", false).is_valid);
    }

    #[test]
    fn test_navigate_requires_quoted_absolute_url() {
        let validator = SyntaxValidator::new();
        assert!(validator
            .validate("navigate \"https://example.com\"", false)
            .is_valid);
        assert!(!validator.validate("navigate example.com", false).is_valid);
        assert!(!validator.validate("navigate \"/relative\"", false).is_valid);
    }

    #[test]
    fn test_keyword_format_checks() {
        let validator = SyntaxValidator::new();
        assert!(!validator.validate("repeat x times", false).is_valid);
        assert!(!validator.validate("if", false).is_valid);
        assert!(!validator.validate("set x", false).is_valid);
        assert!(validator.validate("repeat 3 times\nclick \"a\"\nend_repeat", false).is_valid);
    }

    #[test]
    fn test_autofix_preserves_other_lines() {
        let validator = SyntaxValidator::new();
        let text = "# intro\nclik \"a\"\nwait 1s";
        let report = validator.validate(text, true);
        let fixed = report.fixed_text.unwrap();
        assert_eq!(fixed, "# intro\nclick \"a\"\nwait 1s");
        assert_eq!(report.fixes_applied.len(), 1);
    }

    #[test]
    fn test_similarity() {
        assert!(char_overlap_similarity("clik", "click") > 0.6);
        assert!(char_overlap_similarity("zzz", "click") < 0.2);
        assert_eq!(char_overlap_similarity("abc", "abc"), 1.0);
    }
}
