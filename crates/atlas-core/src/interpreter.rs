//! Execution engine for parsed Atlas scripts.
//!
//! The interpreter walks the block sequence of a [`ParsedScript`] in strict
//! program order, re-substituting `$name` references at execution time,
//! evaluating conditions against the live [`EnvironmentProbe`], and
//! dispatching leaf commands through the [`HandlerRegistry`]. `break` and
//! `continue` travel as flags on the execution context; the nearest enclosing
//! loop consumes and clears them, and at top level they stop the remaining
//! block walk.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::block::{Block, LoopBlock};
use crate::error::AtlasError;
use crate::parser::ParsedScript;
use crate::probe::{EnvironmentProbe, NullProbe};
use crate::registry::{HandlerContext, HandlerRegistry, Outcome};
use crate::value::Value;
use crate::variables::{VariableStore, LOOP_COUNTER, LOOP_INDEX, LOOP_ITERATION};

/// Hard cap on `while` loop passes. Hitting it is logged, not an error.
pub const MAX_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Success,
    Failed,
}

/// Payload attached to a successful execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionData {
    pub execution_log: Vec<String>,
    pub variables: BTreeMap<String, Value>,
    pub blocks_executed: usize,
}

/// Structured result of one `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecStatus,
    pub message: String,
    pub data: Option<ExecutionData>,
    pub execution_time: Duration,
}

/// Per-run mutable state. Created at the start of an `execute` call and
/// discarded at the end; its final variable snapshot and log are copied into
/// the result.
pub struct ExecutionContext {
    pub variables: VariableStore,
    pub break_requested: bool,
    pub continue_requested: bool,
    pub dry_run: bool,
    pub execution_log: Vec<String>,
    blocks_executed: usize,
}

impl ExecutionContext {
    fn new(variables: VariableStore, dry_run: bool) -> Self {
        Self {
            variables,
            break_requested: false,
            continue_requested: false,
            dry_run,
            execution_log: Vec::new(),
            blocks_executed: 0,
        }
    }

    pub fn log(&mut self, entry: impl Into<String>) {
        self.execution_log.push(entry.into());
    }

    fn flow_signal(&self) -> bool {
        self.break_requested || self.continue_requested
    }
}

/// Walks parsed blocks and produces an [`ExecutionResult`].
pub struct Interpreter {
    registry: HandlerRegistry,
    probe: Arc<dyn EnvironmentProbe>,
}

impl Interpreter {
    pub fn new(registry: HandlerRegistry, probe: Arc<dyn EnvironmentProbe>) -> Self {
        Self { registry, probe }
    }

    /// Default no-op handlers and a detached environment.
    pub fn with_defaults() -> Self {
        Self::new(HandlerRegistry::with_defaults(), Arc::new(NullProbe))
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Execute a parsed script.
    ///
    /// Refused immediately if the script has parse errors. `overrides` are
    /// applied by name to declared parameters only; overriding anything else
    /// is a no-op. With `dry_run` set, handlers are never invoked — each
    /// dispatch becomes a log entry with a synthetic success.
    pub async fn execute(
        &self,
        script: &ParsedScript,
        overrides: &HashMap<String, Value>,
        dry_run: bool,
    ) -> ExecutionResult {
        let started = Instant::now();

        if !script.errors.is_empty() {
            warn!(errors = script.errors.len(), "execution refused");
            return ExecutionResult {
                status: ExecStatus::Failed,
                message: format!(
                    "script has {} parse error(s); fix them before executing",
                    script.errors.len()
                ),
                data: None,
                execution_time: started.elapsed(),
            };
        }

        let mut variables = script.variables.clone();
        let applied = variables.apply_overrides(overrides);
        if applied > 0 {
            debug!(applied, "parameter overrides applied");
        }

        let mut ctx = ExecutionContext::new(variables, dry_run);
        let walk = self.run_blocks(&script.blocks, &mut ctx).await;

        if ctx.flow_signal() {
            // Bare break/continue outside any loop: stop the remaining
            // top-level walk, by policy.
            ctx.log("control-flow signal outside a loop; remaining blocks skipped");
            ctx.break_requested = false;
            ctx.continue_requested = false;
        }

        match walk {
            Ok(()) => {
                let blocks_executed = ctx.blocks_executed;
                info!(blocks_executed, dry_run, "script executed");
                ExecutionResult {
                    status: ExecStatus::Success,
                    message: format!("executed {} block(s)", blocks_executed),
                    data: Some(ExecutionData {
                        execution_log: ctx.execution_log,
                        variables: ctx.variables.snapshot(),
                        blocks_executed,
                    }),
                    execution_time: started.elapsed(),
                }
            }
            Err(e) => {
                warn!(error = %e, "script failed");
                ExecutionResult {
                    status: ExecStatus::Failed,
                    message: e.to_string(),
                    data: None,
                    execution_time: started.elapsed(),
                }
            }
        }
    }

    fn run_blocks<'a>(
        &'a self,
        blocks: &'a [Block],
        ctx: &'a mut ExecutionContext,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), AtlasError>> + Send + 'a>>
    {
        Box::pin(async move {
            for block in blocks {
                if ctx.flow_signal() {
                    break;
                }
                self.run_block(block, ctx).await?;
            }
            Ok(())
        })
    }

    async fn run_block(&self, block: &Block, ctx: &mut ExecutionContext) -> Result<(), AtlasError> {
        match block {
            Block::Comment { .. } => Ok(()),
            Block::VariableDeclaration {
                variable,
                raw_value,
                line,
            } => {
                // Re-evaluated against run-time values so assignments like
                // `set c = $c + 1` progress inside loops. A static literal
                // folds to the same value the parser already declared.
                let value = eval_assignment(raw_value, &ctx.variables);
                ctx.variables.bind(&variable.name, value.clone());
                ctx.blocks_executed += 1;
                ctx.log(format!(
                    "line {}: {} {} = {}",
                    line,
                    if variable.is_parameter { "param" } else { "set" },
                    variable.name,
                    value
                ));
                Ok(())
            }
            Block::Command { text, line } => self.run_command(text, *line, ctx).await,
            Block::Conditional {
                condition,
                if_body,
                else_body,
                line,
            } => {
                ctx.blocks_executed += 1;
                let taken = condition
                    .evaluate(self.probe.as_ref(), &ctx.variables)
                    .await;
                ctx.log(format!("line {}: if {} -> {}", line, condition, taken));
                if taken {
                    self.run_blocks(if_body, ctx).await
                } else if let Some(body) = else_body {
                    self.run_blocks(body, ctx).await
                } else {
                    Ok(())
                }
            }
            Block::Loop { loop_block, line } => self.run_loop(loop_block, *line, ctx).await,
        }
    }

    async fn run_command(
        &self,
        text: &str,
        line: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<(), AtlasError> {
        // Substitution is late-bound: values may have changed since parsing.
        let substituted = ctx.variables.substitute(text);
        let tokens = split_command(&substituted);
        let Some(name) = tokens.first().cloned() else {
            return Ok(());
        };

        match name.as_str() {
            "break" => {
                ctx.break_requested = true;
                ctx.blocks_executed += 1;
                ctx.log(format!("line {}: break", line));
                return Ok(());
            }
            "continue" => {
                ctx.continue_requested = true;
                ctx.blocks_executed += 1;
                ctx.log(format!("line {}: continue", line));
                return Ok(());
            }
            _ => {}
        }

        ctx.blocks_executed += 1;

        if ctx.dry_run {
            ctx.log(format!("line {}: [dry-run] {}", line, substituted));
            return Ok(());
        }

        let args: Vec<String> = tokens[1..].to_vec();
        match self.registry.get(&name) {
            Some(handler) => {
                let handler_ctx = HandlerContext {
                    variables: &ctx.variables,
                    line,
                    dry_run: false,
                };
                let result = handler.handle(&args, &handler_ctx).await;
                match result.outcome {
                    Outcome::Success => {
                        debug!(line, command = %name, msg = %result.message, "command executed");
                        ctx.log(format!("line {}: {} -> {}", line, substituted, result.message));
                        Ok(())
                    }
                    Outcome::UnhandledCommand => {
                        warn!(line, command = %name, "command unhandled");
                        ctx.log(format!(
                            "line {}: {} -> unhandled: {}",
                            line, substituted, result.message
                        ));
                        Ok(())
                    }
                    Outcome::Failed => Err(AtlasError::Execution {
                        message: format!("command '{}' failed: {}", name, result.message),
                        line,
                    }),
                }
            }
            None => {
                // Soft failure: partially implemented registries still
                // produce a best-effort trace.
                warn!(line, command = %name, "no handler registered");
                ctx.log(format!(
                    "line {}: {} -> no handler registered (skipped)",
                    line, substituted
                ));
                Ok(())
            }
        }
    }

    async fn run_loop(
        &self,
        loop_block: &LoopBlock,
        line: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<(), AtlasError> {
        ctx.blocks_executed += 1;
        match loop_block {
            LoopBlock::Repeat { count, body } => {
                for i in 1..=*count {
                    ctx.variables.bind(LOOP_COUNTER, Value::Int(i64::from(i)));
                    self.run_blocks(body, ctx).await?;
                    if self.consume_flags(ctx) {
                        break;
                    }
                }
                Ok(())
            }
            LoopBlock::While { condition, body } => {
                let mut iterations = 0usize;
                loop {
                    if iterations >= MAX_ITERATIONS {
                        ctx.log(format!(
                            "line {}: while loop truncated after {} iterations",
                            line, MAX_ITERATIONS
                        ));
                        warn!(line, limit = MAX_ITERATIONS, "while loop truncated");
                        break;
                    }
                    if !condition
                        .evaluate(self.probe.as_ref(), &ctx.variables)
                        .await
                    {
                        break;
                    }
                    iterations += 1;
                    ctx.variables
                        .bind(LOOP_ITERATION, Value::Int(iterations as i64));
                    self.run_blocks(body, ctx).await?;
                    if self.consume_flags(ctx) {
                        break;
                    }
                }
                Ok(())
            }
            LoopBlock::ForEach {
                selector,
                binding,
                body,
            } => {
                let elements = self.probe.find_elements(selector).await;
                debug!(line, selector = %selector, count = elements.len(), "for_each elements");
                for (index, element) in elements.iter().enumerate() {
                    ctx.variables.bind(LOOP_INDEX, Value::Int(index as i64));
                    ctx.variables
                        .bind(binding, Value::Str(element.binding_value()));
                    self.run_blocks(body, ctx).await?;
                    if self.consume_flags(ctx) {
                        break;
                    }
                }
                Ok(())
            }
        }
    }

    /// Consume loop control flags after one body pass. Returns true if the
    /// loop should stop.
    fn consume_flags(&self, ctx: &mut ExecutionContext) -> bool {
        if ctx.continue_requested {
            ctx.continue_requested = false;
            return false;
        }
        if ctx.break_requested {
            ctx.break_requested = false;
            return true;
        }
        false
    }
}

/// Evaluate the right-hand side of an assignment against the live store.
fn eval_assignment(raw_value: &str, variables: &VariableStore) -> Value {
    let substituted = variables.substitute(raw_value);
    fold_addition(&substituted).unwrap_or_else(|| Value::parse_literal(&substituted))
}

/// Fold `a + b + …` when every operand is numeric. Integers stay integers;
/// any float operand promotes the whole chain. An integer chain that
/// overflows is not folded at all, so the assignment keeps the raw text as a
/// string instead of wrapping or panicking.
fn fold_addition(text: &str) -> Option<Value> {
    if !text.contains('+') {
        return None;
    }
    let parts: Vec<&str> = text.split('+').map(str::trim).collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    if let Ok(ints) = parts
        .iter()
        .map(|p| p.parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
    {
        return ints
            .iter()
            .try_fold(0i64, |acc, &n| acc.checked_add(n))
            .map(Value::Int);
    }
    if let Ok(floats) = parts
        .iter()
        .map(|p| p.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
    {
        return Some(Value::Float(floats.iter().sum()));
    }
    None
}

/// Split substituted command text into name and arguments, honoring quotes.
fn split_command(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("click \"login button\" now"),
            vec!["click", "login button", "now"]
        );
        assert_eq!(split_command("wait 2s"), vec!["wait", "2s"]);
        assert_eq!(split_command("type \"\" x"), vec!["type", "", "x"]);
        assert!(split_command("   ").is_empty());
    }

    #[test]
    fn test_fold_addition() {
        assert_eq!(fold_addition("1 + 2 + 3"), Some(Value::Int(6)));
        assert_eq!(fold_addition("1.5 + 2"), Some(Value::Float(3.5)));
        assert_eq!(fold_addition("a + b"), None);
        assert_eq!(fold_addition("42"), None);
        assert_eq!(fold_addition("1 +"), None);
    }

    #[test]
    fn test_fold_addition_overflow_is_not_folded() {
        assert_eq!(fold_addition("9223372036854775807 + 1"), None);
        assert_eq!(
            fold_addition("-9223372036854775808 + -1"),
            None
        );
        assert_eq!(
            fold_addition("9223372036854775806 + 1"),
            Some(Value::Int(i64::MAX))
        );
    }

    #[test]
    fn test_eval_assignment() {
        let mut vars = VariableStore::new();
        vars.bind("c", Value::Int(0));
        assert_eq!(eval_assignment("$c + 1", &vars), Value::Int(1));
        assert_eq!(eval_assignment("3", &vars), Value::Int(3));
        assert_eq!(
            eval_assignment("\"hello\"", &vars),
            Value::Str("hello".to_string())
        );
    }
}
