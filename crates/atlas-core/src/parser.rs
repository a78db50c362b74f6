//! Line-oriented block parser for Atlas scripts.
//!
//! Parsing never fails: malformed constructs are recorded in
//! [`ParsedScript::errors`] and scanning continues, so one typo does not hide
//! every other diagnostic. Any non-empty error list still blocks execution.
//!
//! Nesting is handled with an explicit frame stack: an opening keyword pushes
//! a frame that accumulates body blocks, and the matching end keyword pops it
//! and finalizes the [`Block`]. An end keyword of the wrong kind is an error
//! and leaves the frame open.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::block::{Block, LoopBlock};
use crate::condition::{parse_condition, Condition};
use crate::error::AtlasError;
use crate::value::Value;
use crate::variables::{
    is_valid_name, variable_references, Variable, VariableStore, LOOP_COUNTER, LOOP_INDEX,
    LOOP_ITERATION,
};

/// Summary counters for a parsed script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    pub total_blocks: usize,
    pub has_conditionals: bool,
    pub has_loops: bool,
    pub variable_count: usize,
}

/// The result of one parse call: blocks, the variables declared along the
/// way, and every diagnostic collected. Read-only input to the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedScript {
    pub blocks: Vec<Block>,
    pub variables: VariableStore,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: ScriptMetadata,
}

impl ParsedScript {
    /// Parse errors are fatal to execution; warnings are not.
    pub fn is_executable(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse script text into an ordered block sequence.
pub fn parse(source: &str) -> ParsedScript {
    let mut parser = Parser::default();
    for (index, raw_line) in source.lines().enumerate() {
        parser.parse_line(index + 1, raw_line);
    }
    parser.finish()
}

/// An open `if` or loop construct awaiting its end keyword.
enum Frame {
    If {
        condition: Condition,
        line: usize,
        if_body: Vec<Block>,
        else_body: Option<Vec<Block>>,
    },
    Repeat {
        count: u32,
        line: usize,
        body: Vec<Block>,
    },
    While {
        condition: Condition,
        line: usize,
        body: Vec<Block>,
    },
    ForEach {
        selector: String,
        binding: String,
        line: usize,
        body: Vec<Block>,
    },
}

impl Frame {
    fn keyword(&self) -> &'static str {
        match self {
            Frame::If { .. } => "if",
            Frame::Repeat { .. } => "repeat",
            Frame::While { .. } => "while",
            Frame::ForEach { .. } => "for_each",
        }
    }

    fn start_line(&self) -> usize {
        match self {
            Frame::If { line, .. }
            | Frame::Repeat { line, .. }
            | Frame::While { line, .. }
            | Frame::ForEach { line, .. } => *line,
        }
    }

    fn push(&mut self, block: Block) {
        match self {
            Frame::If {
                if_body, else_body, ..
            } => match else_body {
                Some(body) => body.push(block),
                None => if_body.push(block),
            },
            Frame::Repeat { body, .. }
            | Frame::While { body, .. }
            | Frame::ForEach { body, .. } => body.push(block),
        }
    }

    fn finalize(self) -> Block {
        match self {
            Frame::If {
                condition,
                line,
                if_body,
                else_body,
            } => Block::Conditional {
                condition,
                if_body,
                else_body,
                line,
            },
            Frame::Repeat { count, line, body } => Block::Loop {
                loop_block: LoopBlock::Repeat { count, body },
                line,
            },
            Frame::While {
                condition,
                line,
                body,
            } => Block::Loop {
                loop_block: LoopBlock::While { condition, body },
                line,
            },
            Frame::ForEach {
                selector,
                binding,
                line,
                body,
            } => Block::Loop {
                loop_block: LoopBlock::ForEach {
                    selector,
                    binding,
                    body,
                },
                line,
            },
        }
    }
}

#[derive(Default)]
struct Parser {
    blocks: Vec<Block>,
    stack: Vec<Frame>,
    variables: VariableStore,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Parser {
    fn emit(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(frame) => frame.push(block),
            None => self.blocks.push(block),
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(
            AtlasError::Parse {
                message: message.into(),
                line,
            }
            .to_string(),
        );
    }

    fn parse_line(&mut self, line: usize, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        if let Some(text) = trimmed.strip_prefix('#') {
            self.emit(Block::Comment {
                text: text.trim().to_string(),
                line,
            });
            return;
        }

        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((kw, rest)) => (kw, rest.trim()),
            None => (trimmed, ""),
        };

        match keyword {
            "if" => self.open_if(line, rest),
            "else" => self.handle_else(line),
            "endif" => self.close_frame(line, "endif", "if"),
            "repeat" => self.open_repeat(line, rest),
            "end_repeat" => self.close_frame(line, "end_repeat", "repeat"),
            "while" => self.open_while(line, rest),
            "end_while" => self.close_frame(line, "end_while", "while"),
            "for_each" => self.open_for_each(line, rest),
            "end_for" => self.close_frame(line, "end_for", "for_each"),
            "set" | "param" => self.parse_declaration(line, keyword, rest),
            _ => self.emit(Block::Command {
                text: trimmed.to_string(),
                line,
            }),
        }
    }

    fn open_if(&mut self, line: usize, rest: &str) {
        if rest.is_empty() {
            self.error(line, "'if' without a condition");
            return;
        }
        self.stack.push(Frame::If {
            condition: parse_condition(rest),
            line,
            if_body: Vec::new(),
            else_body: None,
        });
    }

    fn handle_else(&mut self, line: usize) {
        let problem = match self.stack.last_mut() {
            Some(Frame::If { else_body, .. }) => {
                if else_body.is_some() {
                    Some("duplicate 'else' in the same 'if' block")
                } else {
                    *else_body = Some(Vec::new());
                    None
                }
            }
            _ => Some("'else' without a matching 'if'"),
        };
        if let Some(message) = problem {
            self.error(line, message);
        }
    }

    /// `repeat <count> times`. The `times` keyword is deliberately optional
    /// on input — `repeat 3` opens the same loop — but any other trailing
    /// token after the count is an error.
    fn open_repeat(&mut self, line: usize, rest: &str) {
        let mut tokens = rest.split_whitespace();
        let count = tokens.next().and_then(|t| t.parse::<u32>().ok());
        match count {
            Some(count) => {
                if let Some(trailing) = tokens.next() {
                    if trailing != "times" {
                        self.error(
                            line,
                            format!(
                                "malformed repeat: expected 'repeat {} times', found '{}'",
                                count, trailing
                            ),
                        );
                        return;
                    }
                }
                self.stack.push(Frame::Repeat {
                    count,
                    line,
                    body: Vec::new(),
                });
            }
            None => self.error(line, "malformed repeat: expected 'repeat <count> times'"),
        }
    }

    fn open_while(&mut self, line: usize, rest: &str) {
        if rest.is_empty() {
            self.error(line, "'while' without a condition");
            return;
        }
        self.stack.push(Frame::While {
            condition: parse_condition(rest),
            line,
            body: Vec::new(),
        });
    }

    fn open_for_each(&mut self, line: usize, rest: &str) {
        // for_each "<selector>" as <name>
        let (selector, tail) = match rest.strip_prefix('"').and_then(|r| r.split_once('"')) {
            Some((selector, tail)) => (selector.to_string(), tail.trim()),
            None => match rest.split_once(char::is_whitespace) {
                Some((selector, tail)) => (selector.to_string(), tail.trim()),
                None => {
                    self.error(
                        line,
                        "malformed for_each: expected 'for_each \"<selector>\" as <name>'",
                    );
                    return;
                }
            },
        };

        let binding = match tail.strip_prefix("as ") {
            Some(name) => name.trim(),
            None => {
                self.error(
                    line,
                    "malformed for_each: expected 'as <name>' after the selector",
                );
                return;
            }
        };
        if !is_valid_name(binding) {
            self.error(
                line,
                format!("invalid loop variable name '{}'", binding),
            );
            return;
        }

        self.stack.push(Frame::ForEach {
            selector,
            binding: binding.to_string(),
            line,
            body: Vec::new(),
        });
    }

    fn close_frame(&mut self, line: usize, end_keyword: &str, expected: &'static str) {
        let top = self
            .stack
            .last()
            .map(|frame| (frame.keyword(), frame.start_line()));
        match top {
            Some((keyword, _)) if keyword == expected => {
                if let Some(frame) = self.stack.pop() {
                    let block = frame.finalize();
                    self.emit(block);
                }
            }
            Some((keyword, start_line)) => {
                let message = format!(
                    "'{}' does not close the '{}' opened at line {}",
                    end_keyword, keyword, start_line
                );
                self.error(line, message);
            }
            None => self.error(
                line,
                format!("'{}' without a matching '{}'", end_keyword, expected),
            ),
        }
    }

    fn parse_declaration(&mut self, line: usize, keyword: &str, rest: &str) {
        let (name, raw_value) = match rest.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => {
                self.error(line, format!("malformed {}: expected '{} <name> = <value>'", keyword, keyword));
                return;
            }
        };
        if !is_valid_name(name) {
            self.error(line, format!("invalid variable name '{}'", name));
            return;
        }
        if raw_value.is_empty() {
            self.error(line, format!("'{}' declaration for '{}' has no value", keyword, name));
            return;
        }

        let value = Value::parse_literal(raw_value);
        let variable = if keyword == "param" {
            Variable::parameter(name, value)
        } else {
            Variable::new(name, value)
        };
        // Declared immediately so later lines can already resolve $name.
        self.variables.declare(variable.clone());
        self.emit(Block::VariableDeclaration {
            variable,
            raw_value: raw_value.to_string(),
            line,
        });
    }

    fn finish(mut self) -> ParsedScript {
        while let Some(frame) = self.stack.pop() {
            self.errors.push(
                AtlasError::Parse {
                    message: format!("unterminated '{}' block", frame.keyword()),
                    line: frame.start_line(),
                }
                .to_string(),
            );
        }

        self.check_unresolved_references();

        let metadata = ScriptMetadata {
            total_blocks: self.blocks.iter().filter(|b| !b.is_comment()).count(),
            has_conditionals: self.blocks.iter().any(Block::contains_conditional),
            has_loops: self.blocks.iter().any(Block::contains_loop),
            variable_count: self.variables.len(),
        };

        ParsedScript {
            blocks: self.blocks,
            variables: self.variables,
            errors: self.errors,
            warnings: self.warnings,
            metadata,
        }
    }

    /// Post-pass: warn about `$name` references that no declaration, loop
    /// binding, or interpreter-owned counter will ever satisfy.
    fn check_unresolved_references(&mut self) {
        let mut known: HashSet<String> = self
            .variables
            .iter()
            .map(|v| v.name.clone())
            .collect();
        known.insert(LOOP_COUNTER.to_string());
        known.insert(LOOP_INDEX.to_string());
        known.insert(LOOP_ITERATION.to_string());
        collect_loop_bindings(&self.blocks, &mut known);

        let mut reported = HashSet::new();
        let mut warnings = Vec::new();
        scan_blocks(&self.blocks, &known, &mut reported, &mut warnings);
        self.warnings.extend(warnings);
    }
}

fn collect_loop_bindings(blocks: &[Block], known: &mut HashSet<String>) {
    for block in blocks {
        match block {
            Block::Loop { loop_block, .. } => {
                if let LoopBlock::ForEach { binding, .. } = loop_block {
                    known.insert(binding.clone());
                }
                collect_loop_bindings(loop_block.body(), known);
            }
            Block::Conditional {
                if_body, else_body, ..
            } => {
                collect_loop_bindings(if_body, known);
                if let Some(body) = else_body {
                    collect_loop_bindings(body, known);
                }
            }
            _ => {}
        }
    }
}

fn scan_blocks(
    blocks: &[Block],
    known: &HashSet<String>,
    reported: &mut HashSet<String>,
    warnings: &mut Vec<String>,
) {
    for block in blocks {
        match block {
            Block::Command { text, line } => {
                scan_text(text, *line, known, reported, warnings);
            }
            Block::VariableDeclaration {
                raw_value, line, ..
            } => {
                scan_text(raw_value, *line, known, reported, warnings);
            }
            Block::Conditional {
                condition,
                if_body,
                else_body,
                line,
            } => {
                scan_condition(condition, *line, known, reported, warnings);
                scan_blocks(if_body, known, reported, warnings);
                if let Some(body) = else_body {
                    scan_blocks(body, known, reported, warnings);
                }
            }
            Block::Loop { loop_block, line } => {
                if let LoopBlock::While { condition, .. } = loop_block {
                    scan_condition(condition, *line, known, reported, warnings);
                }
                scan_blocks(loop_block.body(), known, reported, warnings);
            }
            Block::Comment { .. } => {}
        }
    }
}

fn scan_condition(
    condition: &Condition,
    line: usize,
    known: &HashSet<String>,
    reported: &mut HashSet<String>,
    warnings: &mut Vec<String>,
) {
    if let Some(name) = condition.referenced_variable() {
        if !known.contains(name) && reported.insert(name.to_string()) {
            warnings.push(format!(
                "unresolved variable reference '${}' (line {})",
                name, line
            ));
        }
    }
}

fn scan_text(
    text: &str,
    line: usize,
    known: &HashSet<String>,
    reported: &mut HashSet<String>,
    warnings: &mut Vec<String>,
) {
    for name in variable_references(text) {
        if !known.contains(&name) && reported.insert(name.clone()) {
            warnings.push(format!(
                "unresolved variable reference '${}' (line {})",
                name, line
            ));
        }
    }
}
