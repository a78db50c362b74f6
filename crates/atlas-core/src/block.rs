//! Parsed block structure of an Atlas script.
//!
//! Blocks are produced once by the parser and never mutated afterwards; the
//! interpreter only reads them. Each block carries the 1-based source line it
//! started on, for diagnostics.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::variables::Variable;

/// One loop construct and its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopBlock {
    /// `repeat N times … end_repeat`
    Repeat { count: u32, body: Vec<Block> },
    /// `while <condition> … end_while`
    While {
        condition: Condition,
        body: Vec<Block>,
    },
    /// `for_each "<selector>" as <name> … end_for`
    ForEach {
        selector: String,
        binding: String,
        body: Vec<Block>,
    },
}

impl LoopBlock {
    pub fn body(&self) -> &[Block] {
        match self {
            LoopBlock::Repeat { body, .. }
            | LoopBlock::While { body, .. }
            | LoopBlock::ForEach { body, .. } => body,
        }
    }
}

/// One parsed statement, top-level or nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A leaf command, stored as raw text; `$name` substitution happens at
    /// execution time against the live store.
    Command { text: String, line: usize },
    Conditional {
        condition: Condition,
        if_body: Vec<Block>,
        else_body: Option<Vec<Block>>,
        line: usize,
    },
    Loop { loop_block: LoopBlock, line: usize },
    /// A `set`/`param` line. The right-hand side is kept raw so assignments
    /// can be re-evaluated against run-time values.
    VariableDeclaration {
        variable: Variable,
        raw_value: String,
        line: usize,
    },
    Comment { text: String, line: usize },
}

impl Block {
    pub fn line(&self) -> usize {
        match self {
            Block::Command { line, .. }
            | Block::Conditional { line, .. }
            | Block::Loop { line, .. }
            | Block::VariableDeclaration { line, .. }
            | Block::Comment { line, .. } => *line,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Block::Comment { .. })
    }

    /// True if this block or anything nested inside it is a conditional.
    pub fn contains_conditional(&self) -> bool {
        match self {
            Block::Conditional { .. } => true,
            Block::Loop { loop_block, .. } => {
                loop_block.body().iter().any(Block::contains_conditional)
            }
            _ => false,
        }
    }

    /// True if this block or anything nested inside it is a loop.
    pub fn contains_loop(&self) -> bool {
        match self {
            Block::Loop { .. } => true,
            Block::Conditional {
                if_body, else_body, ..
            } => {
                if_body.iter().any(Block::contains_loop)
                    || else_body
                        .as_ref()
                        .map(|body| body.iter().any(Block::contains_loop))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;

    fn command(text: &str, line: usize) -> Block {
        Block::Command {
            text: text.to_string(),
            line,
        }
    }

    #[test]
    fn test_nested_structure_queries() {
        let inner_if = Block::Conditional {
            condition: Condition::PageContains {
                text: "done".to_string(),
            },
            if_body: vec![command("click \"ok\"", 3)],
            else_body: None,
            line: 2,
        };
        let outer = Block::Loop {
            loop_block: LoopBlock::Repeat {
                count: 2,
                body: vec![inner_if],
            },
            line: 1,
        };

        assert!(outer.contains_loop());
        assert!(outer.contains_conditional());
        assert_eq!(outer.line(), 1);
        assert!(!command("click \"x\"", 5).contains_loop());
    }
}
