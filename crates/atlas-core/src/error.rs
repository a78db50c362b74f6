//! Error types for the Atlas DSL core.
//!
//! Parse problems are never raised: the parser records them as strings in
//! [`ParsedScript::errors`](crate::parser::ParsedScript) and keeps scanning.
//! [`AtlasError`] covers the paths that do abort — a failing command during
//! execution, and I/O around script files.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    /// A malformed construct found while parsing. Used to format entries in
    /// `ParsedScript.errors` so every parse diagnostic reads the same way.
    #[error("parse error at line {line}: {message}")]
    Parse { message: String, line: usize },

    /// A command handler reported failure, aborting the remaining walk.
    #[error("execution failed at line {line}: {message}")]
    Execution { message: String, line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtlasError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AtlasError::Parse { .. } => 2,
            AtlasError::Execution { .. } => 1,
            AtlasError::Io(_) => 4,
        }
    }
}
