//! # atlas-core
//!
//! Parser, validators, and control-flow interpreter for the Atlas automation
//! DSL — a line-oriented scripting language for UI-automation sequences
//! (clicks, typed text, waits, navigation).
//!
//! The crate owns the language semantics only. The actions themselves are
//! pluggable: leaf commands dispatch through a [`registry::HandlerRegistry`]
//! supplied by the host, and environment-dependent conditions read through an
//! [`probe::EnvironmentProbe`]. Nothing here touches a real mouse, keyboard,
//! or browser.
//!
//! ## Modules
//!
//! - [`value`] - Typed variable values with explicit display and equality rules
//! - [`variables`] - Variable/parameter store and `$name` substitution
//! - [`condition`] - Condition parsing and evaluation for `if` and `while`
//! - [`block`] - The parsed block structure of a script
//! - [`parser`] - Block parser producing a [`parser::ParsedScript`]
//! - [`interpreter`] - Execution engine with loop and break/continue semantics
//! - [`registry`] - Pluggable command handlers
//! - [`probe`] - Read-only environment interface and test probes
//! - [`validate`] - Syntactic validation and typo auto-fix
//! - [`semantics`] - Advisory semantic lint pass
//! - [`error`] - Error types and exit-code mapping
//!
//! ## Example
//!
//! ```
//! use atlas_core::parser;
//!
//! let script = parser::parse("set n = 2\nrepeat 2 times\nclick \"next\"\nend_repeat\n");
//! assert!(script.is_executable());
//! assert!(script.metadata.has_loops);
//! assert_eq!(script.metadata.variable_count, 1);
//! ```

pub mod block;
pub mod condition;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod probe;
pub mod registry;
pub mod semantics;
pub mod validate;
pub mod value;
pub mod variables;

pub use block::{Block, LoopBlock};
pub use condition::{parse_condition, Condition};
pub use error::AtlasError;
pub use interpreter::{ExecStatus, ExecutionData, ExecutionResult, Interpreter, MAX_ITERATIONS};
pub use parser::{parse, ParsedScript, ScriptMetadata};
pub use probe::{ElementHandle, EnvironmentProbe, NullProbe, StaticProbe};
pub use registry::{
    CommandHandler, HandlerContext, HandlerRegistry, HandlerResult, Outcome, DEFAULT_COMMANDS,
};
pub use semantics::{validate_semantics, ResourceInventory, SemanticReport};
pub use validate::{SyntaxValidator, ValidationReport};
pub use value::Value;
pub use variables::{Variable, VariableStore};
