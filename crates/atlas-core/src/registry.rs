//! Pluggable command handlers.
//!
//! The interpreter knows nothing about mice, keyboards, or browsers: every
//! leaf command is dispatched by name through a [`HandlerRegistry`] owned by
//! the host application. The default handlers registered by
//! [`HandlerRegistry::with_defaults`] are illustrative no-ops so a registry
//! is always usable for tracing and dry runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::variables::VariableStore;

/// What a handler call amounted to.
///
/// `UnhandledCommand` is a deliberate soft failure: it keeps partially
/// implemented registries useful, while still being distinguishable from a
/// real success by callers that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    UnhandledCommand,
}

/// The structured result a handler returns to the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub outcome: Outcome,
    pub message: String,
}

impl HandlerResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            message: message.into(),
        }
    }

    pub fn unhandled(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::UnhandledCommand,
            message: message.into(),
        }
    }
}

/// Read-only view of the execution state passed to each handler call.
pub struct HandlerContext<'a> {
    /// The live variable store at dispatch time.
    pub variables: &'a VariableStore,
    /// Source line of the command being executed.
    pub line: usize,
    /// True when the run is a dry run. Handlers are not invoked in dry-run
    /// mode, but hosts reuse this context type for their own previews.
    pub dry_run: bool,
}

/// A side-effecting implementation for one command name.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, args: &[String], ctx: &HandlerContext<'_>) -> HandlerResult;
}

/// No-op handler used for the default command set.
struct NoopHandler {
    name: &'static str,
}

#[async_trait]
impl CommandHandler for NoopHandler {
    async fn handle(&self, args: &[String], ctx: &HandlerContext<'_>) -> HandlerResult {
        debug!(line = ctx.line, command = self.name, ?args, "no-op handler");
        HandlerResult::success(format!("{} (no-op)", self.name))
    }
}

/// Default command names registered by [`HandlerRegistry::with_defaults`].
pub const DEFAULT_COMMANDS: &[&str] = &[
    "open",
    "click",
    "type",
    "wait",
    "navigate",
    "press",
    "system_command",
];

/// Mapping from command name to handler, owned by the host.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with no-op handlers for the standard command set. Real
    /// UI or browser effects come from the host replacing these.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for &name in DEFAULT_COMMANDS {
            registry.register(name, Arc::new(NoopHandler { name }));
        }
        registry
    }

    /// Register `handler` for `name`, replacing any previous handler.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_registered_and_succeed() {
        let registry = HandlerRegistry::with_defaults();
        for &name in DEFAULT_COMMANDS {
            assert!(registry.contains(name), "missing default '{}'", name);
        }

        let vars = VariableStore::new();
        let ctx = HandlerContext {
            variables: &vars,
            line: 1,
            dry_run: false,
        };
        let handler = registry.get("click").unwrap();
        let result = handler.handle(&["\"button\"".to_string()], &ctx).await;
        assert_eq!(result.outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_register_replaces_handler() {
        struct Failing;
        #[async_trait]
        impl CommandHandler for Failing {
            async fn handle(&self, _args: &[String], _ctx: &HandlerContext<'_>) -> HandlerResult {
                HandlerResult::failure("boom")
            }
        }

        let mut registry = HandlerRegistry::with_defaults();
        registry.register("click", Arc::new(Failing));

        let vars = VariableStore::new();
        let ctx = HandlerContext {
            variables: &vars,
            line: 1,
            dry_run: false,
        };
        let result = registry.get("click").unwrap().handle(&[], &ctx).await;
        assert_eq!(result.outcome, Outcome::Failed);
    }

    #[test]
    fn test_unknown_name_is_absent() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.get("teleport").is_none());
    }
}
