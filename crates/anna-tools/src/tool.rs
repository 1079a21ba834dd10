//! The Tool trait — implement this to add a new capability
//!
//! Each tool is a self-contained module in src/tools/. To add a tool:
//! create the file, implement the trait, register it in the builtin
//! factory table in lib.rs.

use crate::outcome::ToolOutcome;
use anna_buffer::ThoughtSink;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One invokable command of a tool. The first spec in a tool's command
/// list is the default, used for bare `<tool>` actions.
#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Free-text signature: argument order and meaning.
    pub summary: &'static str,
    /// Minimum interval between invocations of this command.
    pub cooldown: Option<Duration>,
}

impl CommandSpec {
    pub fn new(name: &'static str, summary: &'static str) -> Self {
        Self {
            name,
            summary,
            cooldown: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique stable identifier, lowercase snake_case.
    fn name(&self) -> &str;

    /// Command surface. Must be non-empty; the first entry is the default.
    fn commands(&self) -> Vec<CommandSpec>;

    /// Full usage guidance shown to the LM while the tool's instruction
    /// record is live.
    fn instructions(&self) -> String;

    /// Called once at registration. Return `true` even when the tool is
    /// functionally unavailable so the LM sees it with a degradation
    /// message; return an error only on catastrophic setup failure.
    async fn initialize(&self) -> anna_core::Result<bool> {
        Ok(true)
    }

    /// Idempotent teardown. The manager cancels the context loop before
    /// calling this.
    async fn cleanup(&self) {}

    fn is_available(&self) -> bool {
        true
    }

    /// Hint surfaced when dispatch finds the tool unavailable.
    fn unavailable_guidance(&self) -> Option<String> {
        None
    }

    fn has_context_loop(&self) -> bool {
        false
    }

    /// Long-lived cooperative task; runs until `cancel` fires. Its only
    /// side effect on the core is enqueuing thoughts through `sink`.
    async fn context_loop(&self, sink: ThoughtSink, cancel: CancellationToken) {
        let _ = (sink, cancel);
    }

    /// Uniform invocation entry point. `command` is always one of the
    /// names from [`Tool::commands`] by the time it reaches here.
    async fn execute(&self, command: &str, args: &[Value]) -> ToolOutcome;

    /// Execute with cancellation support. Default: race `execute` against
    /// the token. Tools that manage child processes should override this
    /// to kill the process on cancellation.
    async fn execute_cancellable(
        &self,
        command: &str,
        args: &[Value],
        cancel: CancellationToken,
    ) -> ToolOutcome {
        tokio::select! {
            outcome = self.execute(command, args) => outcome,
            _ = cancel.cancelled() => ToolOutcome::failure(
                anna_core::ErrorKind::Timeout,
                "cancelled",
            ),
        }
    }
}
