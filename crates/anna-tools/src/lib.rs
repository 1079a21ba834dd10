//! Anna tools — trait, outcomes, discovery, manager, builtin tools
//!
//! Each tool is a self-contained file in src/tools/. To add a tool:
//! create the file, implement the Tool trait, add it to
//! `builtin_factories` below so descriptor discovery can find it.

pub mod descriptor;
pub mod manager;
pub mod outcome;
pub mod tool;
pub mod tools;

pub use descriptor::{ToolDescriptor, DESCRIPTOR_FILE};
pub use manager::{ToolManager, ToolState};
pub use outcome::ToolOutcome;
pub use tool::{CommandSpec, Tool};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Construction context handed to factories: where tool-owned files live.
pub struct ToolContext {
    pub data_dir: PathBuf,
}

impl ToolContext {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Default data root: `~/.anna/tools`.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".anna")
            .join("tools")
    }
}

pub type ToolFactory = fn(&ToolContext) -> Arc<dyn Tool>;

/// The builtin entry-point table discovery resolves descriptors against.
pub fn builtin_factories() -> HashMap<&'static str, ToolFactory> {
    let mut factories: HashMap<&'static str, ToolFactory> = HashMap::new();
    factories.insert("clock", |_ctx| Arc::new(tools::clock::ClockTool::new()));
    factories.insert("reminders", |ctx| {
        Arc::new(tools::reminders::RemindersTool::new(
            ctx.data_dir.join("reminders").join("reminders.json"),
        ))
    });
    factories
}

/// Register the whole builtin set directly (no install dir configured).
pub async fn register_builtins(manager: &ToolManager, ctx: &ToolContext) -> usize {
    let factories = builtin_factories();
    let mut registered = 0;
    // Deterministic order keeps startup logs stable.
    let mut names: Vec<&&str> = factories.keys().collect();
    names.sort();
    for name in names {
        let tool = factories[*name](ctx);
        if let Ok(true) = manager.register(tool).await {
            registered += 1;
        }
    }
    registered
}
