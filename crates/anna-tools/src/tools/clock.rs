//! Clock tool — tells the current date and time

use crate::outcome::ToolOutcome;
use crate::tool::{CommandSpec, Tool};
use anna_core::Metadata;
use serde_json::Value;

pub struct ClockTool;

impl ClockTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClockTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("now", "no args — current local date and time"),
            CommandSpec::new("today", "no args — current local date"),
        ]
    }

    fn instructions(&self) -> String {
        "clock: answers time questions. 'clock' or 'clock.now' returns the \
         current local date and time; 'clock.today' returns just the date. \
         Both take no arguments."
            .to_string()
    }

    async fn execute(&self, command: &str, _args: &[Value]) -> ToolOutcome {
        let now = chrono::Local::now();
        let mut metadata = Metadata::new();
        metadata.insert("iso".into(), Value::String(now.to_rfc3339()));
        match command {
            "today" => ToolOutcome::success(now.format("Today is %A, %B %-d, %Y").to_string())
                .with_metadata(metadata),
            _ => ToolOutcome::success(now.format("It is %H:%M:%S on %A, %B %-d, %Y").to_string())
                .with_metadata(metadata),
        }
    }
}
