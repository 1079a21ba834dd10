//! Reminders tool — schedule future nudges that re-enter the thought stream
//!
//! The LM calls `reminders.add` when the user asks to be reminded. The
//! context loop watches the schedule and enqueues each due reminder as a
//! `reminder` thought. State lives in a JSON file in the tool's data dir.

use crate::outcome::ToolOutcome;
use crate::tool::{CommandSpec, Tool};
use anna_buffer::ThoughtSink;
use anna_core::{ErrorKind, Metadata, ThoughtSource};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Reminder {
    id: String,
    message: String,
    due_at: DateTime<Utc>,
    delivered: bool,
}

pub struct RemindersTool {
    store_path: PathBuf,
    entries: Mutex<Vec<Reminder>>,
}

impl RemindersTool {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn load(&self) -> std::io::Result<()> {
        let content = match std::fs::read_to_string(&self.store_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        match serde_json::from_str::<Vec<Reminder>>(&content) {
            Ok(entries) => {
                *self.entries.lock().expect("reminders lock poisoned") = entries;
            }
            Err(e) => warn!(path = %self.store_path.display(), error = %e, "reminder store unreadable, starting empty"),
        }
        Ok(())
    }

    fn save(&self) {
        let snapshot = self.entries.lock().expect("reminders lock poisoned").clone();
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize reminders");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.store_path, json) {
            warn!(path = %self.store_path.display(), error = %e, "failed to persist reminders");
        }
    }

    fn add(&self, args: &[Value]) -> ToolOutcome {
        let message = match args.first().and_then(|v| v.as_str()) {
            Some(m) if !m.trim().is_empty() => m.trim().to_string(),
            _ => {
                return ToolOutcome::failure(
                    ErrorKind::InvalidArgs,
                    "first argument must be the reminder message",
                )
                .with_guidance("usage: reminders.add [\"message\", seconds_from_now]");
            }
        };

        let due_at = match args.get(1) {
            Some(Value::Number(n)) => {
                let secs = n.as_i64().unwrap_or(-1);
                if secs <= 0 {
                    return ToolOutcome::failure(
                        ErrorKind::InvalidArgs,
                        "seconds_from_now must be a positive integer",
                    );
                }
                Utc::now() + ChronoDuration::seconds(secs)
            }
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(e) => {
                    return ToolOutcome::failure(
                        ErrorKind::InvalidArgs,
                        format!("invalid due datetime: {}", e),
                    )
                    .with_guidance("pass seconds_from_now or an RFC 3339 datetime");
                }
            },
            _ => {
                return ToolOutcome::failure(
                    ErrorKind::InvalidArgs,
                    "second argument must be seconds_from_now or an RFC 3339 datetime",
                );
            }
        };

        let reminder = Reminder {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.clone(),
            due_at,
            delivered: false,
        };
        let id = reminder.id.clone();
        self.entries
            .lock()
            .expect("reminders lock poisoned")
            .push(reminder);
        self.save();

        let mut metadata = Metadata::new();
        metadata.insert("reminder_id".into(), Value::String(id.clone()));
        ToolOutcome::success(format!(
            "Reminder scheduled for {} (id {})",
            due_at.to_rfc3339(),
            id
        ))
        .with_metadata(metadata)
    }

    fn list(&self) -> ToolOutcome {
        let entries = self.entries.lock().expect("reminders lock poisoned");
        let pending: Vec<&Reminder> = entries.iter().filter(|r| !r.delivered).collect();
        if pending.is_empty() {
            return ToolOutcome::success("No reminders scheduled.");
        }
        let mut out = format!("Scheduled reminders ({}):\n", pending.len());
        for r in &pending {
            out.push_str(&format!("- {} | due {} | id {}\n", r.message, r.due_at.to_rfc3339(), r.id));
        }
        ToolOutcome::success(out.trim_end().to_string())
    }

    fn remove(&self, args: &[Value]) -> ToolOutcome {
        let id = match args.first().and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => id,
            _ => {
                return ToolOutcome::failure(
                    ErrorKind::InvalidArgs,
                    "first argument must be the reminder id",
                );
            }
        };
        let mut entries = self.entries.lock().expect("reminders lock poisoned");
        let before = entries.len();
        entries.retain(|r| r.id != id);
        let removed = entries.len() < before;
        drop(entries);
        if removed {
            self.save();
            ToolOutcome::success(format!("Reminder '{}' removed.", id))
        } else {
            ToolOutcome::failure(
                ErrorKind::InvalidArgs,
                format!("no reminder with id '{}'", id),
            )
        }
    }

    /// Pop every due, undelivered reminder. Called from the context loop.
    fn take_due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut entries = self.entries.lock().expect("reminders lock poisoned");
        let mut due = Vec::new();
        for r in entries.iter_mut() {
            if !r.delivered && r.due_at <= now {
                r.delivered = true;
                due.push(r.clone());
            }
        }
        // Delivered entries have served their purpose.
        entries.retain(|r| !r.delivered);
        due
    }
}

#[async_trait::async_trait]
impl Tool for RemindersTool {
    fn name(&self) -> &str {
        "reminders"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list", "no args — show pending reminders"),
            CommandSpec::new(
                "add",
                "[message, seconds_from_now | rfc3339] — schedule a reminder",
            )
            .with_cooldown(Duration::from_secs(1)),
            CommandSpec::new("remove", "[id] — cancel a reminder"),
        ]
    }

    fn instructions(&self) -> String {
        "reminders: real async timers. Use 'reminders.add [\"message\", seconds]' \
         (or an RFC 3339 datetime as the second argument) when the user asks to \
         be reminded of something; the reminder re-enters your thoughts when \
         due. 'reminders.list' shows pending ones, 'reminders.remove [id]' \
         cancels. Do not promise a reminder without calling add."
            .to_string()
    }

    async fn initialize(&self) -> anna_core::Result<bool> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.load()?;
        Ok(true)
    }

    async fn cleanup(&self) {
        self.save();
    }

    fn has_context_loop(&self) -> bool {
        true
    }

    async fn context_loop(&self, sink: ThoughtSink, cancel: CancellationToken) {
        debug!("reminders context loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(TICK) => {}
                _ = cancel.cancelled() => break,
            }
            let due = self.take_due(Utc::now());
            if due.is_empty() {
                continue;
            }
            self.save();
            for r in due {
                let mut metadata = Metadata::new();
                metadata.insert("reminder_id".into(), Value::String(r.id.clone()));
                metadata.insert("due_at".into(), Value::String(r.due_at.to_rfc3339()));
                let result = sink.add(
                    &format!("Reminder due: {}", r.message),
                    ThoughtSource::Reminder,
                    Some("reminders"),
                    Some(metadata),
                    None,
                );
                if let Err(e) = result {
                    warn!(error = %e, "failed to enqueue reminder thought");
                }
            }
        }
        debug!("reminders context loop stopped");
    }

    async fn execute(&self, command: &str, args: &[Value]) -> ToolOutcome {
        match command {
            "add" => self.add(args),
            "remove" => self.remove(args),
            _ => self.list(),
        }
    }
}
