//! Tool manager — registry, lifecycle state machine, dispatch pipeline
//!
//! Registration happens at startup and teardown at shutdown; steady-state
//! reads are lock-free snapshots. Context loops are sibling tasks owned
//! here and cancelled before `cleanup` returns.

use crate::descriptor::{ToolDescriptor, DESCRIPTOR_FILE};
use crate::outcome::ToolOutcome;
use crate::tool::Tool;
use crate::ToolFactory;
use anna_buffer::ThoughtSink;
use anna_core::{ErrorKind, ToolsConfig};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle states per tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolState {
    Initializing,
    RegisteredAvailable,
    RegisteredUnavailable,
    TearingDown,
}

struct ToolEntry {
    tool: Arc<dyn Tool>,
    state: ToolState,
    loop_cancel: CancellationToken,
    loop_task: Option<JoinHandle<()>>,
    /// Merged cooldowns: command spec defaults overridden by descriptor.
    cooldowns: HashMap<String, Duration>,
    last_invoked: HashMap<String, Instant>,
}

struct InstructionRecord {
    last_retrieved_at: Instant,
    ttl: Duration,
}

impl InstructionRecord {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_retrieved_at) <= self.ttl
    }
}

pub struct ToolManager {
    tools: DashMap<String, ToolEntry>,
    instructions: DashMap<String, InstructionRecord>,
    sink: ThoughtSink,
    execute_deadline: Duration,
    instruction_ttl: Duration,
}

impl ToolManager {
    pub fn new(sink: ThoughtSink, config: &ToolsConfig) -> Self {
        Self {
            tools: DashMap::new(),
            instructions: DashMap::new(),
            sink,
            execute_deadline: Duration::from_secs(config.execute_deadline_secs),
            instruction_ttl: Duration::from_secs(config.instruction_ttl_secs),
        }
    }

    /// Register a tool: initialize, classify availability, start the
    /// context loop. Idempotent — re-registering a live name is a no-op.
    pub async fn register(&self, tool: Arc<dyn Tool>) -> anna_core::Result<bool> {
        self.register_with_cooldowns(tool, HashMap::new()).await
    }

    async fn register_with_cooldowns(
        &self,
        tool: Arc<dyn Tool>,
        overrides: HashMap<String, Duration>,
    ) -> anna_core::Result<bool> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            debug!(tool = %name, "already registered");
            return Ok(false);
        }

        match tool.initialize().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(tool = %name, "initialize declined registration");
                return Ok(false);
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "initialize failed, tool omitted");
                return Ok(false);
            }
        }

        let mut cooldowns: HashMap<String, Duration> = tool
            .commands()
            .iter()
            .filter_map(|c| c.cooldown.map(|d| (c.name.to_string(), d)))
            .collect();
        cooldowns.extend(overrides);

        let loop_cancel = CancellationToken::new();
        let loop_task = if tool.has_context_loop() {
            let task_tool = tool.clone();
            let sink = self.sink.clone();
            let cancel = loop_cancel.clone();
            Some(tokio::spawn(async move {
                task_tool.context_loop(sink, cancel).await;
            }))
        } else {
            None
        };

        let state = if tool.is_available() {
            ToolState::RegisteredAvailable
        } else {
            ToolState::RegisteredUnavailable
        };
        info!(tool = %name, ?state, context_loop = loop_task.is_some(), "registered tool");

        self.tools.insert(
            name,
            ToolEntry {
                tool,
                state,
                loop_cancel,
                loop_task,
                cooldowns,
                last_invoked: HashMap::new(),
            },
        );
        Ok(true)
    }

    /// Scan an install directory for descriptor subdirectories and
    /// register every tool the factory table knows. Failures are logged
    /// and skipped; returns how many tools registered.
    pub async fn discover(
        &self,
        install_dir: &Path,
        factories: &HashMap<&'static str, ToolFactory>,
        ctx: &crate::ToolContext,
    ) -> usize {
        let mut registered = 0;
        for entry in walkdir::WalkDir::new(install_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            let descriptor_path = entry.path().join(DESCRIPTOR_FILE);
            if !descriptor_path.is_file() {
                continue;
            }
            let descriptor = match ToolDescriptor::load(&descriptor_path) {
                Ok(d) => d,
                Err(e) => {
                    warn!(path = %descriptor_path.display(), error = %e, "bad descriptor, skipping");
                    continue;
                }
            };
            if !descriptor.enabled {
                debug!(tool = %descriptor.name, "descriptor disabled");
                continue;
            }
            let factory = match factories.get(descriptor.entry()) {
                Some(f) => f,
                None => {
                    warn!(
                        tool = %descriptor.name,
                        entry = descriptor.entry(),
                        "no builtin entry point, skipping"
                    );
                    continue;
                }
            };
            let overrides = descriptor
                .cooldowns
                .iter()
                .map(|(cmd, secs)| (cmd.clone(), Duration::from_secs(*secs)))
                .collect();
            let tool = factory(ctx);
            match self.register_with_cooldowns(tool, overrides).await {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => warn!(tool = %descriptor.name, error = %e, "registration failed"),
            }
        }
        registered
    }

    /// The §4.4 invocation pipeline. Every failure mode comes back as a
    /// structured outcome; nothing escapes as an error.
    pub async fn dispatch(&self, tool: &str, command: Option<&str>, args: &[Value]) -> ToolOutcome {
        self.dispatch_with_deadline(tool, command, args, self.execute_deadline)
            .await
    }

    pub async fn dispatch_with_deadline(
        &self,
        tool_name: &str,
        command: Option<&str>,
        args: &[Value],
        deadline: Duration,
    ) -> ToolOutcome {
        // Resolve + gate synchronously, then drop the registry guard
        // before awaiting the tool.
        let (tool, command) = {
            let mut entry = match self.tools.get_mut(tool_name) {
                Some(e) => e,
                None => {
                    return ToolOutcome::failure(
                        ErrorKind::UnknownTool,
                        format!("no tool named '{}'", tool_name),
                    )
                    .with_guidance(format!("known tools: {}", self.list().join(", ")));
                }
            };

            let commands = entry.tool.commands();
            let command = match command {
                Some(c) => match commands.iter().find(|spec| spec.name == c) {
                    Some(spec) => spec.name,
                    None => {
                        let known: Vec<&str> = commands.iter().map(|s| s.name).collect();
                        return ToolOutcome::failure(
                            ErrorKind::UnknownCommand,
                            format!("tool '{}' has no command '{}'", tool_name, c),
                        )
                        .with_guidance(format!("commands: {}", known.join(", ")));
                    }
                },
                None => match commands.first() {
                    Some(spec) => spec.name,
                    None => {
                        return ToolOutcome::failure(
                            ErrorKind::UnknownCommand,
                            format!("tool '{}' exposes no commands", tool_name),
                        );
                    }
                },
            };

            if !entry.tool.is_available() {
                entry.state = ToolState::RegisteredUnavailable;
                let mut outcome = ToolOutcome::failure(
                    ErrorKind::ToolUnavailable,
                    format!("tool '{}' is currently unavailable", tool_name),
                );
                if let Some(guidance) = entry.tool.unavailable_guidance() {
                    outcome = outcome.with_guidance(guidance);
                }
                return outcome;
            }
            entry.state = ToolState::RegisteredAvailable;

            let now = Instant::now();
            if let Some(min_interval) = entry.cooldowns.get(command).copied() {
                if let Some(last) = entry.last_invoked.get(command) {
                    let since = now.saturating_duration_since(*last);
                    if since < min_interval {
                        let wait = min_interval - since;
                        return ToolOutcome::failure(
                            ErrorKind::RateLimited,
                            format!(
                                "'{}.{}' is rate limited, retry in {:.0}s",
                                tool_name,
                                command,
                                wait.as_secs_f64().ceil()
                            ),
                        );
                    }
                }
            }
            entry.last_invoked.insert(command.to_string(), now);

            (entry.tool.clone(), command)
        };

        // Run in its own task so a panicking tool becomes a structured
        // outcome instead of unwinding into the scheduler.
        let cancel = CancellationToken::new();
        let exec_cancel = cancel.clone();
        let exec_args = args.to_vec();
        let exec = tokio::spawn(async move {
            tool.execute_cancellable(command, &exec_args, exec_cancel).await
        });

        let outcome = match tokio::time::timeout(deadline, exec).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(tool = %tool_name, command, error = %e, "tool crashed");
                ToolOutcome::failure(
                    ErrorKind::ToolInternalError,
                    format!("'{}.{}' crashed: {}", tool_name, command, e),
                )
            }
            Err(_) => {
                cancel.cancel();
                warn!(tool = %tool_name, command, "tool execution deadline exceeded");
                ToolOutcome::failure(
                    ErrorKind::Timeout,
                    format!(
                        "'{}.{}' did not finish within {}s",
                        tool_name,
                        command,
                        deadline.as_secs()
                    ),
                )
            }
        };

        self.renew_instructions(tool_name);
        outcome
    }

    /// Fetch a tool's instruction blob and renew its persistence record.
    pub fn instructions_for(&self, name: &str) -> Option<String> {
        let entry = self.tools.get(name)?;
        let blob = entry.tool.instructions();
        drop(entry);
        self.renew_instructions(name);
        Some(blob)
    }

    fn renew_instructions(&self, name: &str) {
        if !self.tools.contains_key(name) {
            return;
        }
        self.instructions.insert(
            name.to_string(),
            InstructionRecord {
                last_retrieved_at: Instant::now(),
                ttl: self.instruction_ttl,
            },
        );
    }

    /// Instruction blobs of every tool whose persistence record is live.
    /// Expired records are pruned on the way through.
    pub fn live_instructions(&self) -> Vec<(String, String)> {
        let now = Instant::now();
        self.instructions.retain(|_, record| record.is_live(now));
        let mut blobs: Vec<(String, String)> = self
            .instructions
            .iter()
            .filter_map(|record| {
                self.tools
                    .get(record.key())
                    .map(|entry| (record.key().clone(), entry.tool.instructions()))
            })
            .collect();
        blobs.sort();
        blobs
    }

    /// One line per tool for the system prompt: name, availability,
    /// command surface.
    pub fn capabilities_summary(&self) -> String {
        let mut lines: Vec<String> = self
            .tools
            .iter()
            .map(|entry| {
                let commands: Vec<&str> =
                    entry.tool.commands().iter().map(|c| c.name).collect();
                let availability = if entry.tool.is_available() {
                    "available"
                } else {
                    "unavailable"
                };
                format!(
                    "- {} ({}): {}",
                    entry.key(),
                    availability,
                    commands.join(", ")
                )
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn state_of(&self, name: &str) -> Option<ToolState> {
        self.tools.get(name).map(|e| match e.state {
            ToolState::RegisteredAvailable | ToolState::RegisteredUnavailable => {
                if e.tool.is_available() {
                    ToolState::RegisteredAvailable
                } else {
                    ToolState::RegisteredUnavailable
                }
            }
            other => other,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tear down a single tool: cancel its loop, await it, run cleanup,
    /// drop the entry.
    pub async fn unregister(&self, name: &str) {
        let entry = match self.tools.remove(name) {
            Some((_, mut entry)) => {
                entry.state = ToolState::TearingDown;
                entry
            }
            None => return,
        };
        entry.loop_cancel.cancel();
        if let Some(task) = entry.loop_task {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                warn!(tool = %name, "context loop did not stop in time");
            }
        }
        entry.tool.cleanup().await;
        self.instructions.remove(name);
        info!(tool = %name, "unregistered tool");
    }

    /// Tear everything down. Idempotent.
    pub async fn shutdown(&self) {
        for name in self.list() {
            self.unregister(&name).await;
        }
    }
}
