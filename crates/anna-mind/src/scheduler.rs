//! The thinking loop
//!
//! Wake → select work → assemble context → call LM → parse → dispatch →
//! record outcome → sleep. One cycle at a time; everything the cycle
//! touches flows back through the thought buffer.

use crate::context::ContextAssembler;
use crate::parser::{Action, ActionParser};
use anna_buffer::{BufferStats, ThoughtBuffer, ThoughtSink};
use anna_core::{AnnaConfig, ErrorKind, Metadata, Priority, Thought, ThoughtSource};
use anna_llm::{GenerateParams, LanguageModel, LmError};
use anna_memory::{MemoryAdapter, Snippet};
use anna_tools::{ToolManager, ToolOutcome};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Scheduler operating mode for one cycle. Deterministic given buffer
/// state and the cycle counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Reactive,
    Deliberative,
    Idle,
    Maintenance,
}

#[derive(Clone, Debug)]
pub struct MindConfig {
    pub drain_limit: usize,
    pub idle_tick: Duration,
    pub pressured_tick: Duration,
    pub maintenance_every: u64,
    pub lm_deadline: Duration,
    pub token_budget: usize,
    pub backpressure_fill: f64,
    pub backpressure_window: Duration,
    pub unresponsive_backoff: Duration,
    pub replay_window: Duration,
    pub memory_snippets: usize,
    pub system_prompt: String,
    pub params: GenerateParams,
}

impl MindConfig {
    /// Lift the scheduler-relevant pieces out of the full config tree.
    /// `system_prompt` is the resolved persona (file contents or the
    /// configured fallback).
    pub fn from_config(config: &AnnaConfig, system_prompt: String) -> Self {
        let s = &config.scheduler;
        Self {
            drain_limit: s.drain_limit,
            idle_tick: Duration::from_secs_f64(s.idle_tick_secs),
            pressured_tick: Duration::from_secs_f64(s.pressured_tick_secs),
            maintenance_every: s.maintenance_every.max(1),
            lm_deadline: Duration::from_secs(s.lm_deadline_secs),
            token_budget: s.token_budget,
            backpressure_fill: s.backpressure_fill,
            backpressure_window: Duration::from_secs_f64(s.backpressure_window_secs),
            unresponsive_backoff: Duration::from_secs_f64(s.unresponsive_backoff_secs),
            replay_window: Duration::from_secs_f64(config.buffer.replay_window_secs),
            memory_snippets: config.memory.snippets,
            system_prompt,
            params: GenerateParams::from(&config.language_model),
        }
    }
}

impl Default for MindConfig {
    fn default() -> Self {
        Self::from_config(&AnnaConfig::default(), AnnaConfig::default().scheduler.persona)
    }
}

/// Control handle held by the embedding process.
#[derive(Clone)]
pub struct MindHandle {
    stop: CancellationToken,
    force: CancellationToken,
    kick: Arc<ThoughtBuffer>,
}

impl MindHandle {
    /// Graceful shutdown: the current cycle finishes, then the loop exits.
    pub fn request_shutdown(&self) {
        self.stop.cancel();
    }

    /// Force shutdown: additionally cancel in-flight LM and tool calls.
    pub fn force_shutdown(&self) {
        self.stop.cancel();
        self.force.cancel();
    }

    /// External "respond now" control.
    pub fn kick(&self) {
        self.kick.kick();
    }
}

pub struct Mind {
    buffer: Arc<ThoughtBuffer>,
    sink: ThoughtSink,
    tools: Arc<ToolManager>,
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryAdapter>,
    reply_tx: mpsc::Sender<String>,
    assembler: ContextAssembler,
    parser: ActionParser,
    config: MindConfig,
    stop: CancellationToken,
    force: CancellationToken,
    cycle_count: u64,
    pressure_since: Option<Instant>,
}

struct CycleReport {
    mode: Mode,
    replied: bool,
    actions_dispatched: usize,
}

impl Mind {
    pub fn new(
        buffer: Arc<ThoughtBuffer>,
        tools: Arc<ToolManager>,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryAdapter>,
        reply_tx: mpsc::Sender<String>,
        config: MindConfig,
    ) -> Self {
        let sink = buffer.sink();
        Self {
            assembler: ContextAssembler::new(config.token_budget),
            parser: ActionParser::new(),
            buffer,
            sink,
            tools,
            model,
            memory,
            reply_tx,
            config,
            stop: CancellationToken::new(),
            force: CancellationToken::new(),
            cycle_count: 0,
            pressure_since: None,
        }
    }

    pub fn handle(&self) -> MindHandle {
        MindHandle {
            stop: self.stop.clone(),
            force: self.force.clone(),
            kick: self.buffer.clone(),
        }
    }

    /// Run until shutdown is requested. One cycle at a time; a wake that
    /// lands mid-cycle is honored by the follow-up drain check rather than
    /// preemption.
    pub async fn run(mut self) {
        info!("thinking loop started");
        loop {
            let tick = if self.backpressure_active() {
                self.config.pressured_tick
            } else {
                self.config.idle_tick
            };
            tokio::select! {
                _ = self.buffer.notified() => {}
                _ = tokio::time::sleep(tick) => {}
                _ = self.stop.cancelled() => break,
            }

            // Keep cycling while urgent work remains (pending wake).
            loop {
                let report = self.run_cycle().await;
                if self.stop.is_cancelled() {
                    break;
                }
                let more_urgent = self
                    .buffer
                    .stats()
                    .highest_priority
                    .is_some_and(|p| p >= Priority::Medium);
                if report.mode == Mode::Idle || !more_urgent {
                    break;
                }
            }
            if self.stop.is_cancelled() {
                break;
            }
        }
        info!("thinking loop stopped");
    }

    async fn run_cycle(&mut self) -> CycleReport {
        self.cycle_count += 1;
        let stats = self.buffer.stats();
        let mode = self.select_mode(&stats);
        let mut report = CycleReport {
            mode,
            replied: false,
            actions_dispatched: 0,
        };
        debug!(cycle = self.cycle_count, ?mode, unconsumed = stats.unconsumed, "cycle start");

        match mode {
            Mode::Idle => return report,
            Mode::Maintenance => {
                self.maintenance(&stats).await;
                return report;
            }
            Mode::Reactive | Mode::Deliberative => {}
        }

        let floor = self.drain_floor(mode);
        let drained = self.buffer.drain(self.config.drain_limit, floor);
        let Some((focus, supporting)) = drained.split_first() else {
            return report;
        };

        // Step 4-6: retrieval + context assembly.
        let snippets = self.retrieve(&focus.content).await;
        let drained_ids: Vec<_> = drained.iter().map(|t| t.id).collect();
        let replay: Vec<Thought> = self
            .buffer
            .recent_consumed(self.config.replay_window)
            .into_iter()
            .filter(|t| !drained_ids.contains(&t.id))
            .collect();
        let instructions = self.tools.live_instructions();
        let capabilities = self.tools.capabilities_summary();
        let window = self.assembler.assemble(
            &self.config.system_prompt,
            &capabilities,
            &instructions,
            &snippets,
            &replay,
            supporting,
            focus,
        );
        debug!(
            tokens = window.tokens,
            dropped_supporting = window.dropped_supporting,
            dropped_snippets = window.dropped_snippets,
            "context assembled"
        );

        // Step 7: one LM call per cycle, under a wall-clock deadline.
        let raw = match self
            .model
            .generate(
                &window.prompt,
                &self.config.params,
                self.config.lm_deadline,
                self.force.child_token(),
            )
            .await
        {
            Ok(raw) => raw,
            Err(LmError::DeadlineExceeded(d)) => {
                warn!(deadline = ?d, "language model timed out");
                self.notice(
                    Some(ErrorKind::LmTimeout),
                    &format!("language model call exceeded its {}s deadline", d.as_secs()),
                );
                return report;
            }
            Err(LmError::Cancelled) => {
                debug!("language model call cancelled by shutdown");
                return report;
            }
            Err(e) => {
                warn!(error = %e, "language model call failed");
                self.notice(None, &format!("language model error: {}", e));
                return report;
            }
        };

        // Step 8-9: parse, surface issues, deliver the visible reply.
        let parsed = self.parser.parse(&raw);
        for issue in &parsed.issues {
            self.notice(Some(ErrorKind::LmMalformed), &issue.describe());
        }
        if !parsed.visible.is_empty() {
            if self.reply_tx.send(parsed.visible.clone()).await.is_err() {
                warn!("reply sink closed, dropping visible reply");
            }
            report.replied = true;
        }

        // Step 10: dispatch in emission order; every outcome re-enters the
        // buffer as a tool_result thought.
        for action in &parsed.actions {
            if self.force.is_cancelled() {
                break;
            }
            let outcome = self.dispatch(action).await;
            self.enqueue_outcome(action, outcome);
            report.actions_dispatched += 1;
        }

        // Step 11: a HIGH+ focus deserves either words or deeds.
        if !report.replied
            && report.actions_dispatched == 0
            && focus.priority >= Priority::High
        {
            warn!(focus = %focus.id, "unresponsive cycle");
            self.notice(
                None,
                "unresponsive cycle: an urgent thought was consumed without a reply or action",
            );
            tokio::time::sleep(self.config.unresponsive_backoff).await;
        }

        report
    }

    fn select_mode(&self, stats: &BufferStats) -> Mode {
        if self.cycle_count % self.config.maintenance_every == 0 {
            return Mode::Maintenance;
        }
        match stats.highest_priority {
            Some(p) if p >= Priority::High => Mode::Reactive,
            Some(_) => Mode::Deliberative,
            None => Mode::Idle,
        }
    }

    /// Reactive cycles skip low-priority chatter; backpressure raises the
    /// floor further so eviction can clear the backlog.
    fn drain_floor(&mut self, mode: Mode) -> Option<Priority> {
        let base = match mode {
            Mode::Reactive => Some(Priority::Medium),
            _ => None,
        };
        if self.backpressure_active() {
            Some(base.map_or(Priority::Medium, |p| p.max(Priority::Medium)))
        } else {
            base
        }
    }

    fn backpressure_active(&mut self) -> bool {
        let stats = self.buffer.stats();
        if stats.fill_ratio > self.config.backpressure_fill {
            let since = *self.pressure_since.get_or_insert_with(Instant::now);
            since.elapsed() >= self.config.backpressure_window
        } else {
            self.pressure_since = None;
            false
        }
    }

    async fn retrieve(&self, query: &str) -> Vec<Snippet> {
        match self.memory.retrieve(query, self.config.memory_snippets).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(error = %e, "memory retrieval failed, continuing without");
                Vec::new()
            }
        }
    }

    async fn dispatch(&self, action: &Action) -> ToolOutcome {
        tokio::select! {
            outcome = self
                .tools
                .dispatch(&action.tool, action.command.as_deref(), &action.args) => outcome,
            _ = self.force.cancelled() => ToolOutcome::failure(
                ErrorKind::Timeout,
                "cancelled by shutdown",
            ),
        }
    }

    fn enqueue_outcome(&self, action: &Action, outcome: ToolOutcome) {
        let mut metadata = outcome.metadata.clone();
        metadata.insert("success".into(), Value::Bool(outcome.success));
        metadata.insert("action".into(), Value::String(action.qualified_name()));
        if let Some(kind) = outcome.error_kind {
            metadata.insert("error_kind".into(), Value::String(kind.to_string()));
        }
        let mut content = outcome.content.clone();
        if let Some(guidance) = &outcome.guidance {
            content.push_str(&format!("\nHint: {}", guidance));
        }
        if content.trim().is_empty() {
            content = if outcome.success {
                "(no output)".to_string()
            } else {
                "(failed with no message)".to_string()
            };
        }
        let result = self.sink.add(
            &content,
            ThoughtSource::ToolResult,
            Some(&action.tool),
            Some(metadata),
            None,
        );
        if let Err(e) = result {
            warn!(error = %e, "failed to enqueue tool result");
        }
    }

    fn notice(&self, kind: Option<ErrorKind>, content: &str) {
        let metadata = kind.map(|k| {
            let mut m = Metadata::new();
            m.insert("kind".into(), Value::String(k.to_string()));
            m
        });
        let result = self.sink.add(
            content,
            ThoughtSource::SystemNotice,
            None,
            metadata,
            None,
        );
        if let Err(e) = result {
            warn!(error = %e, "failed to enqueue system notice");
        }
    }

    /// Maintenance cycle: log counters, surface a sustained CRITICAL
    /// backlog, and condense recent consumed history into a reflection.
    async fn maintenance(&mut self, stats: &BufferStats) {
        info!(
            unconsumed = stats.unconsumed,
            dropped_duplicates = stats.dropped_duplicates,
            dropped_quota = stats.dropped_quota,
            evictions = stats.evictions,
            critical_backlog = stats.critical_backlog,
            "maintenance"
        );

        if stats.critical_backlog > 0 && stats.fill_ratio >= 1.0 {
            self.notice(
                Some(ErrorKind::BufferOverflow),
                "critical thoughts are backing up faster than they are consumed",
            );
        }

        let replay = self.buffer.recent_consumed(self.config.replay_window);
        if replay.len() < 3 {
            return;
        }
        let mut prompt = String::from(
            "Condense the following recent thoughts into one short paragraph \
             capturing anything worth remembering. Reply with the paragraph only.\n\n",
        );
        for t in &replay {
            prompt.push_str(&format!("[{}] {}\n", t.source, t.content));
        }
        let summary = self
            .model
            .generate(
                &prompt,
                &self.config.params,
                self.config.lm_deadline,
                self.force.child_token(),
            )
            .await;
        match summary {
            Ok(text) if !text.trim().is_empty() => {
                let result = self.sink.add(
                    text.trim(),
                    ThoughtSource::InternalReflection,
                    Some("maintenance"),
                    None,
                    None,
                );
                if let Err(e) = result {
                    warn!(error = %e, "failed to enqueue reflection");
                }
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "maintenance summary skipped"),
        }
    }
}
