//! Tests for anna-tools: outcomes, manager lifecycle, dispatch pipeline,
//! discovery, instruction ledger, and the builtin tools

use anna_buffer::{ThoughtBuffer, ThoughtSink};
use anna_core::{ErrorKind, ThoughtSource, ToolsConfig};
use anna_tools::tools::clock::ClockTool;
use anna_tools::tools::reminders::RemindersTool;
use anna_tools::{
    builtin_factories, register_builtins, CommandSpec, Tool, ToolContext, ToolManager,
    ToolOutcome, ToolState,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn manager() -> (Arc<ThoughtBuffer>, ToolManager) {
    let buffer = Arc::new(ThoughtBuffer::new(Default::default()));
    let manager = ToolManager::new(buffer.sink(), &ToolsConfig::default());
    (buffer, manager)
}

// ===========================================================================
// Test doubles
// ===========================================================================

#[derive(Default)]
struct EchoTool {
    calls: AtomicUsize,
    available: AtomicBool,
    cleanups: AtomicUsize,
}

impl EchoTool {
    fn new() -> Arc<Self> {
        let tool = Self::default();
        tool.available.store(true, Ordering::SeqCst);
        Arc::new(tool)
    }
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("say", "[text] — repeat the text"),
            CommandSpec::new("slow", "no args — never finishes"),
            CommandSpec::new("limited", "no args — cooldown 60s")
                .with_cooldown(Duration::from_secs(60)),
        ]
    }

    fn instructions(&self) -> String {
        "echo: repeats things back. Use 'echo.say [\"text\"]'.".to_string()
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn unavailable_guidance(&self) -> Option<String> {
        Some("echo is resting, try again later".to_string())
    }

    async fn execute(&self, command: &str, args: &[Value]) -> ToolOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match command {
            "slow" => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                ToolOutcome::success("never reached")
            }
            _ => match args.first().and_then(|v| v.as_str()) {
                Some(text) => ToolOutcome::success(format!("echo: {}", text)),
                None => ToolOutcome::failure(ErrorKind::InvalidArgs, "need text"),
            },
        }
    }
}

struct LoopTool {
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LoopTool {
    fn new() -> (Arc<Self>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let started = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let tool = Arc::new(Self {
            started: started.clone(),
            stopped: stopped.clone(),
        });
        (tool, started, stopped)
    }
}

#[async_trait::async_trait]
impl Tool for LoopTool {
    fn name(&self) -> &str {
        "looper"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("status", "no args")]
    }

    fn instructions(&self) -> String {
        "looper: watches things in the background.".to_string()
    }

    fn has_context_loop(&self) -> bool {
        true
    }

    async fn context_loop(&self, sink: ThoughtSink, cancel: CancellationToken) {
        self.started.store(true, Ordering::SeqCst);
        let _ = sink.add("looper woke up", ThoughtSource::ContextLoop, Some("looper"), None, None);
        cancel.cancelled().await;
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn execute(&self, _command: &str, _args: &[Value]) -> ToolOutcome {
        ToolOutcome::success("looping")
    }
}

struct BrokenTool;

#[async_trait::async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("go", "no args")]
    }
    fn instructions(&self) -> String {
        String::new()
    }
    async fn initialize(&self) -> anna_core::Result<bool> {
        Err(anna_core::Error::tool_error("broken", "no hardware"))
    }
    async fn execute(&self, _command: &str, _args: &[Value]) -> ToolOutcome {
        ToolOutcome::success("unreachable")
    }
}

// ===========================================================================
// ToolOutcome
// ===========================================================================

#[test]
fn outcome_constructors() {
    let ok = ToolOutcome::success("done");
    assert!(ok.success);
    assert!(ok.error_kind.is_none());

    let fail = ToolOutcome::failure(ErrorKind::Timeout, "too slow").with_guidance("retry");
    assert!(!fail.success);
    assert!(fail.is_timeout());
    assert_eq!(fail.guidance.as_deref(), Some("retry"));
}

#[test]
fn outcome_serde_carries_error_kind() {
    let fail = ToolOutcome::failure(ErrorKind::RateLimited, "wait");
    let json = serde_json::to_string(&fail).unwrap();
    assert!(json.contains("rate_limited"));
    let back: ToolOutcome = serde_json::from_str(&json).unwrap();
    assert_eq!(back.error_kind, Some(ErrorKind::RateLimited));
}

// ===========================================================================
// Registration lifecycle
// ===========================================================================

#[tokio::test]
async fn register_and_dispatch() {
    let (_buffer, manager) = manager();
    assert!(manager.register(EchoTool::new()).await.unwrap());
    assert_eq!(manager.state_of("echo"), Some(ToolState::RegisteredAvailable));

    let outcome = manager
        .dispatch("echo", Some("say"), &[json!("hello")])
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.content, "echo: hello");
}

#[tokio::test]
async fn registration_is_idempotent() {
    let (_buffer, manager) = manager();
    assert!(manager.register(EchoTool::new()).await.unwrap());
    assert!(!manager.register(EchoTool::new()).await.unwrap());
    assert_eq!(manager.list(), vec!["echo".to_string()]);
}

#[tokio::test]
async fn failed_initialize_omits_the_tool() {
    let (_buffer, manager) = manager();
    assert!(!manager.register(Arc::new(BrokenTool)).await.unwrap());
    assert!(!manager.contains("broken"));
    // Startup proceeds: other tools still register.
    assert!(manager.register(EchoTool::new()).await.unwrap());
}

#[tokio::test]
async fn initialize_cleanup_initialize_is_idempotent() {
    let (_buffer, manager) = manager();
    let tool = EchoTool::new();
    manager.register(tool.clone()).await.unwrap();
    manager.unregister("echo").await;
    assert!(!manager.contains("echo"));
    assert_eq!(tool.cleanups.load(Ordering::SeqCst), 1);

    assert!(manager.register(tool.clone()).await.unwrap());
    assert_eq!(manager.state_of("echo"), Some(ToolState::RegisteredAvailable));
    let outcome = manager.dispatch("echo", Some("say"), &[json!("back")]).await;
    assert!(outcome.success);
}

#[tokio::test]
async fn unavailable_tool_registers_as_unavailable() {
    let (_buffer, manager) = manager();
    let tool = EchoTool::new();
    tool.available.store(false, Ordering::SeqCst);
    manager.register(tool).await.unwrap();
    assert_eq!(
        manager.state_of("echo"),
        Some(ToolState::RegisteredUnavailable)
    );
}

// ===========================================================================
// Dispatch pipeline
// ===========================================================================

#[tokio::test]
async fn unknown_tool_is_a_structured_failure() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    let outcome = manager.dispatch("nonexistent", None, &[]).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::UnknownTool));
    assert!(outcome.guidance.unwrap().contains("echo"));
}

#[tokio::test]
async fn unknown_tool_has_no_side_effects() {
    let (_buffer, manager) = manager();
    let tool = EchoTool::new();
    manager.register(tool.clone()).await.unwrap();
    manager.dispatch("nonexistent", None, &[]).await;
    assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_command_is_a_structured_failure() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    let outcome = manager.dispatch("echo", Some("shout"), &[]).await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::UnknownCommand));
    assert!(outcome.guidance.unwrap().contains("say"));
}

#[tokio::test]
async fn missing_command_uses_the_default() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    // First command in the list ("say") is the default.
    let outcome = manager.dispatch("echo", None, &[json!("hi")]).await;
    assert!(outcome.success);
    assert_eq!(outcome.content, "echo: hi");
}

#[tokio::test]
async fn unavailable_tool_returns_guidance() {
    let (_buffer, manager) = manager();
    let tool = EchoTool::new();
    manager.register(tool.clone()).await.unwrap();
    tool.available.store(false, Ordering::SeqCst);

    let outcome = manager.dispatch("echo", Some("say"), &[json!("hi")]).await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::ToolUnavailable));
    assert_eq!(outcome.guidance.as_deref(), Some("echo is resting, try again later"));
    assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cooldown_rate_limits_repeat_calls() {
    let (_buffer, manager) = manager();
    let tool = EchoTool::new();
    manager.register(tool.clone()).await.unwrap();

    let first = manager.dispatch("echo", Some("limited"), &[json!("a")]).await;
    assert!(first.success);
    let second = manager.dispatch("echo", Some("limited"), &[json!("b")]).await;
    assert_eq!(second.error_kind, Some(ErrorKind::RateLimited));
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

    // Other commands are unaffected.
    let other = manager.dispatch("echo", Some("say"), &[json!("c")]).await;
    assert!(other.success);
}

struct PanickyTool;

#[async_trait::async_trait]
impl Tool for PanickyTool {
    fn name(&self) -> &str {
        "panicky"
    }
    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("boom", "no args")]
    }
    fn instructions(&self) -> String {
        String::new()
    }
    async fn execute(&self, _command: &str, _args: &[Value]) -> ToolOutcome {
        panic!("tool bug");
    }
}

#[tokio::test]
async fn panicking_tool_becomes_tool_internal_error() {
    let (_buffer, manager) = manager();
    manager.register(Arc::new(PanickyTool)).await.unwrap();
    let outcome = manager.dispatch("panicky", Some("boom"), &[]).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::ToolInternalError));
    // The manager survives and keeps dispatching.
    manager.register(EchoTool::new()).await.unwrap();
    let ok = manager.dispatch("echo", Some("say"), &[json!("still here")]).await;
    assert!(ok.success);
}

#[tokio::test]
async fn deadline_produces_a_timeout_outcome() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    let outcome = manager
        .dispatch_with_deadline("echo", Some("slow"), &[], Duration::from_millis(50))
        .await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Timeout));
}

// ===========================================================================
// Context loops
// ===========================================================================

#[tokio::test]
async fn context_loop_runs_between_register_and_cleanup() {
    let (buffer, manager) = manager();
    let (tool, started, stopped) = LoopTool::new();
    manager.register(tool).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(started.load(Ordering::SeqCst));
    assert!(!stopped.load(Ordering::SeqCst));

    // The loop's thought landed in the buffer.
    let drained = buffer.drain(8, None);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].source, ThoughtSource::ContextLoop);
    assert_eq!(drained[0].origin_tag.as_deref(), Some("looper"));

    manager.unregister("looper").await;
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_stops_every_loop_and_cleans_up() {
    let (_buffer, manager) = manager();
    let (loop_tool, _, stopped) = LoopTool::new();
    let echo = EchoTool::new();
    manager.register(loop_tool).await.unwrap();
    manager.register(echo.clone()).await.unwrap();

    manager.shutdown().await;
    assert!(manager.is_empty());
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(echo.cleanups.load(Ordering::SeqCst), 1);

    // Shutdown is idempotent.
    manager.shutdown().await;
}

// ===========================================================================
// Instruction persistence
// ===========================================================================

#[tokio::test]
async fn dispatch_renews_instruction_records() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    assert!(manager.live_instructions().is_empty());

    manager.dispatch("echo", Some("say"), &[json!("x")]).await;
    let live = manager.live_instructions();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].0, "echo");
    assert!(live[0].1.contains("echo.say"));
}

#[tokio::test]
async fn instruction_records_expire() {
    let buffer = Arc::new(ThoughtBuffer::new(Default::default()));
    let manager = ToolManager::new(
        buffer.sink(),
        &ToolsConfig {
            instruction_ttl_secs: 0,
            ..ToolsConfig::default()
        },
    );
    manager.register(EchoTool::new()).await.unwrap();
    manager.dispatch("echo", Some("say"), &[json!("x")]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(manager.live_instructions().is_empty());
}

#[tokio::test]
async fn instructions_for_renews_on_demand() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    let blob = manager.instructions_for("echo").unwrap();
    assert!(blob.contains("repeats"));
    assert_eq!(manager.live_instructions().len(), 1);
    assert!(manager.instructions_for("ghost").is_none());
}

#[tokio::test]
async fn capabilities_summary_lists_every_tool() {
    let (_buffer, manager) = manager();
    manager.register(EchoTool::new()).await.unwrap();
    let (loop_tool, _, _) = LoopTool::new();
    manager.register(loop_tool).await.unwrap();

    let summary = manager.capabilities_summary();
    assert!(summary.contains("- echo (available): say, slow, limited"));
    assert!(summary.contains("- looper (available): status"));
    manager.shutdown().await;
}

// ===========================================================================
// Discovery
// ===========================================================================

#[tokio::test]
async fn discovery_registers_known_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let clock_dir = dir.path().join("clock");
    std::fs::create_dir_all(&clock_dir).unwrap();
    std::fs::write(clock_dir.join("tool.toml"), "name = \"clock\"\n").unwrap();

    let (_buffer, manager) = manager();
    let ctx = ToolContext::new(dir.path().join("data"));
    let registered = manager.discover(dir.path(), &builtin_factories(), &ctx).await;
    assert_eq!(registered, 1);
    assert!(manager.contains("clock"));
}

#[tokio::test]
async fn discovery_skips_bad_disabled_and_unknown_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in [
        ("garbled", "not valid toml ==="),
        ("off", "name = \"clock\"\nenabled = false\n"),
        ("mystery", "name = \"teleporter\"\n"),
        ("good", "name = \"clock\"\n"),
    ] {
        let sub = dir.path().join(name);
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("tool.toml"), body).unwrap();
    }
    // A subdirectory without a descriptor is ignored entirely.
    std::fs::create_dir_all(dir.path().join("no_descriptor")).unwrap();

    let (_buffer, manager) = manager();
    let ctx = ToolContext::new(dir.path().join("data"));
    let registered = manager.discover(dir.path(), &builtin_factories(), &ctx).await;
    assert_eq!(registered, 1);
    assert_eq!(manager.list(), vec!["clock".to_string()]);
}

#[tokio::test]
async fn descriptor_cooldowns_override_command_spec() {
    let dir = tempfile::tempdir().unwrap();
    let clock_dir = dir.path().join("clock");
    std::fs::create_dir_all(&clock_dir).unwrap();
    std::fs::write(
        clock_dir.join("tool.toml"),
        "name = \"clock\"\n\n[cooldowns]\nnow = 60\n",
    )
    .unwrap();

    let (_buffer, manager) = manager();
    let ctx = ToolContext::new(dir.path().join("data"));
    manager.discover(dir.path(), &builtin_factories(), &ctx).await;

    let first = manager.dispatch("clock", Some("now"), &[]).await;
    assert!(first.success);
    let second = manager.dispatch("clock", Some("now"), &[]).await;
    assert_eq!(second.error_kind, Some(ErrorKind::RateLimited));
}

#[tokio::test]
async fn register_builtins_registers_the_whole_set() {
    let dir = tempfile::tempdir().unwrap();
    let (_buffer, manager) = manager();
    let ctx = ToolContext::new(dir.path());
    let registered = register_builtins(&manager, &ctx).await;
    assert_eq!(registered, 2);
    assert!(manager.contains("clock"));
    assert!(manager.contains("reminders"));
    manager.shutdown().await;
}

// ===========================================================================
// Builtin: clock
// ===========================================================================

#[tokio::test]
async fn clock_tells_the_time() {
    let clock = ClockTool::new();
    let outcome = clock.execute("now", &[]).await;
    assert!(outcome.success);
    assert!(outcome.content.starts_with("It is "));
    assert!(outcome.metadata.contains_key("iso"));

    let today = clock.execute("today", &[]).await;
    assert!(today.content.starts_with("Today is "));
}

// ===========================================================================
// Builtin: reminders
// ===========================================================================

fn reminders_in(dir: &std::path::Path) -> RemindersTool {
    RemindersTool::new(dir.join("reminders.json"))
}

#[tokio::test]
async fn reminders_add_list_remove() {
    let dir = tempfile::tempdir().unwrap();
    let tool = reminders_in(dir.path());
    tool.initialize().await.unwrap();

    let added = tool.execute("add", &[json!("stretch"), json!(3600)]).await;
    assert!(added.success);
    let id = added.metadata.get("reminder_id").unwrap().as_str().unwrap().to_string();

    let listed = tool.execute("list", &[]).await;
    assert!(listed.content.contains("stretch"));

    let removed = tool.execute("remove", &[json!(id)]).await;
    assert!(removed.success);
    let empty = tool.execute("list", &[]).await;
    assert_eq!(empty.content, "No reminders scheduled.");
}

#[tokio::test]
async fn reminders_validate_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let tool = reminders_in(dir.path());
    tool.initialize().await.unwrap();

    let no_message = tool.execute("add", &[]).await;
    assert_eq!(no_message.error_kind, Some(ErrorKind::InvalidArgs));

    let bad_time = tool.execute("add", &[json!("x"), json!(-5)]).await;
    assert_eq!(bad_time.error_kind, Some(ErrorKind::InvalidArgs));

    let bad_date = tool.execute("add", &[json!("x"), json!("tomorrow-ish")]).await;
    assert_eq!(bad_date.error_kind, Some(ErrorKind::InvalidArgs));

    let missing_id = tool.execute("remove", &[]).await;
    assert_eq!(missing_id.error_kind, Some(ErrorKind::InvalidArgs));
}

#[tokio::test]
async fn reminders_accept_rfc3339_due_times() {
    let dir = tempfile::tempdir().unwrap();
    let tool = reminders_in(dir.path());
    tool.initialize().await.unwrap();
    let outcome = tool
        .execute("add", &[json!("future"), json!("2999-01-01T00:00:00Z")])
        .await;
    assert!(outcome.success);
}

#[tokio::test]
async fn reminders_persist_across_initialize() {
    let dir = tempfile::tempdir().unwrap();
    {
        let tool = reminders_in(dir.path());
        tool.initialize().await.unwrap();
        tool.execute("add", &[json!("persisted"), json!(3600)]).await;
        tool.cleanup().await;
    }
    let tool = reminders_in(dir.path());
    tool.initialize().await.unwrap();
    let listed = tool.execute("list", &[]).await;
    assert!(listed.content.contains("persisted"));
}

#[tokio::test]
async fn due_reminder_reenters_the_thought_stream() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(ThoughtBuffer::new(Default::default()));
    let manager = ToolManager::new(buffer.sink(), &ToolsConfig::default());
    manager
        .register(Arc::new(reminders_in(dir.path())))
        .await
        .unwrap();

    let outcome = manager
        .dispatch("reminders", Some("add"), &[json!("drink water"), json!(1)])
        .await;
    assert!(outcome.success);

    // The context loop ticks every second; give it two.
    tokio::time::sleep(Duration::from_millis(2300)).await;
    let drained = buffer.drain(8, None);
    let reminder = drained
        .iter()
        .find(|t| t.source == ThoughtSource::Reminder)
        .expect("reminder thought should be enqueued");
    assert!(reminder.content.contains("drink water"));
    assert_eq!(reminder.origin_tag.as_deref(), Some("reminders"));
    assert_eq!(reminder.priority, anna_core::Priority::High);

    manager.shutdown().await;
}
