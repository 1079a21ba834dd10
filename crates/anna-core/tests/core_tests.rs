//! Tests for anna-core: thought model, priority table, errors, config

use anna_core::*;

// ===========================================================================
// Priority
// ===========================================================================

#[test]
fn priority_ordering_is_total() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert!(Priority::Low > Priority::Background);
}

#[test]
fn priority_rank_matches_ordering() {
    let ordered = [
        Priority::Background,
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
    for pair in ordered.windows(2) {
        assert!(pair[0].rank() < pair[1].rank());
    }
}

#[test]
fn priority_parse_accepts_any_case() {
    assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
    assert_eq!(Priority::parse("critical"), Some(Priority::Critical));
    assert_eq!(Priority::parse("Background"), Some(Priority::Background));
}

#[test]
fn priority_parse_unknown_is_none() {
    // Unknown overrides must fall back to the source default.
    assert_eq!(Priority::parse("urgent"), None);
    assert_eq!(Priority::parse(""), None);
}

#[test]
fn priority_serde_roundtrip() {
    for p in [
        Priority::Background,
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ] {
        let json = serde_json::to_string(&p).unwrap();
        let back: Priority = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}

// ===========================================================================
// ThoughtSource — default priority table
// ===========================================================================

#[test]
fn source_default_priority_table() {
    assert_eq!(ThoughtSource::UserInput.default_priority(), Priority::High);
    assert_eq!(ThoughtSource::Reminder.default_priority(), Priority::High);
    assert_eq!(ThoughtSource::ToolResult.default_priority(), Priority::Medium);
    assert_eq!(ThoughtSource::PlatformChat.default_priority(), Priority::Medium);
    assert_eq!(ThoughtSource::VisionResult.default_priority(), Priority::Medium);
    assert_eq!(ThoughtSource::ContextLoop.default_priority(), Priority::Low);
    assert_eq!(
        ThoughtSource::InternalReflection.default_priority(),
        Priority::Low
    );
    assert_eq!(
        ThoughtSource::SystemNotice.default_priority(),
        Priority::Background
    );
}

#[test]
fn vision_urgency_seven_and_up_is_high() {
    let mut meta = Metadata::new();
    meta.insert("urgency".into(), serde_json::json!(9));
    assert_eq!(
        ThoughtSource::VisionResult.classify(Some(&meta), None),
        Priority::High
    );

    meta.insert("urgency".into(), serde_json::json!(7));
    assert_eq!(
        ThoughtSource::VisionResult.classify(Some(&meta), None),
        Priority::High
    );

    meta.insert("urgency".into(), serde_json::json!(6));
    assert_eq!(
        ThoughtSource::VisionResult.classify(Some(&meta), None),
        Priority::Medium
    );
}

#[test]
fn malformed_urgency_falls_back_to_medium() {
    let mut meta = Metadata::new();
    meta.insert("urgency".into(), serde_json::json!("very"));
    assert_eq!(
        ThoughtSource::VisionResult.classify(Some(&meta), None),
        Priority::Medium
    );
}

#[test]
fn explicit_override_beats_table_and_urgency() {
    let mut meta = Metadata::new();
    meta.insert("urgency".into(), serde_json::json!(9));
    assert_eq!(
        ThoughtSource::VisionResult.classify(Some(&meta), Some(Priority::Background)),
        Priority::Background
    );
    assert_eq!(
        ThoughtSource::SystemNotice.classify(None, Some(Priority::Critical)),
        Priority::Critical
    );
}

#[test]
fn source_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ThoughtSource::UserInput).unwrap(),
        r#""user_input""#
    );
    assert_eq!(
        serde_json::to_string(&ThoughtSource::VisionResult).unwrap(),
        r#""vision_result""#
    );
}

#[test]
fn normalized_content_collapses_whitespace() {
    assert_eq!(
        Thought::normalized_content("  hello   world \n"),
        "hello world"
    );
    assert_eq!(Thought::normalized_content("hello world"), "hello world");
}

// ===========================================================================
// ThoughtId
// ===========================================================================

#[test]
fn thought_ids_are_unique() {
    let a = ThoughtId::new();
    let b = ThoughtId::new();
    assert_ne!(a, b);
}

// ===========================================================================
// ErrorKind
// ===========================================================================

#[test]
fn error_kind_as_str_matches_serde() {
    for kind in [
        ErrorKind::UnknownTool,
        ErrorKind::UnknownCommand,
        ErrorKind::InvalidArgs,
        ErrorKind::ToolUnavailable,
        ErrorKind::RateLimited,
        ErrorKind::Timeout,
        ErrorKind::ToolInternalError,
        ErrorKind::LmTimeout,
        ErrorKind::LmMalformed,
        ErrorKind::BufferOverflow,
    ] {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
        let back: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn config_defaults_are_sane() {
    let config = AnnaConfig::default();
    assert!(config.buffer.ceiling > 0);
    assert!(config.buffer.quota_fraction > 0.0 && config.buffer.quota_fraction < 1.0);
    assert!(config.scheduler.drain_limit > 0);
    assert!(config.scheduler.maintenance_every > 0);
    assert!(config.tools.execute_deadline_secs > 0);
    assert!(!config.scheduler.persona.is_empty());
}

#[test]
fn config_toml_roundtrip() {
    let config = AnnaConfig::default();
    let toml = config.to_toml();
    let back: AnnaConfig = toml::from_str(&toml).unwrap();
    assert_eq!(back.buffer.ceiling, config.buffer.ceiling);
    assert_eq!(back.language_model.model, config.language_model.model);
    assert_eq!(back.scheduler.drain_limit, config.scheduler.drain_limit);
}

#[test]
fn partial_config_fills_defaults() {
    let config: AnnaConfig = toml::from_str(
        r#"
        [buffer]
        ceiling = 42

        [language_model]
        model = "qwen2.5"
        "#,
    )
    .unwrap();
    assert_eq!(config.buffer.ceiling, 42);
    assert_eq!(config.language_model.model, "qwen2.5");
    // Untouched sections keep their defaults.
    assert_eq!(config.buffer.quota_fraction, BufferConfig::default().quota_fraction);
    assert_eq!(config.scheduler.drain_limit, SchedulerConfig::default().drain_limit);
}

#[test]
fn missing_config_file_uses_defaults() {
    let config = AnnaConfig::load(std::path::Path::new("/nonexistent/anna.toml"));
    assert_eq!(config.buffer.ceiling, BufferConfig::default().ceiling);
}
