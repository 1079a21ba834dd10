//! The thought model — the unit flowing through Anna's inbox

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Opaque metadata attached to a thought (platform IDs, entity refs, urgency hints).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Thought identifier - cheaply copyable
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ThoughtId(Uuid);

impl ThoughtId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThoughtId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThoughtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority ordinal. Declared low-to-high so the derived `Ord` ranks
/// `Critical` above everything else.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Background,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric rank used by age-based decay scoring.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Background => 0,
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }

    /// Parse a priority override supplied by a producer. Unknown names fall
    /// back to `None` so the source default applies.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "background" => Some(Priority::Background),
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Background => "background",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Where a thought came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtSource {
    UserInput,
    PlatformChat,
    VisionResult,
    ToolResult,
    Reminder,
    InternalReflection,
    ContextLoop,
    SystemNotice,
}

impl ThoughtSource {
    /// Default priority table. Vision results are refined by
    /// [`ThoughtSource::classify`] using the urgency metadata hint.
    pub fn default_priority(&self) -> Priority {
        match self {
            ThoughtSource::UserInput => Priority::High,
            ThoughtSource::Reminder => Priority::High,
            ThoughtSource::VisionResult => Priority::Medium,
            ThoughtSource::ToolResult => Priority::Medium,
            ThoughtSource::PlatformChat => Priority::Medium,
            ThoughtSource::ContextLoop => Priority::Low,
            ThoughtSource::InternalReflection => Priority::Low,
            ThoughtSource::SystemNotice => Priority::Background,
        }
    }

    /// Resolve the effective priority for a new thought: an explicit
    /// override wins, then the urgency hint (vision only), then the table.
    pub fn classify(&self, metadata: Option<&Metadata>, over: Option<Priority>) -> Priority {
        if let Some(p) = over {
            return p;
        }
        if let ThoughtSource::VisionResult = self {
            let urgency = metadata
                .and_then(|m| m.get("urgency"))
                .and_then(|v| v.as_i64());
            if let Some(u) = urgency {
                return if u >= 7 { Priority::High } else { Priority::Medium };
            }
        }
        self.default_priority()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtSource::UserInput => "user_input",
            ThoughtSource::PlatformChat => "platform_chat",
            ThoughtSource::VisionResult => "vision_result",
            ThoughtSource::ToolResult => "tool_result",
            ThoughtSource::Reminder => "reminder",
            ThoughtSource::InternalReflection => "internal_reflection",
            ThoughtSource::ContextLoop => "context_loop",
            ThoughtSource::SystemNotice => "system_notice",
        }
    }
}

impl std::fmt::Display for ThoughtSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit in the thought stream. Ownership passes to the buffer on enqueue;
/// the `seq` field is assigned there and makes insertion order total.
#[derive(Clone, Debug)]
pub struct Thought {
    pub id: ThoughtId,
    pub content: String,
    pub source: ThoughtSource,
    pub priority: Priority,
    pub inserted_at: Instant,
    pub seq: u64,
    pub origin_tag: Option<String>,
    pub metadata: Metadata,
    pub consumed: bool,
}

impl Thought {
    pub fn age_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.inserted_at).as_secs_f64()
    }

    /// Content normalized for duplicate comparison: trimmed, inner
    /// whitespace runs collapsed to a single space.
    pub fn normalized_content(content: &str) -> String {
        content.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
