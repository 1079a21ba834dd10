//! Anna configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnaConfig {
    /// Thought buffer sizing and decay.
    pub buffer: BufferConfig,
    /// Thinking-loop cadence and budgets.
    pub scheduler: SchedulerConfig,
    /// Language model endpoint and decoding parameters.
    pub language_model: LmConfig,
    /// Memory retrieval adapter.
    pub memory: MemoryConfig,
    /// Tool discovery and dispatch.
    pub tools: ToolsConfig,
    /// Optional personality file prepended to every context window.
    pub persona_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Max unconsumed thoughts held at once.
    pub ceiling: usize,
    /// Window within which identical thoughts collapse (seconds).
    pub dedup_window_secs: f64,
    /// Max share of the ceiling one (source, origin_tag) pair may occupy.
    pub quota_fraction: f64,
    /// Decay rate: priority ranks lost per second of age.
    pub decay_alpha: f64,
    /// How long consumed thoughts stay available for replay (seconds).
    pub replay_window_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Max thoughts drained per cycle.
    pub drain_limit: usize,
    /// Idle tick between cycles when nothing urgent is queued (seconds).
    pub idle_tick_secs: f64,
    /// Idle tick while the buffer is under sustained pressure (seconds).
    pub pressured_tick_secs: f64,
    /// A maintenance cycle runs every this many cycles.
    pub maintenance_every: u64,
    /// Wall-clock deadline for each language model call (seconds).
    pub lm_deadline_secs: u64,
    /// Token budget for an assembled context window.
    pub token_budget: usize,
    /// Buffer fill ratio that counts as pressure.
    pub backpressure_fill: f64,
    /// How long fill must stay high before backpressure engages (seconds).
    pub backpressure_window_secs: f64,
    /// Backoff applied after an unresponsive cycle (seconds).
    pub unresponsive_backoff_secs: f64,
    /// Fallback system prompt when no persona file is configured.
    pub persona: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Base URL of the model server.
    pub base_url: String,
    /// Model name passed through to the server.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    /// How long startup waits for the model server before giving up (seconds).
    pub startup_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Retrieval sidecar endpoint. `None` disables retrieval.
    pub endpoint: Option<String>,
    /// Snippets requested per cycle.
    pub snippets: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory scanned for tool descriptors. `None` = builtin set only.
    pub install_dir: Option<PathBuf>,
    /// Root for tool-owned data files.
    pub data_dir: Option<PathBuf>,
    /// Default deadline for a dispatched tool command (seconds).
    pub execute_deadline_secs: u64,
    /// How long a tool's full instructions stay in context after use (seconds).
    pub instruction_ttl_secs: u64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for AnnaConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            scheduler: SchedulerConfig::default(),
            language_model: LmConfig::default(),
            memory: MemoryConfig::default(),
            tools: ToolsConfig::default(),
            persona_file: None,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            ceiling: 300,
            dedup_window_secs: 5.0,
            quota_fraction: 0.4,
            decay_alpha: 0.01,
            replay_window_secs: 120.0,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            drain_limit: 8,
            idle_tick_secs: 3.0,
            pressured_tick_secs: 1.0,
            maintenance_every: 25,
            lm_deadline_secs: 60,
            token_budget: 8192,
            backpressure_fill: 0.8,
            backpressure_window_secs: 10.0,
            unresponsive_backoff_secs: 2.0,
            persona: "You are Anna, an autonomous conversational agent. \
                      Be concise, warm, and honest about what you can and cannot do."
                .to_string(),
        }
    }
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            stop: Vec::new(),
            startup_grace_secs: 10,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            snippets: 4,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            data_dir: None,
            execute_deadline_secs: 30,
            instruction_ttl_secs: 300,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl AnnaConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
