//! Error types for Anna

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds surfaced in tool outcomes and system notices.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTool,
    UnknownCommand,
    InvalidArgs,
    ToolUnavailable,
    RateLimited,
    Timeout,
    ToolInternalError,
    LmTimeout,
    LmMalformed,
    BufferOverflow,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::UnknownCommand => "unknown_command",
            ErrorKind::InvalidArgs => "invalid_args",
            ErrorKind::ToolUnavailable => "tool_unavailable",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ToolInternalError => "tool_internal_error",
            ErrorKind::LmTimeout => "lm_timeout",
            ErrorKind::LmMalformed => "lm_malformed",
            ErrorKind::BufferOverflow => "buffer_overflow",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("empty thought content")]
    EmptyThought,

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("tool error: {name} - {message}")]
    ToolError { name: String, message: String },

    #[error("language model error: {0}")]
    LmError(String),

    #[error("startup failed: {0}")]
    StartupFailed(String),

    #[error("shutdown did not complete within the grace period")]
    ShutdownTimeout,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn tool_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    pub fn startup(message: impl Into<String>) -> Self {
        Self::StartupFailed(message.into())
    }
}
