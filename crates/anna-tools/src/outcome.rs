//! Structured tool outcomes
//!
//! Every dispatch returns one of these — tool faults become values here,
//! never errors propagating into the scheduler.

use anna_core::{ErrorKind, Metadata};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    /// Human/LM-readable summary; becomes the body of the re-injected
    /// `tool_result` thought.
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Short actionable hint shown to the LM on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            metadata: Metadata::new(),
            guidance: None,
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, content: impl Into<String>) -> Self {
        Self {
            success: false,
            content: content.into(),
            metadata: Metadata::new(),
            guidance: None,
            error_kind: Some(kind),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.error_kind == Some(ErrorKind::Timeout)
    }
}
