//! LanguageModel trait and decoding parameters

use anna_core::LmConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type LmResult<T> = Result<T, LmError>;

#[derive(Debug, thiserror::Error)]
pub enum LmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("model server unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Fixed decoding parameters for one generation call.
#[derive(Clone, Debug)]
pub struct GenerateParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            stop: Vec::new(),
        }
    }
}

impl From<&LmConfig> for GenerateParams {
    fn from(config: &LmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
        }
    }
}

/// The language model seen by the cognitive scheduler.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a completion under a wall-clock deadline. On deadline the
    /// in-flight request is dropped and `DeadlineExceeded` is returned; on
    /// `cancel` the call resolves to `Cancelled`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> LmResult<String>;
}
