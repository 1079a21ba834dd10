//! Memory adapter surface consumed by the scheduler
//!
//! One request shape: `retrieve(query, k)` → snippets. The store behind it
//! (vector DB, embedding model) is somebody else's problem.

use anna_core::MemoryConfig;
use serde::{Deserialize, Serialize};

pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// A retrieved context fragment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Snippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score: None,
        }
    }
}

#[async_trait::async_trait]
pub trait MemoryAdapter: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> MemoryResult<Vec<Snippet>>;
}

/// Memory-less operation: every retrieval comes back empty.
pub struct NullMemory;

#[async_trait::async_trait]
impl MemoryAdapter for NullMemory {
    async fn retrieve(&self, _query: &str, _k: usize) -> MemoryResult<Vec<Snippet>> {
        Ok(Vec::new())
    }
}

/// Retrieval sidecar speaking `POST {endpoint}` with `{query, k}`.
pub struct HttpMemory {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMemory {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Build the adapter named by config: HTTP when an endpoint is set,
    /// null otherwise.
    pub fn from_config(config: &MemoryConfig) -> Box<dyn MemoryAdapter> {
        match &config.endpoint {
            Some(endpoint) => Box::new(Self::new(endpoint.clone())),
            None => Box::new(NullMemory),
        }
    }
}

#[async_trait::async_trait]
impl MemoryAdapter for HttpMemory {
    async fn retrieve(&self, query: &str, k: usize) -> MemoryResult<Vec<Snippet>> {
        let body = RetrieveRequest { query, k };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "memory retrieval error");
            return Err(MemoryError::RetrievalFailed(format!("{}: {}", status, text)));
        }

        let parsed: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::RetrievalFailed(e.to_string()))?;
        Ok(parsed.snippets)
    }
}

// Wire types (private — serialization only)

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    snippets: Vec<Snippet>,
}
