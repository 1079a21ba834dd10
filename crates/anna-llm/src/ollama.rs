//! Ollama client with NDJSON streaming

use crate::model::{GenerateParams, LanguageModel, LmError, LmResult};
use anna_core::LmConfig;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &LmConfig) -> Self {
        Self::new(config.base_url.clone(), config.model.clone())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Startup reachability probe. Does not require any model to be loaded.
    pub async fn ping(&self, deadline: Duration) -> LmResult<()> {
        let url = format!("{}/api/tags", self.base_url);
        let request = self.client.get(&url).timeout(deadline).send();
        match tokio::time::timeout(deadline, request).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(LmError::RequestFailed(format!(
                "{} from {}",
                response.status(),
                url
            ))),
            Ok(Err(e)) => Err(LmError::Unavailable(e.to_string())),
            Err(_) => Err(LmError::DeadlineExceeded(deadline)),
        }
    }

    async fn generate_inner(
        &self,
        prompt: &str,
        params: &GenerateParams,
        cancel: CancellationToken,
    ) -> LmResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
                "stop": params.stop,
            },
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "sending generate request");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                // Connection failures surface as Unavailable so the
                // scheduler can degrade instead of retrying blindly.
                if e.is_connect() || e.is_timeout() {
                    LmError::Unavailable(e.to_string())
                } else {
                    LmError::NetworkError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, body = %text, "model server error");
            return Err(LmError::RequestFailed(format!("{}: {}", status, text)));
        }

        let mut byte_stream = response.bytes_stream();
        let mut line_buf = String::new();
        let mut text = String::new();

        loop {
            let chunk = tokio::select! {
                chunk = byte_stream.next() => chunk,
                _ = cancel.cancelled() => return Err(LmError::Cancelled),
            };
            let chunk = match chunk {
                Some(Ok(c)) => c,
                Some(Err(e)) => return Err(LmError::RequestFailed(e.to_string())),
                None => break,
            };

            line_buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline) = line_buf.find('\n') {
                let line = line_buf[..newline].trim().to_string();
                line_buf.drain(..=newline);
                if line.is_empty() {
                    continue;
                }
                match parse_chunk(&line)? {
                    ChunkBody::Delta(delta) => text.push_str(&delta),
                    ChunkBody::Done => return Ok(text),
                }
            }
        }

        // Stream closed without a done marker — keep what arrived.
        let tail = line_buf.trim();
        if !tail.is_empty() {
            if let ChunkBody::Delta(delta) = parse_chunk(tail)? {
                text.push_str(&delta);
            }
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> LmResult<String> {
        // Cancellation drops the whole request, connection included.
        tokio::select! {
            result = tokio::time::timeout(
                deadline,
                self.generate_inner(prompt, params, cancel.clone()),
            ) => match result {
                Ok(result) => result,
                Err(_) => Err(LmError::DeadlineExceeded(deadline)),
            },
            _ = cancel.cancelled() => Err(LmError::Cancelled),
        }
    }
}

#[derive(Debug)]
enum ChunkBody {
    Delta(String),
    Done,
}

/// Parse one NDJSON line from `/api/generate`. Each line is a JSON object;
/// the final one carries `done: true`.
fn parse_chunk(line: &str) -> LmResult<ChunkBody> {
    let chunk: StreamChunk = serde_json::from_str(line)
        .map_err(|e| LmError::InvalidResponse(format!("{}: {}", e, line)))?;
    if let Some(message) = chunk.error {
        return Err(LmError::RequestFailed(message));
    }
    if chunk.done {
        return Ok(ChunkBody::Done);
    }
    Ok(ChunkBody::Delta(chunk.response.unwrap_or_default()))
}

// Ollama streaming chunk types (private — deserialization only)

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk_delta() {
        let body = parse_chunk(r#"{"response":"hel","done":false}"#).unwrap();
        assert!(matches!(body, ChunkBody::Delta(ref s) if s == "hel"));
    }

    #[test]
    fn parse_chunk_done_discards_trailing_stats() {
        let body =
            parse_chunk(r#"{"response":"","done":true,"done_reason":"stop","eval_count":12}"#)
                .unwrap();
        assert!(matches!(body, ChunkBody::Done));
    }

    #[test]
    fn parse_chunk_error_field_is_a_failure() {
        let err = parse_chunk(r#"{"error":"model not found"}"#).unwrap_err();
        assert!(matches!(err, LmError::RequestFailed(ref m) if m == "model not found"));
    }

    #[test]
    fn parse_chunk_rejects_non_json() {
        assert!(parse_chunk("not json").is_err());
    }
}
