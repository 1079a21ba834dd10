//! Tests for anna-memory: adapters and wire types

use anna_core::MemoryConfig;
use anna_memory::{HttpMemory, MemoryAdapter, NullMemory, Snippet};

#[tokio::test]
async fn null_memory_always_returns_empty() {
    let memory = NullMemory;
    let snippets = memory.retrieve("anything at all", 8).await.unwrap();
    assert!(snippets.is_empty());
}

#[test]
fn snippet_serde_roundtrip() {
    let snippet = Snippet {
        text: "the stream started at noon".to_string(),
        score: Some(0.87),
    };
    let json = serde_json::to_string(&snippet).unwrap();
    let back: Snippet = serde_json::from_str(&json).unwrap();
    assert_eq!(back.text, snippet.text);
    assert_eq!(back.score, snippet.score);
}

#[test]
fn snippet_score_is_optional_on_the_wire() {
    let snippet: Snippet = serde_json::from_str(r#"{"text": "bare"}"#).unwrap();
    assert_eq!(snippet.text, "bare");
    assert!(snippet.score.is_none());

    let json = serde_json::to_string(&Snippet::new("no score")).unwrap();
    assert!(!json.contains("score"));
}

#[test]
fn config_without_endpoint_builds_null_adapter() {
    // Can't downcast a trait object, but a null adapter is observable:
    // it never fails and never returns anything.
    let adapter = HttpMemory::from_config(&MemoryConfig {
        endpoint: None,
        snippets: 4,
    });
    let snippets = futures_executor(adapter.retrieve("q", 4));
    assert!(snippets.unwrap().is_empty());
}

#[tokio::test]
async fn http_adapter_surfaces_connection_failures() {
    let memory = HttpMemory::new("http://127.0.0.1:9/retrieve");
    assert!(memory.retrieve("query", 4).await.is_err());
}

/// Tiny helper: run a future to completion on a throwaway runtime.
fn futures_executor<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}
