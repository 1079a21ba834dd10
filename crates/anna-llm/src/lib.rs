//! Language model surface consumed by the scheduler
//!
//! One request shape: `generate(prompt, params, deadline)` → text.
//! Streaming happens inside the client as an optimization; callers only
//! ever see the final string.

mod model;
mod ollama;

pub use model::{GenerateParams, LanguageModel, LmError, LmResult};
pub use ollama::OllamaClient;
