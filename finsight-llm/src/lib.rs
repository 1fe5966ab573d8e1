//! Uniform client abstraction for a locally hosted LLM runtime.
//!
//! The client is stateless and never retries internally — retry policy
//! belongs to the orchestrator. It enforces a hard wall-clock
//! timeout per call and bounds concurrency with a semaphore, but otherwise
//! just shuttles prompts to a local runtime (Ollama-shaped HTTP API) and
//! back.

mod local;

use async_trait::async_trait;
use finsight_core::{HealthCheck, LlmError};
use std::time::Duration;

pub use local::LocalRuntimeClient;

/// A single generation request. `think` selects the model's reasoning mode:
/// when `true` the runtime is asked to return its chain of thought alongside
/// the final answer (captured separately, never serialized to callers
/// outside the agent layer — see `finsight_core::AgentResult::thinking`).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub think: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 1024,
            think: false,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_think(mut self, think: bool) -> Self {
        self.think = think;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Provider-agnostic async trait for the local LLM runtime. Implementations
/// must be cheap to clone/share (`Arc<dyn LlmClient>`) and thread-safe.
///
/// The client never splits a `think=true` response into "reasoning" and
/// "final answer" — it hands back one opaque string and the caller decides
/// where each part goes (the agent layer's two-call insights pattern is what
/// assigns meaning to separate calls, not this trait).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `request`, racing it against `timeout`.
    /// Implementations must map a timeout into `LlmError::Timeout` rather
    /// than letting the runtime's own error surface directly.
    async fn generate(&self, request: GenerateRequest, timeout: Duration) -> Result<String, LlmError>;

    /// Cheap liveness probe, used by orchestrator startup checks.
    async fn health_check(&self) -> HealthCheck;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_builder_defaults_to_no_think() {
        let req = GenerateRequest::new("qwen2.5:14b", "hello");
        assert!(!req.think);
        assert!(req.system_prompt.is_none());
    }
}
