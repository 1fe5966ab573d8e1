//! HTTP client for a local Ollama-shaped runtime (`/api/generate`, `/api/tags`).

use crate::{GenerateRequest, LlmClient};
use async_trait::async_trait;
use finsight_core::{HealthCheck, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Serialize)]
struct GenerateApiRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateApiOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateApiOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateApiResponse {
    response: String,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    #[allow(dead_code)]
    name: String,
}

/// Client for a locally hosted Ollama-compatible runtime. Concurrency is
/// bounded by a semaphore (default permit count 1) rather than any
/// client-side retry — a failed or timed-out call is surfaced to the
/// caller as-is.
pub struct LocalRuntimeClient {
    client: Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    last_request_started: Arc<AtomicU64>,
    min_interval: Duration,
    start: Instant,
}

impl LocalRuntimeClient {
    /// * `base_url` - e.g. `http://localhost:11434`
    /// * `max_concurrency` - permits in the bounding semaphore (default 1,
    ///   single reasoning model serialized across agents)
    pub fn new(base_url: impl Into<String>, max_concurrency: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            last_request_started: Arc::new(AtomicU64::new(0)),
            min_interval: Duration::from_millis(0),
            start: Instant::now(),
        }
    }

    /// Same as [`LocalRuntimeClient::new`] but also enforces a minimum
    /// spacing between request starts, useful when the runtime itself has
    /// no internal queue and back-to-back calls would starve it.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    async fn throttle(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let now_ms = self.start.elapsed().as_millis() as u64;
        let last_ms = self.last_request_started.load(Ordering::Relaxed);
        let elapsed_ms = now_ms.saturating_sub(last_ms);
        let min_ms = self.min_interval.as_millis() as u64;
        if elapsed_ms < min_ms {
            tokio::time::sleep(Duration::from_millis(min_ms - elapsed_ms)).await;
        }
        self.last_request_started
            .store(self.start.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    async fn do_generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let body = GenerateApiRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system_prompt.clone(),
            stream: false,
            options: GenerateApiOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                reason: format!("failed to reach local runtime: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::RequestFailed {
                reason: format!("local runtime returned {status}: {text}"),
            });
        }

        let parsed: GenerateApiResponse =
            response.json().await.map_err(|e| LlmError::UnparseablePayload {
                reason: e.to_string(),
            })?;

        // The runtime may surface reasoning and final text as separate
        // fields; the client folds them into one opaque string and leaves
        // interpretation to the caller.
        Ok(match parsed.thinking {
            Some(thinking) if request.think && !thinking.is_empty() => {
                format!("{thinking}\n\n{}", parsed.response)
            }
            _ => parsed.response,
        })
    }
}

#[async_trait]
impl LlmClient for LocalRuntimeClient {
    async fn generate(&self, request: GenerateRequest, timeout: Duration) -> Result<String, LlmError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");
        self.throttle().await;

        match tokio::time::timeout(timeout, self.do_generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                timeout_seconds: timeout.as_secs(),
            }),
        }
    }

    async fn health_check(&self) -> HealthCheck {
        let start = Instant::now();
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<TagsResponse>().await {
                    Ok(_) => HealthCheck::healthy("local_llm_runtime")
                        .with_latency(start.elapsed().as_millis() as u64),
                    Err(e) => HealthCheck::unhealthy(
                        "local_llm_runtime",
                        format!("malformed /api/tags response: {e}"),
                    ),
                }
            }
            Ok(response) => HealthCheck::unhealthy(
                "local_llm_runtime",
                format!("runtime returned {}", response.status()),
            ),
            Err(e) => HealthCheck::unhealthy("local_llm_runtime", format!("unreachable: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_min_interval_is_zero_by_default() {
        let client = LocalRuntimeClient::new("http://localhost:11434", 1);
        assert!(client.min_interval.is_zero());
    }
}
