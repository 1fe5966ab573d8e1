//! Configuration types.
//!
//! An explicit struct with a `default_*` constructor that centralizes
//! sane defaults, loadable from TOML via `serde`.

use serde::{Deserialize, Serialize};

/// Retry policy for the Orchestrator's single unfiltered-retrieval
/// retry. The LLM client itself never retries internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// LLM subsystem configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub reasoning_model_id: String,
    pub router_model_id: String,
    pub max_concurrency: usize,
    pub thinking_timeout_seconds: u64,
    pub chat_timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            reasoning_model_id: "qwen2.5:14b".to_string(),
            router_model_id: "qwen2.5:1.5b".to_string(),
            max_concurrency: 1,
            thinking_timeout_seconds: 120,
            chat_timeout_seconds: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Session cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

/// Semantic store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub embedding_dim: usize,
    pub retrieval_k: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            retrieval_k: 10,
        }
    }
}

/// Master configuration struct for the analysis core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinsightConfig {
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    /// Hard wall-clock timeout for a full `GenerateInsights` run
    /// (default 30 minutes for the 12-agent case).
    pub insights_run_timeout_seconds: u64,
    /// Router confidence floor below which the conservative default agent
    /// is used. Defaults to 0.5; see DESIGN.md for the rationale.
    pub router_confidence_floor: f32,
}

impl Default for FinsightConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            insights_run_timeout_seconds: 30 * 60,
            router_confidence_floor: 0.5,
        }
    }
}

impl FinsightConfig {
    /// Parse configuration from a TOML document, falling back to defaults
    /// for any field the caller omits.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = FinsightConfig::default();
        assert_eq!(cfg.llm.max_concurrency, 1);
        assert_eq!(cfg.llm.thinking_timeout_seconds, 120);
        assert_eq!(cfg.llm.chat_timeout_seconds, 30);
        assert_eq!(cfg.cache.ttl_hours, 24);
        assert_eq!(cfg.store.embedding_dim, 384);
        assert_eq!(cfg.store.retrieval_k, 10);
    }

    #[test]
    fn full_round_trip_through_toml_is_lossless() {
        let cfg = FinsightConfig::default();
        let toml = cfg.to_toml_string().unwrap();
        let parsed = FinsightConfig::from_toml_str(&toml).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn every_field_is_optional_and_falls_back_to_its_default() {
        let cfg = FinsightConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, FinsightConfig::default());

        let cfg = FinsightConfig::from_toml_str("router_confidence_floor = 0.75").unwrap();
        assert_eq!(cfg.router_confidence_floor, 0.75);
        assert_eq!(cfg.llm, LlmConfig::default());
    }

    #[test]
    fn a_partially_specified_section_fills_the_rest_from_its_own_defaults() {
        let cfg = FinsightConfig::from_toml_str("[llm]\nmax_concurrency = 4\n").unwrap();
        assert_eq!(cfg.llm.max_concurrency, 4);
        assert_eq!(cfg.llm.reasoning_model_id, LlmConfig::default().reasoning_model_id);
        assert_eq!(cfg.llm.retry, RetryConfig::default());
    }
}
