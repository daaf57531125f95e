use crate::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form, provider-reported model metadata (name, context window, ...).
pub type ModelInfo = HashMap<String, serde_json::Value>;

/// Cumulative token/call accounting exposed by `get_usage_statistics` (§4.7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
}

/// The uniform capability set every LLM backend (remote or local) must
/// implement (§4.7). The router holds two such handles and never cares which
/// concrete kind it is talking to.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> anyhow::Result<String>;

    async fn generate_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn get_token_count(&self, text: &str) -> u32;

    fn get_max_tokens(&self) -> u32;

    async fn is_available(&self) -> bool;

    fn get_model_info(&self) -> ModelInfo;
}

/// Per-call generation knobs. Kept deliberately small; providers that accept
/// more knobs than this read them from their own config at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}
