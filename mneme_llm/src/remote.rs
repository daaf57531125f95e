//! An HTTP-backed `LlmProvider` against an OpenAI-compatible chat-completion
//! API (§4.7: a remote model is "an HTTP client against a chat-completion
//! API", not pinned to one vendor). Retries live one layer up, in
//! `LlmRouter`: a
//! single failed attempt here surfaces as one `LlmError`, which the router
//! decides whether to retry or fall through on.

use crate::error::LlmError;
use async_trait::async_trait;
use mneme_core::{ChatMessage, GenerationOptions, LlmProvider, ModelInfo, Role};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{info, warn};

/// A remote chat/embedding backend reachable over HTTP, bearer-token
/// authenticated, OpenAI-shaped request/response bodies.
#[derive(Clone)]
pub struct RemoteProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    max_tokens: u32,
}

impl RemoteProvider {
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            max_tokens: 128_000,
        }
    }

    #[must_use]
    pub fn with_embedding_model(mut self, embedding_model: impl Into<String>) -> Self {
        self.embedding_model = embedding_model.into();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn handle_response(response: reqwest::Response) -> Result<serde_json::Value, LlmError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited(format!("status {status}")));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailure(format!("status {status}")));
        }
        if status.is_server_error() {
            return Err(LlmError::ServerError(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "remote llm returned a non-retryable error");
            return Err(LlmError::RequestFailed(format!("status {status}: {body}")));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn to_payload(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                json!({
                    "role": role_str(m.role),
                    "content": m.content,
                })
            })
            .collect()
    }

    async fn try_chat(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Result<serde_json::Value, LlmError> {
        let model = options.model.clone().unwrap_or_else(|| self.model.clone());
        let request = json!({
            "model": model,
            "messages": Self::to_payload(messages),
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Timeout(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn try_embed(&self, text: &str) -> Result<serde_json::Value, LlmError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.embedding_model,
                "input": text,
            }))
            .send()
            .await
            .map_err(|e| LlmError::Timeout(e.to_string()))?;

        Self::handle_response(response).await
    }
}

const fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[async_trait]
impl LlmProvider for RemoteProvider {
    async fn generate_response(&self, messages: &[ChatMessage], options: &GenerationOptions) -> anyhow::Result<String> {
        info!(model = %self.model, "sending chat request to remote llm");
        let response = self.try_chat(messages, options).await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()).into())
    }

    async fn generate_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let response = self.try_embed(text).await?;

        #[allow(clippy::cast_possible_truncation)]
        let embedding = response["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("missing data[0].embedding".to_string()))?
            .iter()
            .map(|v| v.as_f64().map(|x| x as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| LlmError::InvalidResponse("non-numeric embedding component".to_string()))?;

        Ok(embedding)
    }

    fn get_token_count(&self, text: &str) -> u32 {
        // Rough heuristic (~4 chars/token), matching the character-based
        // estimate `mneme_context` uses when no tokenizer is available.
        #[allow(clippy::cast_possible_truncation)]
        let estimate = (text.chars().count() / 4).max(1) as u32;
        estimate
    }

    fn get_max_tokens(&self) -> u32 {
        self.max_tokens
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn get_model_info(&self) -> ModelInfo {
        let mut info = ModelInfo::new();
        info.insert("provider".to_string(), json!("remote"));
        info.insert("model".to_string(), json!(self.model));
        info.insert("max_tokens".to_string(), json!(self.max_tokens));
        info
    }
}
