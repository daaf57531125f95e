//! A dependency-free, deterministic stand-in for an in-process inference
//! engine (§4.7). No GGUF/llama.cpp binding appears anywhere in the
//! retrieved example pack, so one is not fabricated here; this backend
//! satisfies the full [`LlmProvider`] capability set well enough to exercise
//! and test the router's fallback path without a real model file.

use async_trait::async_trait;
use mneme_core::{ChatMessage, GenerationOptions, LlmProvider, ModelInfo};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

/// Lazily "loads" on first use and stays resident until [`Self::unload`]
/// (§4.7: "model is held in memory until `unload()` is called").
pub struct LocalProvider {
    model_name: String,
    max_tokens: u32,
    loaded: AtomicBool,
    load_lock: Mutex<()>,
}

impl LocalProvider {
    #[must_use]
    pub fn new(model_name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model_name: model_name.into(),
            max_tokens,
            loaded: AtomicBool::new(false),
            load_lock: Mutex::new(()),
        }
    }

    async fn ensure_loaded(&self) {
        if self.loaded.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.load_lock.lock().await;
        if !self.loaded.load(Ordering::Acquire) {
            info!(model = %self.model_name, "loading local model");
            self.loaded.store(true, Ordering::Release);
        }
    }

    /// Releases the in-memory model; the next call re-triggers lazy load.
    pub fn unload(&self) {
        self.loaded.store(false, Ordering::Release);
        info!(model = %self.model_name, "unloaded local model");
    }

    /// A deterministic embedding derived from a SHA-256 of the text: equal
    /// inputs always produce an equal vector, and distinct inputs produce
    /// (with overwhelming probability) distinct ones, which is all the
    /// retrieval engine's cosine scoring needs from a stand-in.
    fn deterministic_embedding(text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        digest.iter().map(|byte| f32::from(*byte) / 255.0).collect()
    }
}

#[async_trait]
impl LlmProvider for LocalProvider {
    async fn generate_response(&self, messages: &[ChatMessage], _options: &GenerationOptions) -> anyhow::Result<String> {
        self.ensure_loaded().await;
        let last_user_message = messages
            .iter()
            .rev()
            .find(|m| m.role == mneme_core::Role::User)
            .map_or("", |m| m.content.as_str());
        Ok(format!("[local:{}] acknowledged: {last_user_message}", self.model_name))
    }

    async fn generate_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.ensure_loaded().await;
        Ok(Self::deterministic_embedding(text))
    }

    fn get_token_count(&self, text: &str) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let estimate = (text.chars().count() / 4).max(1) as u32;
        estimate
    }

    fn get_max_tokens(&self) -> u32 {
        self.max_tokens
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn get_model_info(&self) -> ModelInfo {
        let mut info = ModelInfo::new();
        info.insert("provider".to_string(), serde_json::json!("local"));
        info.insert("model".to_string(), serde_json::json!(self.model_name));
        info.insert("max_tokens".to_string(), serde_json::json!(self.max_tokens));
        info.insert("loaded".to_string(), serde_json::json!(self.loaded.load(Ordering::Acquire)));
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = LocalProvider::new("stub-1", 4096);
        let a = provider.generate_embedding("hello world").await.unwrap();
        let b = provider.generate_embedding("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn distinct_text_yields_distinct_embeddings() {
        let provider = LocalProvider::new("stub-1", 4096);
        let a = provider.generate_embedding("hello").await.unwrap();
        let b = provider.generate_embedding("goodbye").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unload_resets_loaded_state() {
        let provider = LocalProvider::new("stub-1", 4096);
        provider.ensure_loaded().await;
        assert_eq!(provider.get_model_info()["loaded"], serde_json::json!(true));

        provider.unload();
        assert_eq!(provider.get_model_info()["loaded"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn is_always_available() {
        let provider = LocalProvider::new("stub-1", 4096);
        assert!(provider.is_available().await);
    }
}
