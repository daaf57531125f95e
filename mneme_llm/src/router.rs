//! `LlmRouter`: wraps a primary and optional fallback [`LlmProvider`],
//! implementing §4.7's routing policy — try primary, fall through to
//! fallback on anything that isn't a surfaced "other status" error, and
//! degrade to a stable placeholder (never a panic or propagated error) if
//! both fail.

use crate::error::LlmError;
use crate::retry::retry_with_backoff;
use mneme_core::{ChatMessage, CoreError, GenerationOptions, LlmProvider, ModelInfo, UsageStats};
use mneme_events::{Event, EventBus};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Emitted on the event bus when both the primary and fallback backend fail
/// a call (§4.7, §6's event taxonomy).
pub const EVENT_LLM_ERROR: &str = "llm:error";

const FALLBACK_RESPONSE: &str = "I'm unable to generate a response right now.";

/// Exponential-backoff delays (seconds) between attempts against a single
/// backend before falling through to the fallback: 2 delays plus
/// `FINAL_RETRIES` gives 3 total attempts, matching §4.7's "retried with
/// exponential backoff up to 3 attempts."
const BASE_DELAYS: [u64; 2] = [2, 4];
const FINAL_RETRIES: usize = 1;

#[derive(Default)]
struct AtomicUsageStats {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
}

impl AtomicUsageStats {
    fn record_success(&self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt_tokens + completion_tokens, Ordering::Relaxed);
        self.successful_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> UsageStats {
        UsageStats {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
        }
    }
}

/// Routes LLM calls between a primary and optional fallback backend.
/// Cheaply `Clone`-able; usage counters and the event bus handle are shared.
#[derive(Clone)]
pub struct LlmRouter {
    primary: Arc<dyn LlmProvider>,
    fallback: Option<Arc<dyn LlmProvider>>,
    events: Option<Arc<EventBus>>,
    primary_usage: Arc<AtomicUsageStats>,
    fallback_usage: Arc<AtomicUsageStats>,
    retry_delays: Vec<u64>,
    retry_final_attempts: usize,
}

impl LlmRouter {
    #[must_use]
    pub fn new(primary: Arc<dyn LlmProvider>) -> Self {
        Self {
            primary,
            fallback: None,
            events: None,
            primary_usage: Arc::new(AtomicUsageStats::default()),
            fallback_usage: Arc::new(AtomicUsageStats::default()),
            retry_delays: BASE_DELAYS.to_vec(),
            retry_final_attempts: FINAL_RETRIES,
        }
    }

    /// Overrides the default `[2, 4]`s + 1-final-attempt retry schedule —
    /// production callers should leave this at the default; it exists so
    /// tests can exercise the retry path without real sleeps.
    #[must_use]
    pub fn with_retry_schedule(mut self, delays: Vec<u64>, final_attempts: usize) -> Self {
        self.retry_delays = delays;
        self.retry_final_attempts = final_attempts;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn LlmProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// §4.7 step 3: on total backend failure, returns a stable placeholder
    /// instead of propagating — the orchestrator must never crash on an LLM
    /// outage. §5: races the whole primary→fallback attempt, retries
    /// included, against `cancellation`, returning `CoreError::Cancelled` if
    /// it fires first.
    pub async fn generate_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
        cancellation: &CancellationToken,
    ) -> Result<String, CoreError> {
        if cancellation.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let outcome = tokio::select! {
            () = cancellation.cancelled() => return Err(CoreError::Cancelled),
            outcome = self.route_response(messages, options) => outcome,
        };
        Ok(match outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "llm router: both primary and fallback failed");
                self.emit_error(&e.to_string()).await;
                FALLBACK_RESPONSE.to_string()
            }
        })
    }

    /// §4.7 step 3: on total failure, returns an empty vector. See
    /// [`Self::generate_response`] for the cancellation contract.
    pub async fn generate_embedding(&self, text: &str, cancellation: &CancellationToken) -> Result<Vec<f32>, CoreError> {
        if cancellation.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let outcome = tokio::select! {
            () = cancellation.cancelled() => return Err(CoreError::Cancelled),
            outcome = self.route_embedding(text) => outcome,
        };
        Ok(match outcome {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "llm router: both primary and fallback failed to embed");
                self.emit_error(&e.to_string()).await;
                Vec::new()
            }
        })
    }

    async fn route_response(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Result<String, LlmError> {
        let prompt_tokens = u64::from(self.primary.get_token_count(&joined(messages)));
        let primary = &self.primary;
        match retry_with_backoff(|| primary.generate_response(messages, options), &self.retry_delays, self.retry_final_attempts).await {
            Ok(text) => {
                let completion_tokens = u64::from(self.primary.get_token_count(&text));
                self.primary_usage.record_success(prompt_tokens, completion_tokens);
                return Ok(text);
            }
            Err(e) => {
                self.primary_usage.record_failure();
                if !should_try_fallback(&e) {
                    return Err(LlmError::AllBackendsFailed(e.to_string()));
                }
                warn!(error = %e, "primary llm failed, trying fallback");
                self.emit_error(&e.to_string()).await;
            }
        }

        let Some(fallback) = &self.fallback else {
            return Err(LlmError::AllBackendsFailed("no fallback configured".to_string()));
        };
        let prompt_tokens = u64::from(fallback.get_token_count(&joined(messages)));
        match retry_with_backoff(|| fallback.generate_response(messages, options), &self.retry_delays, self.retry_final_attempts).await {
            Ok(text) => {
                let completion_tokens = u64::from(fallback.get_token_count(&text));
                self.fallback_usage.record_success(prompt_tokens, completion_tokens);
                Ok(text)
            }
            Err(e) => {
                self.fallback_usage.record_failure();
                Err(LlmError::AllBackendsFailed(e.to_string()))
            }
        }
    }

    async fn route_embedding(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let prompt_tokens = u64::from(self.primary.get_token_count(text));
        let primary = &self.primary;
        match retry_with_backoff(|| primary.generate_embedding(text), &self.retry_delays, self.retry_final_attempts).await {
            Ok(vector) => {
                self.primary_usage.record_success(prompt_tokens, 0);
                return Ok(vector);
            }
            Err(e) => {
                self.primary_usage.record_failure();
                if !should_try_fallback(&e) {
                    return Err(LlmError::AllBackendsFailed(e.to_string()));
                }
                warn!(error = %e, "primary embedding backend failed, trying fallback");
                self.emit_error(&e.to_string()).await;
            }
        }

        let Some(fallback) = &self.fallback else {
            return Err(LlmError::AllBackendsFailed("no fallback configured".to_string()));
        };
        let prompt_tokens = u64::from(fallback.get_token_count(text));
        match retry_with_backoff(|| fallback.generate_embedding(text), &self.retry_delays, self.retry_final_attempts).await {
            Ok(vector) => {
                self.fallback_usage.record_success(prompt_tokens, 0);
                Ok(vector)
            }
            Err(e) => {
                self.fallback_usage.record_failure();
                Err(LlmError::AllBackendsFailed(e.to_string()))
            }
        }
    }

    async fn emit_error(&self, message: &str) {
        if let Some(events) = &self.events {
            events
                .publish_async(Event::new(EVENT_LLM_ERROR, json!({ "error": message })))
                .await;
        }
    }

    pub fn get_token_count(&self, text: &str) -> u32 {
        self.primary.get_token_count(text)
    }

    pub fn get_max_tokens(&self) -> u32 {
        self.primary.get_max_tokens()
    }

    pub async fn is_available(&self) -> bool {
        if self.primary.is_available().await {
            return true;
        }
        match &self.fallback {
            Some(fallback) => fallback.is_available().await,
            None => false,
        }
    }

    #[must_use]
    pub fn get_model_info(&self) -> ModelInfo {
        self.primary.get_model_info()
    }

    /// Cumulative `{prompt_tokens, completion_tokens, total_tokens,
    /// successful_calls, failed_calls}` keyed by `"primary"`/`"fallback"`
    /// (§4.7).
    #[must_use]
    pub fn get_usage_statistics(&self) -> HashMap<String, UsageStats> {
        let mut stats = HashMap::new();
        stats.insert("primary".to_string(), self.primary_usage.snapshot());
        if self.fallback.is_some() {
            stats.insert("fallback".to_string(), self.fallback_usage.snapshot());
        }
        stats
    }
}

fn should_try_fallback(error: &anyhow::Error) -> bool {
    error.downcast_ref::<LlmError>().is_none_or(LlmError::is_retryable_at_router_level)
}

fn joined(messages: &[ChatMessage]) -> String {
    messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
}
