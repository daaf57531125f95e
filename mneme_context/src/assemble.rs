//! The context assembler's five assembly modes (§4.6).

use crate::item::{format_memory_items, ContextMemoryItem};
use crate::personality::{build_system_prompt, PersonalitySettings};
use crate::templates::{wrap_combined_memories, wrap_document_context, wrap_memory_context, wrap_web_context};
use crate::token::{TokenBudget, TokenCounter};
use crate::truncate::truncate_to_token_limit;
use mneme_core::{ChatMessage, Role};
use mneme_events::{Event, EventBus};
use std::sync::Arc;
use tracing::instrument;

pub const EVENT_CONTEXT_BUILT: &str = "context:built";
pub const EVENT_CONTEXT_DOCUMENT_BUILT: &str = "context:document_built";
pub const EVENT_CONTEXT_WEB_BUILT: &str = "context:web_built";
pub const EVENT_CONTEXT_HISTORY_BUILT: &str = "context:history_built";
pub const EVENT_CONTEXT_COMBINED_BUILT: &str = "context:combined_built";

/// A `{system_prompt, messages[]}` pair ready for the LLM router (§4.6).
/// `messages` already begins with the system message built from
/// `system_prompt`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// Combined-mode source ratios, renormalized over whichever sources are
/// actually present for a given call (§4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedRatios {
    pub memory: f64,
    pub document: f64,
    pub web: f64,
    pub history: f64,
}

impl Default for CombinedRatios {
    fn default() -> Self {
        Self { memory: 0.3, document: 0.3, web: 0.2, history: 0.2 }
    }
}

/// The inputs a combined-mode assembly may include; every field is
/// optional, and an absent source contributes no budget share and is
/// dropped from the renormalization (§4.6).
#[derive(Debug, Clone, Default)]
pub struct CombinedSources<'a> {
    pub memory_items: Option<&'a [ContextMemoryItem]>,
    pub document_content: Option<&'a str>,
    pub web_content: Option<&'a str>,
    pub history: Option<&'a [ChatMessage]>,
}

/// Builds `{system_prompt, messages[]}` pairs for the five assembly modes
/// (§4.6). Cheaply `Clone`-able; the only shared state is the optional
/// event bus handle.
#[derive(Clone, Default)]
pub struct ContextAssembler {
    budget: TokenBudget,
    ratios: CombinedRatios,
    events: Option<Arc<EventBus>>,
}

impl ContextAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_budget(mut self, budget: TokenBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub const fn with_ratios(mut self, ratios: CombinedRatios) -> Self {
        self.ratios = ratios;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn build_messages(system_prompt: &str, history: &[ChatMessage], user_message: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(Role::System, system_prompt));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::new(Role::User, user_message));
        messages
    }

    /// Mode 1: fill `available_for_context` with formatted memory items,
    /// truncating from the tail (§4.6).
    #[instrument(skip(self, user_message, memory_items, personality, counter))]
    pub async fn assemble_memory_only(
        &self,
        user_message: &str,
        memory_items: &[ContextMemoryItem],
        personality: PersonalitySettings,
        model_max_tokens: u32,
        counter: &dyn TokenCounter,
    ) -> AssembledPrompt {
        let available = self.budget.available_for_context(model_max_tokens);
        let memory_text = format_memory_items(memory_items);
        let context_text = if memory_text.is_empty() {
            String::new()
        } else {
            truncate_to_token_limit(&wrap_memory_context(&memory_text), available, counter)
        };

        let system_prompt = build_system_prompt(personality, (!context_text.is_empty()).then_some(context_text.as_str()));
        let messages = Self::build_messages(&system_prompt, &[], user_message);

        self.emit(
            EVENT_CONTEXT_BUILT,
            serde_json::json!({
                "memory_items_count": memory_items.len(),
                "context_tokens": counter.count(&context_text),
                "system_prompt_tokens": counter.count(&system_prompt),
                "total_tokens": counter.count(&joined(&messages)),
            }),
        )
        .await;

        AssembledPrompt { system_prompt, messages }
    }

    /// Mode 2: truncate document content to fit, wrapped with a
    /// "here is a document" preamble (§4.6).
    #[instrument(skip(self, user_message, document_content, personality, counter))]
    pub async fn assemble_document(
        &self,
        user_message: &str,
        document_content: &str,
        personality: PersonalitySettings,
        model_max_tokens: u32,
        counter: &dyn TokenCounter,
    ) -> AssembledPrompt {
        let available = self.budget.available_for_context(model_max_tokens);
        let truncated = truncate_to_token_limit(document_content, available, counter);
        let context_text = wrap_document_context(&truncated);

        let system_prompt = build_system_prompt(personality, Some(context_text.as_str()));
        let messages = Self::build_messages(&system_prompt, &[], user_message);

        self.emit(
            EVENT_CONTEXT_DOCUMENT_BUILT,
            serde_json::json!({
                "document_content_length": document_content.chars().count(),
                "truncated_content_length": truncated.chars().count(),
                "context_tokens": counter.count(&context_text),
                "system_prompt_tokens": counter.count(&system_prompt),
                "total_tokens": counter.count(&joined(&messages)),
            }),
        )
        .await;

        AssembledPrompt { system_prompt, messages }
    }

    /// Mode 3: analogous to [`Self::assemble_document`] with a web preamble
    /// (§4.6).
    #[instrument(skip(self, user_message, web_content, personality, counter))]
    pub async fn assemble_web(
        &self,
        user_message: &str,
        web_content: &str,
        personality: PersonalitySettings,
        model_max_tokens: u32,
        counter: &dyn TokenCounter,
    ) -> AssembledPrompt {
        let available = self.budget.available_for_context(model_max_tokens);
        let truncated = truncate_to_token_limit(web_content, available, counter);
        let context_text = wrap_web_context(&truncated);

        let system_prompt = build_system_prompt(personality, Some(context_text.as_str()));
        let messages = Self::build_messages(&system_prompt, &[], user_message);

        self.emit(
            EVENT_CONTEXT_WEB_BUILT,
            serde_json::json!({
                "web_content_length": web_content.chars().count(),
                "truncated_content_length": truncated.chars().count(),
                "context_tokens": counter.count(&context_text),
                "system_prompt_tokens": counter.count(&system_prompt),
                "total_tokens": counter.count(&joined(&messages)),
            }),
        )
        .await;

        AssembledPrompt { system_prompt, messages }
    }

    /// Mode 4: select the most recent messages that fit, preserving
    /// chronological order (§4.6).
    #[instrument(skip(self, user_message, history, personality, counter))]
    pub async fn assemble_history(
        &self,
        user_message: &str,
        history: &[ChatMessage],
        personality: PersonalitySettings,
        model_max_tokens: u32,
        counter: &dyn TokenCounter,
    ) -> AssembledPrompt {
        let available = self.budget.available_for_context(model_max_tokens);
        let system_prompt = build_system_prompt(personality, None);
        let included = select_recent_within_budget(history, available, counter);
        let messages = Self::build_messages(&system_prompt, &included, user_message);

        self.emit(
            EVENT_CONTEXT_HISTORY_BUILT,
            serde_json::json!({
                "total_history_messages": history.len(),
                "included_messages": included.len(),
                "system_prompt_tokens": counter.count(&system_prompt),
                "total_tokens": counter.count(&joined(&messages)),
            }),
        )
        .await;

        AssembledPrompt { system_prompt, messages }
    }

    /// Mode 5: partitions `available_for_context` among the sources
    /// actually present, using `self.ratios` renormalized over that subset,
    /// then fills and concatenates each sub-budget (§4.6).
    #[instrument(skip(self, user_message, sources, personality, counter))]
    pub async fn assemble_combined(
        &self,
        user_message: &str,
        sources: CombinedSources<'_>,
        personality: PersonalitySettings,
        model_max_tokens: u32,
        counter: &dyn TokenCounter,
    ) -> AssembledPrompt {
        let available = self.budget.available_for_context(model_max_tokens);

        let has_memory = sources.memory_items.is_some_and(|items| !items.is_empty());
        let has_document = sources.document_content.is_some_and(|content| !content.is_empty());
        let has_web = sources.web_content.is_some_and(|content| !content.is_empty());
        let has_history = sources.history.is_some_and(|history| !history.is_empty());

        let total_ratio = [has_memory.then_some(self.ratios.memory), has_document.then_some(self.ratios.document), has_web.then_some(self.ratios.web), has_history.then_some(self.ratios.history)]
            .into_iter()
            .flatten()
            .sum::<f64>();

        let share = |present: bool, ratio: f64| -> u32 {
            if !present || total_ratio <= 0.0 {
                return 0;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let tokens = (f64::from(available) * (ratio / total_ratio)).floor() as u32;
            tokens
        };

        let memory_tokens = share(has_memory, self.ratios.memory);
        let document_tokens = share(has_document, self.ratios.document);
        let web_tokens = share(has_web, self.ratios.web);
        let history_tokens = share(has_history, self.ratios.history);

        let mut parts = Vec::new();
        if has_memory && memory_tokens > 0 {
            let memory_text = format_memory_items(sources.memory_items.unwrap_or_default());
            if !memory_text.is_empty() {
                parts.push(truncate_to_token_limit(&wrap_combined_memories(&memory_text), memory_tokens, counter));
            }
        }
        if has_document && document_tokens > 0 {
            let truncated = truncate_to_token_limit(sources.document_content.unwrap_or_default(), document_tokens, counter);
            parts.push(wrap_document_context(&truncated));
        }
        if has_web && web_tokens > 0 {
            let truncated = truncate_to_token_limit(sources.web_content.unwrap_or_default(), web_tokens, counter);
            parts.push(wrap_web_context(&truncated));
        }

        let combined_context = parts.join("\n\n");
        let system_prompt = build_system_prompt(personality, (!combined_context.is_empty()).then_some(combined_context.as_str()));

        let included = if has_history && history_tokens > 0 {
            select_recent_within_budget(sources.history.unwrap_or_default(), history_tokens, counter)
        } else {
            Vec::new()
        };
        let messages = Self::build_messages(&system_prompt, &included, user_message);

        self.emit(
            EVENT_CONTEXT_COMBINED_BUILT,
            serde_json::json!({
                "memory_items_count": sources.memory_items.map_or(0, <[_]>::len),
                "document_content_length": sources.document_content.map_or(0, |content| content.chars().count()),
                "web_content_length": sources.web_content.map_or(0, |content| content.chars().count()),
                "total_history_messages": sources.history.map_or(0, <[_]>::len),
                "included_messages": included.len(),
                "context_tokens": counter.count(&combined_context),
                "system_prompt_tokens": counter.count(&system_prompt),
                "total_tokens": counter.count(&joined(&messages)),
            }),
        )
        .await;

        AssembledPrompt { system_prompt, messages }
    }

    async fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(events) = &self.events {
            events.publish_async(Event::new(event_type, payload)).await;
        }
    }
}

/// Works backward from the most recent message, including it while the
/// running total stays within `budget`, stopping (not skipping) at the
/// first message that would overflow it — the result preserves
/// chronological order (§4.6).
fn select_recent_within_budget(history: &[ChatMessage], budget: u32, counter: &dyn TokenCounter) -> Vec<ChatMessage> {
    let mut included: Vec<ChatMessage> = Vec::new();
    let mut total = 0u32;
    for message in history.iter().rev() {
        let tokens = counter.count(&message.content);
        if total + tokens > budget {
            break;
        }
        included.insert(0, message.clone());
        total += tokens;
    }
    included
}

fn joined(messages: &[ChatMessage]) -> String {
    messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::WordCountEstimator;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage::new(role, content)
    }

    #[tokio::test]
    async fn memory_only_assembles_system_and_user_messages() {
        let assembler = ContextAssembler::new();
        let items = vec![ContextMemoryItem::new("my dog's name is buddy")];
        let assembled = assembler
            .assemble_memory_only("what's my dog's name?", &items, PersonalitySettings::default(), 4096, &WordCountEstimator)
            .await;

        assert_eq!(assembled.messages.len(), 2);
        assert_eq!(assembled.messages[0].role, Role::System);
        assert_eq!(assembled.messages[1].role, Role::User);
        assert!(assembled.system_prompt.contains("buddy"));
    }

    #[tokio::test]
    async fn memory_only_with_no_items_has_no_context_block() {
        let assembler = ContextAssembler::new();
        let assembled = assembler.assemble_memory_only("hi", &[], PersonalitySettings::default(), 4096, &WordCountEstimator).await;
        assert!(!assembled.system_prompt.contains("relevant"));
    }

    #[tokio::test]
    async fn document_mode_wraps_and_truncates_content() {
        let assembler = ContextAssembler::new();
        let assembled = assembler
            .assemble_document("summarize this", "the document says hello", PersonalitySettings::default(), 4096, &WordCountEstimator)
            .await;
        assert!(assembled.system_prompt.contains("document says hello"));
    }

    #[tokio::test]
    async fn history_mode_includes_only_most_recent_fitting_messages_in_order() {
        let assembler = ContextAssembler::new().with_budget(TokenBudget {
            reserved_system_prompt_tokens: 0,
            reserved_user_message_tokens: 0,
            reserved_response_tokens: 0,
            context_ratio: 1.0,
        });
        let history = vec![msg(Role::User, "first message here"), msg(Role::Assistant, "second message here"), msg(Role::User, "third message here")];
        // A tiny max_tokens forces only the most recent message to fit.
        let assembled = assembler.assemble_history("new question", &history, PersonalitySettings::default(), 5, &WordCountEstimator).await;

        let history_messages: Vec<_> = assembled.messages[1..assembled.messages.len() - 1].to_vec();
        assert_eq!(history_messages.len(), 1);
        assert_eq!(history_messages[0].content, "third message here");
    }

    #[tokio::test]
    async fn combined_mode_renormalizes_ratios_over_present_sources_only() {
        let assembler = ContextAssembler::new();
        let sources = CombinedSources { memory_items: None, document_content: Some("document text here"), web_content: None, history: None };
        let assembled = assembler.assemble_combined("question", sources, PersonalitySettings::default(), 4096, &WordCountEstimator).await;
        assert!(assembled.system_prompt.contains("document text here"));
    }

    #[tokio::test]
    async fn combined_mode_with_no_sources_still_produces_a_valid_prompt() {
        let assembler = ContextAssembler::new();
        let assembled = assembler.assemble_combined("question", CombinedSources::default(), PersonalitySettings::default(), 4096, &WordCountEstimator).await;
        assert_eq!(assembled.messages.len(), 2);
    }
}
