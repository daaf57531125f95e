//! The conversation orchestrator (§4.8): the one entry point that ties
//! retrieval, context assembly, LLM generation and persistence together for
//! a single turn.

use crate::error::ConversationError;
use async_trait::async_trait;
use mneme_context::{CombinedSources, ContextAssembler, ContextMemoryItem, PersonalitySettings, TokenCounter};
use mneme_core::{ChatMessage, CoreError, GenerationOptions, Id, MemoryCategory, Role};
use mneme_events::{Event, EventBus};
use mneme_llm::LlmRouter;
use mneme_memory::{MemoryService, NewMemoryItem, RetrievalFilters};
use mneme_store::{Conversation, MemoryItem as StoreMemoryItem, Message, MetadataStore, StoreError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

/// Emitted after a turn's user and assistant messages are both persisted
/// (§4.8 step 6, §6's event taxonomy).
pub const EVENT_MESSAGE_PROCESSED: &str = "message:processed";

const DEFAULT_HISTORY_LIMIT: u64 = 20;
const SUMMARY_HISTORY_LIMIT: u64 = 200;
const SUMMARY_SYSTEM_PROMPT: &str =
    "Summarize the conversation below in two or three sentences, focused on what the user would want remembered later.";

/// The generation capability the orchestrator needs from an LLM backend —
/// narrower than the full [`mneme_core::LlmProvider`] set, so tests can
/// substitute a fake without standing up a whole router.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
        cancellation: &CancellationToken,
    ) -> Result<String, CoreError>;

    fn get_token_count(&self, text: &str) -> u32;
    fn get_max_tokens(&self) -> u32;
}

#[async_trait]
impl ResponseGenerator for LlmRouter {
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
        cancellation: &CancellationToken,
    ) -> Result<String, CoreError> {
        Self::generate_response(self, messages, options, cancellation).await
    }

    fn get_token_count(&self, text: &str) -> u32 {
        Self::get_token_count(self, text)
    }

    fn get_max_tokens(&self) -> u32 {
        Self::get_max_tokens(self)
    }
}

/// The persistence surface the orchestrator needs over conversations and
/// their messages — narrower than all of [`mneme_store::MetadataStore`],
/// for the same testability reason as [`ResponseGenerator`].
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation, StoreError>;
    async fn add_message(&self, conversation_id: Id, role: Role, content: &str) -> Result<Message, StoreError>;
    async fn get_conversation_history(&self, conversation_id: Id, limit: u64, offset: u64) -> Result<Vec<Message>, StoreError>;
    async fn update_conversation_summary(&self, id: Id, summary: String) -> Result<Conversation, StoreError>;
}

#[async_trait]
impl ConversationStore for MetadataStore {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation, StoreError> {
        Self::create_conversation(self, title).await
    }

    async fn add_message(&self, conversation_id: Id, role: Role, content: &str) -> Result<Message, StoreError> {
        Self::add_message(self, conversation_id, role, content).await
    }

    async fn get_conversation_history(&self, conversation_id: Id, limit: u64, offset: u64) -> Result<Vec<Message>, StoreError> {
        Self::get_conversation_history(self, conversation_id, limit, offset).await
    }

    async fn update_conversation_summary(&self, id: Id, summary: String) -> Result<Conversation, StoreError> {
        Self::update_conversation_summary(self, id, summary).await
    }
}

/// The result of a single processed turn (§4.8 step 7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedMessage {
    pub response: String,
    pub conversation_id: Id,
}

struct RouterCounter<'a, L: ResponseGenerator>(&'a L);

impl<L: ResponseGenerator> TokenCounter for RouterCounter<'_, L> {
    fn count(&self, text: &str) -> u32 {
        self.0.get_token_count(text)
    }
}

/// Ties retrieval, context assembly, generation and persistence together
/// for one conversational turn (§4.8). Generic over the LLM-facing and
/// store-facing seams it actually calls directly; memory retrieval still
/// goes through the concrete [`MemoryService`], which already owns its own
/// metadata/vector/LLM collaborators.
#[derive(Clone)]
pub struct ConversationOrchestrator<L, S>
where
    L: ResponseGenerator,
    S: ConversationStore,
{
    llm: L,
    store: S,
    memory: MemoryService,
    context: ContextAssembler,
    events: Option<Arc<EventBus>>,
    history_limit: u64,
}

impl<L, S> ConversationOrchestrator<L, S>
where
    L: ResponseGenerator,
    S: ConversationStore,
{
    #[must_use]
    pub fn new(llm: L, store: S, memory: MemoryService, context: ContextAssembler) -> Self {
        Self {
            llm,
            store,
            memory,
            context,
            events: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub const fn with_history_limit(mut self, history_limit: u64) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// §4.8's seven-step turn: allocate-or-reuse a conversation, retrieve
    /// context scoped to it, assemble a combined-mode prompt, generate a
    /// response, persist both messages (each tagged into memory), publish
    /// [`EVENT_MESSAGE_PROCESSED`], and return the result.
    #[instrument(skip(self, user_message, personality, cancellation))]
    pub async fn process_message(
        &self,
        user_message: &str,
        conversation_id: Option<Id>,
        personality: PersonalitySettings,
        cancellation: &CancellationToken,
    ) -> Result<ProcessedMessage, ConversationError> {
        if cancellation.is_cancelled() {
            return Err(ConversationError::Cancelled);
        }
        if user_message.trim().is_empty() {
            return Err(ConversationError::Validation("user message must not be empty".to_string()));
        }

        let scoped_conversation_id = conversation_id;
        let conversation_id = match conversation_id {
            Some(id) => id,
            None => self.store.create_conversation(None).await?.id,
        };

        let filters = RetrievalFilters { conversation_id: scoped_conversation_id, ..RetrievalFilters::default() };
        let retrieval = self.memory.retrieve_context(user_message, None, filters, cancellation).await?;
        let memory_items: Vec<ContextMemoryItem> = retrieval.items.iter().map(to_context_item).collect();

        let history_rows = self.store.get_conversation_history(conversation_id, self.history_limit, 0).await?;
        let history: Vec<ChatMessage> = history_rows.iter().map(|m| ChatMessage::new(m.role, m.content.clone())).collect();

        let counter = RouterCounter(&self.llm);
        let sources = CombinedSources {
            memory_items: Some(&memory_items),
            document_content: None,
            web_content: None,
            history: Some(&history),
        };
        let assembled = self
            .context
            .assemble_combined(user_message, sources, personality, self.llm.get_max_tokens(), &counter)
            .await;

        let response = self.llm.generate_response(&assembled.messages, &GenerationOptions::default(), cancellation).await?;

        let user_row = self.store.add_message(conversation_id, Role::User, user_message).await?;
        self.tag_message_memory(conversation_id, &user_row, cancellation).await;

        let assistant_row = self.store.add_message(conversation_id, Role::Assistant, &response).await?;
        self.tag_message_memory(conversation_id, &assistant_row, cancellation).await;

        self.emit_processed(conversation_id, &user_row, &assistant_row).await;

        Ok(ProcessedMessage { response, conversation_id })
    }

    /// §4.8's other operation: folds the conversation's history into a
    /// short summary and persists it onto the conversation row.
    #[instrument(skip(self, cancellation))]
    pub async fn summarize_conversation(&self, conversation_id: Id, cancellation: &CancellationToken) -> Result<Conversation, ConversationError> {
        if cancellation.is_cancelled() {
            return Err(ConversationError::Cancelled);
        }
        let history = self.store.get_conversation_history(conversation_id, SUMMARY_HISTORY_LIMIT, 0).await?;
        if history.is_empty() {
            return Err(ConversationError::Validation("conversation has no messages to summarize".to_string()));
        }

        let transcript = history.iter().map(|m| format!("{}: {}", m.role.as_str(), m.content)).collect::<Vec<_>>().join("\n");
        let messages = [ChatMessage::new(Role::System, SUMMARY_SYSTEM_PROMPT), ChatMessage::new(Role::User, transcript)];
        let summary = self.llm.generate_response(&messages, &GenerationOptions::default(), cancellation).await?;

        Ok(self.store.update_conversation_summary(conversation_id, summary).await?)
    }

    /// Tags a persisted message into memory (§4.8 step 5). Best-effort: a
    /// tagging failure never unwinds a turn whose messages are already
    /// durably persisted, mirroring [`MemoryService::store_memory`]'s own
    /// non-atomic write philosophy.
    async fn tag_message_memory(&self, conversation_id: Id, message: &Message, cancellation: &CancellationToken) {
        let item = NewMemoryItem::new(message.content.clone(), MemoryCategory::Conversation)
            .with_source("message", message.id.to_string())
            .with_metadata(serde_json::json!({
                "conversation_id": conversation_id,
                "role": message.role.as_str(),
            }));
        if let Err(e) = self.memory.store_memory(item, cancellation).await {
            warn!(error = %e, message_id = %message.id, "failed to tag conversation message as memory");
        }
    }

    async fn emit_processed(&self, conversation_id: Id, user_message: &Message, assistant_message: &Message) {
        if let Some(events) = &self.events {
            events
                .publish_async(Event::new(
                    EVENT_MESSAGE_PROCESSED,
                    serde_json::json!({
                        "conversation_id": conversation_id,
                        "user_message_id": user_message.id,
                        "assistant_message_id": assistant_message.id,
                        "response_length": assistant_message.content.chars().count(),
                    }),
                ))
                .await;
        }
    }
}

fn to_context_item(item: &StoreMemoryItem) -> ContextMemoryItem {
    ContextMemoryItem {
        content: item.content.clone(),
        source_type: item.source_type.clone(),
        source_id: item.source_id.clone(),
        timestamp: Some(item.created_at),
    }
}
