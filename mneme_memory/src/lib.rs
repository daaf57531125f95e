#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! The retrieval engine (§4.5): write path (dedup + reinforcement, embed,
//! vector-index), composite-ranked retrieval, and the self-healing pass
//! that keeps the metadata store and vector store converged.

mod error;
pub mod scoring;

pub use error::MemoryError;
pub use scoring::RetrievalWeights;

use chrono::Utc;
use mneme_core::{Id, MemoryCategory};
use mneme_events::{Event, EventBus};
use mneme_llm::LlmRouter;
use mneme_store::{MemoryFilter, MemoryItem, MetadataStore, VectorSourceType};
use mneme_vector::{VectorFilters, VectorStore};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

pub const EVENT_MEMORY_STORED: &str = "memory:stored";
pub const EVENT_MEMORY_UPDATED: &str = "memory:updated";
pub const EVENT_MEMORY_DELETED: &str = "memory:deleted";

const DEFAULT_LIMIT: usize = 10;
const DEFAULT_MAX_SEARCH: usize = 200;
/// Near-duplicate threshold for `store_memory_deduplicated` (§4.5.5).
const SEMANTIC_DEDUP_THRESHOLD: f64 = 0.95;
/// Bound on how many metadata rows a single self-healing pass inspects
/// (§4.5.3 describes the pass as best-effort, not exhaustive-per-call).
const RECONCILE_PAGE_SIZE: u64 = 200;

/// A retrieved memory plus the similarity it was ranked on, returned
/// alongside the formatted context block (§4.5.2).
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub items: Vec<MemoryItem>,
    pub formatted_context: String,
}

/// Optional constraints on `retrieve_context` (§4.5.2).
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    pub categories: Option<Vec<MemoryCategory>>,
    pub metadata: Option<VectorFilters>,
    pub conversation_id: Option<Id>,
}

/// The write/read/ranking surface over a memory store rooted at one
/// metadata store + vector store pair (§4.5). Cheaply `Clone`-able.
#[derive(Clone)]
pub struct MemoryService {
    store: MetadataStore,
    vectors: VectorStore,
    llm: LlmRouter,
    events: Option<Arc<EventBus>>,
    weights: RetrievalWeights,
    max_search: usize,
    embedding_model: String,
}

impl MemoryService {
    #[must_use]
    pub fn new(store: MetadataStore, vectors: VectorStore, llm: LlmRouter) -> Self {
        Self {
            store,
            vectors,
            llm,
            events: None,
            weights: RetrievalWeights::default(),
            max_search: DEFAULT_MAX_SEARCH,
            embedding_model: "default".to_string(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// # Errors
    /// Returns [`MemoryError::Validation`] if the weights don't sum to
    /// ~1.0 (§4.5.2's load-time validation).
    pub fn with_weights(mut self, weights: RetrievalWeights) -> Result<Self, MemoryError> {
        self.weights = weights.validate().map_err(MemoryError::Validation)?;
        Ok(self)
    }

    #[must_use]
    pub const fn with_max_search(mut self, max_search: usize) -> Self {
        self.max_search = max_search;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, embedding_model: impl Into<String>) -> Self {
        self.embedding_model = embedding_model.into();
        self
    }

    /// §4.5.1: validate → insert → embed → vector-insert → publish. Never
    /// rolls back on embedding/vector failure; the metadata row is
    /// authoritative and the gap is closed by `reconcile`.
    #[instrument(skip(self, item, cancellation))]
    pub async fn store_memory(
        &self,
        item: NewMemoryItem,
        cancellation: &CancellationToken,
    ) -> Result<MemoryItem, MemoryError> {
        if cancellation.is_cancelled() {
            return Err(MemoryError::Cancelled);
        }
        if item.content.trim().is_empty() {
            return Err(MemoryError::Validation("memory content must not be empty".to_string()));
        }

        let hash = scoring::content_hash(item.category.as_str(), &item.content);
        if let Some(existing) = self.store.find_memory_item_by_hash(&hash).await? {
            let reinforced = self.store.increment_reinforcement_count(existing.id).await?;
            return Ok(reinforced);
        }

        let inserted = self
            .store
            .create_memory_item(
                &item.content,
                item.category,
                item.source_type,
                item.source_id,
                item.importance,
                item.metadata.clone(),
            )
            .await?;

        self.index_item(&inserted, item.metadata.unwrap_or_else(|| serde_json::json!({})), cancellation).await;
        self.emit(EVENT_MEMORY_STORED, &inserted).await;
        Ok(inserted)
    }

    /// Embeds and indexes `item`, marking its vector record indexed on
    /// success. Logs and leaves `indexed=false` on any failure — this is
    /// the non-atomic half of the write (§4.5.1 step 3/4).
    ///
    /// Find-or-create on the embedding record: `(source_type, source_id)` is
    /// unique, and an item can already own a record left `indexed=false` by
    /// a prior failed attempt (§4.5.1 step 3, §4.5.3's reconcile pass) —
    /// reusing it instead of always inserting is what lets self-healing
    /// retry an item more than once.
    async fn index_item(&self, item: &MemoryItem, extra_metadata: Json, cancellation: &CancellationToken) {
        let existing = match self
            .store
            .find_vector_record_by_source(VectorSourceType::MemoryItem, item.id)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, id = %item.id, "failed to look up vector embedding record");
                return;
            }
        };
        let record = match existing {
            Some(record) => record,
            None => match self
                .store
                .create_vector_record(VectorSourceType::MemoryItem, item.id, &self.embedding_model)
                .await
            {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, id = %item.id, "failed to create vector embedding record");
                    return;
                }
            },
        };

        let embedding = match self.llm.generate_embedding(&item.content, cancellation).await {
            Ok(embedding) if !embedding.is_empty() => embedding,
            Ok(_) => {
                warn!(id = %item.id, "embedding generation degraded to empty vector; leaving unindexed");
                return;
            }
            Err(e) => {
                warn!(error = %e, id = %item.id, "embedding generation failed; leaving unindexed");
                return;
            }
        };

        let mut vector_metadata = extra_metadata;
        if let Some(obj) = vector_metadata.as_object_mut() {
            obj.insert("source_type".to_string(), serde_json::json!(VectorSourceType::MemoryItem.as_str()));
            obj.insert("source_id".to_string(), serde_json::json!(item.id));
            obj.insert("category".to_string(), serde_json::json!(item.category.as_str()));
        }

        if let Err(e) = self.vectors.add(item.id, embedding, vector_metadata, item.content.clone()).await {
            warn!(error = %e, id = %item.id, "failed to write vector entry; leaving unindexed");
            return;
        }

        if let Err(e) = self.store.mark_vector_indexed(record.id).await {
            warn!(error = %e, id = %item.id, "failed to mark vector record indexed");
        }
    }

    /// Preserves per-item ordering of the returned ids (§4.5.1).
    pub async fn batch_store_memory(
        &self,
        items: Vec<NewMemoryItem>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Id>, MemoryError> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            if cancellation.is_cancelled() {
                return Err(MemoryError::Cancelled);
            }
            let stored = self.store_memory(item, cancellation).await?;
            ids.push(stored.id);
        }
        Ok(ids)
    }

    /// Opt-in near-duplicate path (§4.5.5): if a memory with similarity
    /// above [`SEMANTIC_DEDUP_THRESHOLD`] already exists in `category`, its
    /// content is reinforced in place instead of inserting a new row.
    /// Intended for document/web ingestion, which re-submits overlapping
    /// chunks far more often than direct user-authored memories do.
    pub async fn store_memory_deduplicated(
        &self,
        item: NewMemoryItem,
        cancellation: &CancellationToken,
    ) -> Result<MemoryItem, MemoryError> {
        if cancellation.is_cancelled() {
            return Err(MemoryError::Cancelled);
        }

        let hash = scoring::content_hash(item.category.as_str(), &item.content);
        if let Some(existing) = self.store.find_memory_item_by_hash(&hash).await? {
            return Ok(self.store.increment_reinforcement_count(existing.id).await?);
        }

        let embedding = self.llm.generate_embedding(&item.content, cancellation).await?;
        if !embedding.is_empty() {
            let mut filters = VectorFilters::new();
            filters.insert("category".to_string(), serde_json::json!(item.category.as_str()));
            let candidates = self.vectors.search_by_vector(&embedding, 5, Some(&filters)).await?;
            if let Some(near_dup) = candidates.into_iter().find(|c| c.score > SEMANTIC_DEDUP_THRESHOLD) {
                return Ok(self.store.increment_reinforcement_count(near_dup.entry.id).await?);
            }
        }

        self.store_memory(item, cancellation).await
    }

    /// Re-embeds and re-indexes `content`/`metadata`, mirroring
    /// `store_memory`'s embed step synchronously and inline (DESIGN.md
    /// open-question decision).
    pub async fn update_memory(
        &self,
        id: Id,
        content: &str,
        metadata: Option<Json>,
        cancellation: &CancellationToken,
    ) -> Result<MemoryItem, MemoryError> {
        if cancellation.is_cancelled() {
            return Err(MemoryError::Cancelled);
        }
        let item = self.store.update_memory_item_content(id, content, metadata.clone()).await?;

        let vector_metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        match self.store.find_vector_record_by_source(VectorSourceType::MemoryItem, id).await? {
            Some(record) => {
                let embedding = self.llm.generate_embedding(&item.content, cancellation).await?;
                if embedding.is_empty() {
                    warn!(id = %id, "re-embedding degraded to empty vector on update");
                } else {
                    self.vectors.update(id, Some(embedding), Some(vector_metadata), Some(item.content.clone())).await?;
                    if !record.indexed {
                        self.store.mark_vector_indexed(record.id).await?;
                    }
                }
            }
            None => self.index_item(&item, vector_metadata, cancellation).await,
        }

        self.emit(EVENT_MEMORY_UPDATED, &item).await;
        Ok(item)
    }

    /// Deletes the vector entry and embedding record before the metadata
    /// row, so a failure part-way through never leaves metadata deleted
    /// with the vector side still referencing it (§3).
    pub async fn delete_memory(&self, id: Id) -> Result<(), MemoryError> {
        if let Some(record) = self.store.find_vector_record_by_source(VectorSourceType::MemoryItem, id).await? {
            self.vectors.delete(id).await?;
            self.store.delete_vector_record(record.id).await?;
        }
        self.store.delete_memory_item(id).await?;
        self.emit_id(EVENT_MEMORY_DELETED, id).await;
        Ok(())
    }

    /// §4.5.2: the composite-ranked retrieval pass.
    #[instrument(skip(self, query, filters, cancellation))]
    pub async fn retrieve_context(
        &self,
        query: &str,
        limit: Option<usize>,
        filters: RetrievalFilters,
        cancellation: &CancellationToken,
    ) -> Result<RetrievalResult, MemoryError> {
        if cancellation.is_cancelled() {
            return Err(MemoryError::Cancelled);
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let k = (limit * 3).min(self.max_search);

        let query_embedding = self.llm.generate_embedding(query, cancellation).await?;
        if query_embedding.is_empty() {
            warn!("query embedding degraded to empty vector; returning no results");
            return Ok(RetrievalResult { items: Vec::new(), formatted_context: String::new() });
        }

        let mut vector_filters = filters.metadata.clone().unwrap_or_default();
        if let Some(conversation_id) = filters.conversation_id {
            vector_filters.insert("conversation_id".to_string(), serde_json::json!(conversation_id));
        }
        let vector_filters = (!vector_filters.is_empty()).then_some(&vector_filters);

        let candidates = self.vectors.search_by_vector(&query_embedding, k, vector_filters).await?;

        let now = Utc::now();
        let mut scored: Vec<(f64, MemoryItem, f64)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.store.get_memory_item(candidate.entry.id).await {
                Ok(item) => {
                    if let Some(categories) = &filters.categories {
                        if !categories.contains(&item.category) {
                            continue;
                        }
                    }
                    let score = scoring::retrieval_score(candidate.score, item.created_at, now, item.importance, self.weights);
                    scored.push((score, item, candidate.score));
                }
                Err(mneme_store::StoreError::NotFound(_)) => {
                    warn!(id = %candidate.entry.id, "self-healing: vector entry has no metadata row, deleting");
                    let _ = self.vectors.delete(candidate.entry.id).await;
                    if let Ok(Some(record)) =
                        self.store.find_vector_record_by_source(VectorSourceType::MemoryItem, candidate.entry.id).await
                    {
                        let _ = self.store.delete_vector_record(record.id).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.reconcile(&filters.categories, cancellation).await;

        scored.sort_by(|(score_a, item_a, sim_a), (score_b, item_b, sim_b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| sim_b.total_cmp(sim_a))
                .then_with(|| item_b.created_at.cmp(&item_a.created_at))
                .then_with(|| item_a.id.cmp(&item_b.id))
        });
        scored.truncate(limit);

        let items: Vec<MemoryItem> = scored.into_iter().map(|(_, item, _)| item).collect();
        let formatted_context = format_context(&items);
        Ok(RetrievalResult { items, formatted_context })
    }

    /// §4.5.3's other direction: metadata rows with no (or unindexed)
    /// vector record get a best-effort re-embed/re-insert pass, bounded by
    /// [`RECONCILE_PAGE_SIZE`] rows per call.
    async fn reconcile(&self, categories: &Option<Vec<MemoryCategory>>, cancellation: &CancellationToken) {
        let category = categories.as_ref().and_then(|c| c.first().copied());
        let filter = MemoryFilter { category, ..MemoryFilter::default() };
        let Ok(items) = self.store.list_memory_items(&filter, RECONCILE_PAGE_SIZE, 0).await else {
            return;
        };

        for item in items {
            if cancellation.is_cancelled() {
                return;
            }
            let needs_reindex = match self.store.find_vector_record_by_source(VectorSourceType::MemoryItem, item.id).await {
                Ok(Some(record)) => !record.indexed,
                Ok(None) => true,
                Err(_) => continue,
            };
            if needs_reindex {
                self.index_item(&item, serde_json::json!({}), cancellation).await;
            }
        }
    }

    pub async fn get_by_category(&self, category: MemoryCategory, limit: u64, offset: u64) -> Result<Vec<MemoryItem>, MemoryError> {
        let filter = MemoryFilter { category: Some(category), ..MemoryFilter::default() };
        Ok(self.store.list_memory_items(&filter, limit, offset).await?)
    }

    pub async fn get_by_source(&self, source_type: &str, source_id: &str, limit: u64, offset: u64) -> Result<Vec<MemoryItem>, MemoryError> {
        let filter = MemoryFilter {
            source_type: Some(source_type.to_string()),
            source_id: Some(source_id.to_string()),
            ..MemoryFilter::default()
        };
        Ok(self.store.list_memory_items(&filter, limit, offset).await?)
    }

    pub async fn get_by_importance(&self, min_importance: i32, limit: u64, offset: u64) -> Result<Vec<MemoryItem>, MemoryError> {
        let filter = MemoryFilter { min_importance: Some(min_importance), ..MemoryFilter::default() };
        Ok(self.store.list_memory_items(&filter, limit, offset).await?)
    }

    pub async fn get_recent_memories(&self, limit: u64) -> Result<Vec<MemoryItem>, MemoryError> {
        Ok(self.store.list_memory_items(&MemoryFilter::default(), limit, 0).await?)
    }

    /// §4.5.4. Permits downgrades (DESIGN.md open-question decision: §3's
    /// monotonicity clause binds automatic updates only, not this explicit
    /// user action).
    pub async fn mark_as_important(&self, id: Id, level: i32) -> Result<MemoryItem, MemoryError> {
        Ok(self.store.mark_as_important(id, level).await?)
    }

    pub async fn count_memories(&self) -> Result<u64, MemoryError> {
        Ok(self.store.count_memory_items(&MemoryFilter::default()).await?)
    }

    pub async fn count_by_category(&self) -> Result<HashMap<MemoryCategory, u64>, MemoryError> {
        Ok(self.store.count_by_category().await?)
    }

    async fn emit(&self, event_type: &str, item: &MemoryItem) {
        if let Some(events) = &self.events {
            events
                .publish_async(Event::new(
                    event_type,
                    serde_json::json!({
                        "id": item.id,
                        "category": item.category.as_str(),
                    }),
                ))
                .await;
        }
    }

    async fn emit_id(&self, event_type: &str, id: Id) {
        if let Some(events) = &self.events {
            events.publish_async(Event::new(event_type, serde_json::json!({ "id": id }))).await;
        }
    }
}

/// The parameters for a single `store_memory`/`batch_store_memory` write.
#[derive(Debug, Clone)]
pub struct NewMemoryItem {
    pub content: String,
    pub category: MemoryCategory,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub importance: Option<i32>,
    pub metadata: Option<Json>,
}

impl NewMemoryItem {
    #[must_use]
    pub fn new(content: impl Into<String>, category: MemoryCategory) -> Self {
        Self {
            content: content.into(),
            category,
            source_type: None,
            source_id: None,
            importance: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source_type: impl Into<String>, source_id: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self.source_id = Some(source_id.into());
        self
    }

    #[must_use]
    pub const fn with_importance(mut self, importance: i32) -> Self {
        self.importance = Some(importance);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Json) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One bullet per item: content plus, when present, `source_type`/
/// `source_id`/`timestamp` annotations (§4.5.2 step 6). `items` and the
/// bullets here stay in one-to-one order correspondence.
fn format_context(items: &[MemoryItem]) -> String {
    items
        .iter()
        .map(|item| {
            let mut line = format!("- {}", item.content);
            if let Some(source_type) = &item.source_type {
                line.push_str(&format!(" [source_type={source_type}"));
                if let Some(source_id) = &item.source_id {
                    line.push_str(&format!(" source_id={source_id}"));
                }
                line.push_str(&format!(" timestamp={}]", item.created_at.to_rfc3339()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mneme_core::{ChatMessage, GenerationOptions, ModelInfo};
    use mneme_crypto::Key;
    use sea_orm::Database;

    struct DeterministicEmbedder;

    #[async_trait]
    impl mneme_core::LlmProvider for DeterministicEmbedder {
        async fn generate_response(&self, _messages: &[ChatMessage], _options: &GenerationOptions) -> anyhow::Result<String> {
            Ok("ok".to_string())
        }

        async fn generate_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            use sha2::{Digest, Sha256};
            let digest = Sha256::digest(text.as_bytes());
            Ok(digest.iter().take(8).map(|b| f32::from(*b) / 255.0).collect())
        }

        fn get_token_count(&self, text: &str) -> u32 {
            #[allow(clippy::cast_possible_truncation)]
            let len = text.len() as u32;
            len
        }

        fn get_max_tokens(&self) -> u32 {
            4096
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn get_model_info(&self) -> ModelInfo {
            ModelInfo::new()
        }
    }

    async fn test_service() -> MemoryService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let store = MetadataStore::from_connection(db, Key::generate_random()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let vectors = VectorStore::open(dir.keep()).await.unwrap();
        let llm = LlmRouter::new(Arc::new(DeterministicEmbedder));
        MemoryService::new(store, vectors, llm)
    }

    #[tokio::test]
    async fn store_memory_indexes_and_is_retrievable() {
        let service = test_service().await;
        let token = CancellationToken::new();
        let item = service
            .store_memory(NewMemoryItem::new("my dog's name is buddy", MemoryCategory::UserDefined), &token)
            .await
            .unwrap();

        let result = service.retrieve_context("what is my dog's name", None, RetrievalFilters::default(), &token).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id, item.id);
        assert!(result.formatted_context.contains("buddy"));
    }

    #[tokio::test]
    async fn store_memory_reinforces_exact_duplicate() {
        let service = test_service().await;
        let token = CancellationToken::new();
        let first = service.store_memory(NewMemoryItem::new("same text", MemoryCategory::Document), &token).await.unwrap();
        let second = service.store_memory(NewMemoryItem::new("same text", MemoryCategory::Document), &token).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.metadata["reinforcement_count"], serde_json::json!(1));
        assert_eq!(service.count_memories().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn retrieve_context_ranks_higher_importance_first_on_tied_similarity() {
        let service = test_service().await;
        let token = CancellationToken::new();
        // Same text in different categories yields identical embeddings
        // (and so identical similarity), isolating importance as the only
        // score differentiator between the two.
        let low = service
            .store_memory(NewMemoryItem::new("apple pie recipe", MemoryCategory::UserDefined).with_importance(1), &token)
            .await
            .unwrap();
        let high = service
            .store_memory(NewMemoryItem::new("apple pie recipe", MemoryCategory::Document).with_importance(5), &token)
            .await
            .unwrap();

        let result = service.retrieve_context("apple pie recipe", Some(5), RetrievalFilters::default(), &token).await.unwrap();
        assert_eq!(result.items.len(), 2);
        let high_rank = result.items.iter().position(|i| i.id == high.id).unwrap();
        let low_rank = result.items.iter().position(|i| i.id == low.id).unwrap();
        assert!(high_rank < low_rank);
    }

    #[tokio::test]
    async fn delete_memory_removes_metadata_and_vector_entry() {
        let service = test_service().await;
        let token = CancellationToken::new();
        let item = service.store_memory(NewMemoryItem::new("temporary note", MemoryCategory::UserDefined), &token).await.unwrap();

        service.delete_memory(item.id).await.unwrap();
        assert!(service.store.get_memory_item(item.id).await.is_err());
        assert!(service.vectors.get(item.id).await.is_err());
    }

    #[tokio::test]
    async fn mark_as_important_permits_downgrade() {
        let service = test_service().await;
        let token = CancellationToken::new();
        let item = service.store_memory(NewMemoryItem::new("note", MemoryCategory::Important).with_importance(5), &token).await.unwrap();
        let updated = service.mark_as_important(item.id, 1).await.unwrap();
        assert_eq!(updated.importance, 1);
    }

    #[tokio::test]
    async fn count_by_category_sums_to_total() {
        let service = test_service().await;
        let token = CancellationToken::new();
        service.store_memory(NewMemoryItem::new("a", MemoryCategory::Document), &token).await.unwrap();
        service.store_memory(NewMemoryItem::new("b", MemoryCategory::Web), &token).await.unwrap();

        let total = service.count_memories().await.unwrap();
        let by_category = service.count_by_category().await.unwrap();
        let sum: u64 = by_category.values().sum();
        assert_eq!(total, sum);
    }

    /// §8 scenario 4: a memory item left `indexed=false` with no vector
    /// entry (the state an embedding-failure leaves behind per §4.5.1 step
    /// 3) gets healed by the next `retrieve_context` call, and a second
    /// healing pass doesn't fail on the now-existing crosswalk row.
    #[tokio::test]
    async fn reconcile_heals_an_unindexed_item_with_no_vector_entry() {
        let service = test_service().await;
        let token = CancellationToken::new();

        let item = service
            .store
            .create_memory_item("my dog's name is buddy", MemoryCategory::UserDefined, None, None, None, None)
            .await
            .unwrap();
        service
            .store
            .create_vector_record(VectorSourceType::MemoryItem, item.id, "test-model")
            .await
            .unwrap();
        assert!(service.vectors.get(item.id).await.is_err());

        service.retrieve_context("what is my dog's name", None, RetrievalFilters::default(), &token).await.unwrap();
        let record = service.store.find_vector_record_by_source(VectorSourceType::MemoryItem, item.id).await.unwrap().unwrap();
        assert!(record.indexed);
        assert!(service.vectors.get(item.id).await.is_ok());

        // A second pass must not hit the (source_type, source_id) unique
        // constraint by trying to insert another crosswalk row.
        let result = service.retrieve_context("what is my dog's name", None, RetrievalFilters::default(), &token).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id, item.id);
    }
}
