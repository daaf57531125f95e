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

//! A persistent exact-nearest-neighbor vector store (§4.4): an in-memory
//! `HashMap<Id, VectorEntry>` behind a single `RwLock`, mirror-persisted to a
//! directory of flat files so the whole store lives under one data
//! directory (§6) rather than behind a separate server process.

mod entry;
mod error;
mod persist;

pub use entry::{cosine_similarity, ScoredEntry, VectorEntry};
pub use error::VectorStoreError;

use async_trait::async_trait;
use mneme_core::Id;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Equality constraints on metadata keys, applied by `search_by_vector` /
/// `search_by_text` / `count` (§4.4).
pub type VectorFilters = HashMap<String, Json>;

/// The embedding callback a store is bound to for `search_by_text` (§4.4:
/// "requires an embedding callback supplied at construction... not a hard
/// dependency on any one provider"). `mneme_llm`'s router implements this.
#[async_trait]
pub trait EmbeddingFn: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

struct State {
    entries: HashMap<Id, VectorEntry>,
    dim: usize,
}

/// Handle over the vector index. Cheaply `Clone`-able; the inner state is
/// shared so concurrent callers serialize through the same lock (§5).
#[derive(Clone)]
pub struct VectorStore {
    dir: PathBuf,
    state: Arc<RwLock<State>>,
    embedder: Option<Arc<dyn EmbeddingFn>>,
    closed: Arc<AtomicBool>,
}

impl VectorStore {
    /// Opens (creating if absent) the vector store rooted at `dir`, loading
    /// any previously persisted entries.
    ///
    /// # Errors
    /// Returns [`VectorStoreError::Io`] if the directory or its snapshot
    /// files can't be read, or [`VectorStoreError::Serialization`] if
    /// `entries.jsonl` is corrupt.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, VectorStoreError> {
        let dir = dir.into();
        let load_dir = dir.clone();
        let (dim, entries) =
            tokio::task::spawn_blocking(move || persist::load_snapshot(&load_dir))
                .await
                .map_err(|e| VectorStoreError::Other(anyhow::anyhow!(e)))??;

        info!(path = %dir.display(), entries = entries.len(), "vector store opened");
        Ok(Self {
            dir,
            state: Arc::new(RwLock::new(State {
                entries: entries.into_iter().map(|e| (e.id, e)).collect(),
                dim,
            })),
            embedder: None,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Attaches the embedding callback `search_by_text` delegates to.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingFn>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn ensure_open(&self) -> Result<(), VectorStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VectorStoreError::Validation("vector store is closed".to_string()));
        }
        Ok(())
    }

    /// Idempotent by id: inserting an id already present overwrites it
    /// (§4.4).
    #[instrument(skip(self, vector, metadata, text))]
    pub async fn add(&self, id: Id, vector: Vec<f32>, metadata: Json, text: String) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        validate_dim(&mut state, vector.len())?;
        state.entries.insert(id, VectorEntry { id, vector, metadata, text });
        self.persist_locked(&state).await
    }

    pub async fn add_batch(&self, items: Vec<(Id, Vec<f32>, Json, String)>) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        for (id, vector, metadata, text) in items {
            validate_dim(&mut state, vector.len())?;
            state.entries.insert(id, VectorEntry { id, vector, metadata, text });
        }
        self.persist_locked(&state).await
    }

    /// Partial update; fails with [`VectorStoreError::NotFound`] if `id` is
    /// absent (§4.4).
    pub async fn update(
        &self,
        id: Id,
        vector: Option<Vec<f32>>,
        metadata: Option<Json>,
        text: Option<String>,
    ) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        if let Some(vector) = &vector {
            validate_dim(&mut state, vector.len())?;
        }
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or_else(|| VectorStoreError::NotFound(id.to_string()))?;
        if let Some(vector) = vector {
            entry.vector = vector;
        }
        if let Some(metadata) = metadata {
            entry.metadata = metadata;
        }
        if let Some(text) = text {
            entry.text = text;
        }
        self.persist_locked(&state).await
    }

    /// No error if `id` is absent; logged instead (§4.4).
    pub async fn delete(&self, id: Id) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        if state.entries.remove(&id).is_none() {
            debug!(%id, "delete of absent vector entry");
            return Ok(());
        }
        self.persist_locked(&state).await
    }

    pub async fn get(&self, id: Id) -> Result<VectorEntry, VectorStoreError> {
        self.ensure_open()?;
        let state = self.state.read().await;
        state
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| VectorStoreError::NotFound(id.to_string()))
    }

    /// Top-`limit` entries ranked by decreasing cosine similarity; ties
    /// break by id ascending (§4.4). The scan runs on a blocking thread so
    /// the `rayon` fan-out never occupies an async worker.
    #[instrument(skip(self, query, filters))]
    pub async fn search_by_vector(
        &self,
        query: &[f32],
        limit: usize,
        filters: Option<&VectorFilters>,
    ) -> Result<Vec<ScoredEntry>, VectorStoreError> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let candidates: Vec<VectorEntry> = state
            .entries
            .values()
            .filter(|entry| matches_filters(entry, filters))
            .cloned()
            .collect();
        drop(state);

        let query = query.to_vec();
        let scored = tokio::task::spawn_blocking(move || rank(&candidates, &query, limit))
            .await
            .map_err(|e| VectorStoreError::Other(anyhow::anyhow!(e)))?;
        Ok(scored)
    }

    /// Embeds `query_text` via the configured [`EmbeddingFn`], then delegates
    /// to [`Self::search_by_vector`] (§4.4).
    pub async fn search_by_text(
        &self,
        query_text: &str,
        limit: usize,
        filters: Option<&VectorFilters>,
    ) -> Result<Vec<ScoredEntry>, VectorStoreError> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            VectorStoreError::Validation("search_by_text requires an embedding callback".to_string())
        })?;
        let query = embedder.embed(query_text).await.map_err(VectorStoreError::Other)?;
        self.search_by_vector(&query, limit, filters).await
    }

    pub async fn count(&self, filters: Option<&VectorFilters>) -> Result<usize, VectorStoreError> {
        self.ensure_open()?;
        let state = self.state.read().await;
        Ok(state.entries.values().filter(|entry| matches_filters(entry, filters)).count())
    }

    /// Copies the current persisted snapshot to `path` (§4.4). Flushes first
    /// so the backup reflects in-memory state, not a stale snapshot.
    #[instrument(skip(self))]
    pub async fn backup(&self, path: &Path) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let entries: Vec<VectorEntry> = state.entries.values().cloned().collect();
        let dim = state.dim;
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || persist::write_snapshot(&target, dim, &entries))
            .await
            .map_err(|e| VectorStoreError::Other(anyhow::anyhow!(e)))??;
        info!(path = %path.display(), "vector store backed up");
        Ok(())
    }

    /// Replaces the in-memory store with the snapshot at `path` and persists
    /// it to this store's own directory (§4.4).
    #[instrument(skip(self))]
    pub async fn restore(&self, path: &Path) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let source = path.to_path_buf();
        let (dim, entries) = tokio::task::spawn_blocking(move || persist::load_snapshot(&source))
            .await
            .map_err(|e| VectorStoreError::Other(anyhow::anyhow!(e)))??;

        let mut state = self.state.write().await;
        state.dim = dim;
        state.entries = entries.into_iter().map(|e| (e.id, e)).collect();
        self.persist_locked(&state).await?;
        info!(path = %path.display(), entries = state.entries.len(), "vector store restored");
        Ok(())
    }

    /// Rewrites the snapshot compactly (§4.4). Every mutation already
    /// rewrites in full, so this mostly matters after many deletes have
    /// shrunk the live set without shrinking the files on disk.
    pub async fn optimize(&self) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let state = self.state.read().await;
        self.persist_locked(&state).await?;
        info!("vector store optimized");
        Ok(())
    }

    /// Flushes and marks the store closed; further calls return
    /// [`VectorStoreError::Validation`] (§4.4, §5's orderly-shutdown
    /// discipline).
    pub async fn close(&self) -> Result<(), VectorStoreError> {
        self.ensure_open()?;
        let state = self.state.read().await;
        self.persist_locked(&state).await?;
        self.closed.store(true, Ordering::Release);
        info!("vector store closed");
        Ok(())
    }

    async fn persist_locked(&self, state: &State) -> Result<(), VectorStoreError> {
        let entries: Vec<VectorEntry> = state.entries.values().cloned().collect();
        let dim = state.dim;
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || persist::write_snapshot(&dir, dim, &entries))
            .await
            .map_err(|e| VectorStoreError::Other(anyhow::anyhow!(e)))??;
        Ok(())
    }
}

fn validate_dim(state: &mut State, len: usize) -> Result<(), VectorStoreError> {
    if state.entries.is_empty() && state.dim == 0 {
        state.dim = len;
        return Ok(());
    }
    if state.dim != 0 && state.dim != len {
        return Err(VectorStoreError::Validation(format!(
            "vector dimension mismatch: store is {}, got {len}",
            state.dim
        )));
    }
    Ok(())
}

fn matches_filters(entry: &VectorEntry, filters: Option<&VectorFilters>) -> bool {
    let Some(filters) = filters else { return true };
    filters.iter().all(|(key, expected)| entry.metadata.get(key) == Some(expected))
}

fn rank(candidates: &[VectorEntry], query: &[f32], limit: usize) -> Vec<ScoredEntry> {
    use rayon::prelude::*;

    let mut scored: Vec<ScoredEntry> = candidates
        .par_iter()
        .map(|entry| ScoredEntry {
            score: cosine_similarity(query, &entry.vector),
            entry: entry.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_core::new_id;

    async fn test_store() -> VectorStore {
        let dir = tempfile::tempdir().unwrap();
        VectorStore::open(dir.keep()).await.unwrap()
    }

    #[tokio::test]
    async fn add_and_get_round_trips() {
        let store = test_store().await;
        let id = new_id();
        store.add(id, vec![1.0, 0.0], serde_json::json!({"k": "v"}), "hello".into()).await.unwrap();

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.text, "hello");
        assert_eq!(fetched.vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn add_is_idempotent_by_id() {
        let store = test_store().await;
        let id = new_id();
        store.add(id, vec![1.0, 0.0], serde_json::json!({}), "first".into()).await.unwrap();
        store.add(id, vec![0.0, 1.0], serde_json::json!({}), "second".into()).await.unwrap();

        assert_eq!(store.count(None).await.unwrap(), 1);
        assert_eq!(store.get(id).await.unwrap().text, "second");
    }

    #[tokio::test]
    async fn update_fails_on_absent_id() {
        let store = test_store().await;
        let result = store.update(new_id(), Some(vec![1.0]), None, None).await;
        assert!(matches!(result, Err(VectorStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_absent_id_is_not_an_error() {
        let store = test_store().await;
        store.delete(new_id()).await.unwrap();
    }

    #[tokio::test]
    async fn search_ranks_by_similarity_and_breaks_ties_by_id() {
        let store = test_store().await;
        let a = new_id();
        let b = new_id();
        store.add(a, vec![1.0, 0.0], serde_json::json!({}), "a".into()).await.unwrap();
        store.add(b, vec![1.0, 0.0], serde_json::json!({}), "b".into()).await.unwrap();

        let results = store.search_by_vector(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 1.0).abs() < 1e-9);
        let expected_first = a.min(b);
        assert_eq!(results[0].entry.id, expected_first);
    }

    #[tokio::test]
    async fn search_respects_metadata_filters() {
        let store = test_store().await;
        store.add(new_id(), vec![1.0, 0.0], serde_json::json!({"category": "note"}), "a".into()).await.unwrap();
        store.add(new_id(), vec![1.0, 0.0], serde_json::json!({"category": "other"}), "b".into()).await.unwrap();

        let mut filters = VectorFilters::new();
        filters.insert("category".to_string(), serde_json::json!("note"));
        let results = store.search_by_vector(&[1.0, 0.0], 10, Some(&filters)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.text, "a");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = test_store().await;
        store.add(new_id(), vec![1.0, 0.0], serde_json::json!({}), "a".into()).await.unwrap();
        let result = store.add(new_id(), vec![1.0, 0.0, 0.0], serde_json::json!({}), "b".into()).await;
        assert!(matches!(result, Err(VectorStoreError::Validation(_))));
    }

    #[tokio::test]
    async fn backup_and_restore_round_trip() {
        let store = test_store().await;
        let id = new_id();
        store.add(id, vec![1.0, 2.0], serde_json::json!({}), "persisted".into()).await.unwrap();

        let backup_dir = tempfile::tempdir().unwrap();
        store.backup(backup_dir.path()).await.unwrap();

        let restored = test_store().await;
        restored.restore(backup_dir.path()).await.unwrap();

        let fetched = restored.get(id).await.unwrap();
        assert_eq!(fetched.text, "persisted");
    }

    #[tokio::test]
    async fn closed_store_rejects_further_operations() {
        let store = test_store().await;
        store.close().await.unwrap();
        let result = store.get(new_id()).await;
        assert!(matches!(result, Err(VectorStoreError::Validation(_))));
    }
}
