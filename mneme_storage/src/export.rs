//! Human-portable export/import (§4.9): JSON grouped by entity type,
//! preserving ids. Vectors are never exported — they are regenerated
//! lazily by `mneme_memory`'s self-healing reconcile pass on next
//! retrieval (§4.5.3), not restored from a snapshot the way backup's
//! vector directory is.

use crate::StorageManager;
use crate::StorageError;
use mneme_store::{Conversation, Document, DocumentChunk, MemoryFilter, MemoryItem, Message, StoreError, WebContentChunk, WebPage};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const EXPORT_PAGE_SIZE: u64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub conversations: Vec<Conversation>,
    pub messages: Vec<Message>,
    pub memory_items: Vec<MemoryItem>,
    pub documents: Vec<Document>,
    pub document_chunks: Vec<DocumentChunk>,
    pub web_pages: Vec<WebPage>,
    pub web_content_chunks: Vec<WebContentChunk>,
}

/// `merge` inserts only ids absent from the destination store; `replace`
/// drops every existing row of a touched entity type first (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Merge,
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub conversations: u64,
    pub messages: u64,
    pub memory_items: u64,
    pub documents: u64,
    pub document_chunks: u64,
    pub web_pages: u64,
    pub web_content_chunks: u64,
}

impl StorageManager {
    #[instrument(skip(self, cancellation))]
    pub async fn export_data(&self, cancellation: &CancellationToken) -> Result<ExportData, StorageError> {
        let mut data = ExportData::default();

        let mut offset = 0u64;
        loop {
            if cancellation.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let page = self.store.list_conversations(EXPORT_PAGE_SIZE, offset).await?;
            let page_len = page.len() as u64;
            data.conversations.extend(page);
            if page_len < EXPORT_PAGE_SIZE {
                break;
            }
            offset += EXPORT_PAGE_SIZE;
        }

        for conversation in &data.conversations {
            if cancellation.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let mut msg_offset = 0u64;
            loop {
                let page = self.store.get_conversation_history(conversation.id, EXPORT_PAGE_SIZE, msg_offset).await?;
                let page_len = page.len() as u64;
                data.messages.extend(page);
                if page_len < EXPORT_PAGE_SIZE {
                    break;
                }
                msg_offset += EXPORT_PAGE_SIZE;
            }
        }

        let mut offset = 0u64;
        loop {
            if cancellation.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let page = self.store.list_memory_items(&MemoryFilter::default(), EXPORT_PAGE_SIZE, offset).await?;
            let page_len = page.len() as u64;
            data.memory_items.extend(page);
            if page_len < EXPORT_PAGE_SIZE {
                break;
            }
            offset += EXPORT_PAGE_SIZE;
        }

        let mut offset = 0u64;
        loop {
            if cancellation.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let page = self.store.list_documents(EXPORT_PAGE_SIZE, offset).await?;
            let page_len = page.len() as u64;
            data.documents.extend(page);
            if page_len < EXPORT_PAGE_SIZE {
                break;
            }
            offset += EXPORT_PAGE_SIZE;
        }
        for document in &data.documents {
            data.document_chunks.extend(self.store.list_document_chunks(document.id).await?);
        }

        let mut offset = 0u64;
        loop {
            if cancellation.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let page = self.store.list_web_pages(EXPORT_PAGE_SIZE, offset).await?;
            let page_len = page.len() as u64;
            data.web_pages.extend(page);
            if page_len < EXPORT_PAGE_SIZE {
                break;
            }
            offset += EXPORT_PAGE_SIZE;
        }
        for page in &data.web_pages {
            data.web_content_chunks.extend(self.store.list_web_content_chunks(page.id).await?);
        }

        Ok(data)
    }

    /// Inserts every row in `data` under its original id. In [`ImportMode::Replace`]
    /// every touched table is cleared first, so a conflicting insert is a
    /// genuine failure; in [`ImportMode::Merge`] a conflicting insert means
    /// the id is already present and is treated as "nothing to do" rather
    /// than an error (no per-id existence check is exposed at this layer
    /// for every entity, so presence is inferred from the insert outcome).
    #[instrument(skip(self, data, cancellation))]
    pub async fn import_data(&self, data: &ExportData, mode: ImportMode, cancellation: &CancellationToken) -> Result<ImportSummary, StorageError> {
        if cancellation.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        if mode == ImportMode::Replace {
            self.store.clear_conversations().await?;
            self.store.clear_memory_items().await?;
            self.store.clear_documents().await?;
            self.store.clear_web_pages().await?;
        }

        let mut summary = ImportSummary::default();

        for conversation in &data.conversations {
            if put_or_skip(mode, self.store.put_conversation(conversation).await)? {
                summary.conversations += 1;
            }
        }
        for message in &data.messages {
            if put_or_skip(mode, self.store.put_message(message).await)? {
                summary.messages += 1;
            }
        }
        for item in &data.memory_items {
            if put_or_skip(mode, self.store.put_memory_item(item).await)? {
                summary.memory_items += 1;
            }
        }
        for document in &data.documents {
            if put_or_skip(mode, self.store.put_document(document).await)? {
                summary.documents += 1;
            }
        }
        for chunk in &data.document_chunks {
            if put_or_skip(mode, self.store.put_document_chunk(chunk).await)? {
                summary.document_chunks += 1;
            }
        }
        for page in &data.web_pages {
            if put_or_skip(mode, self.store.put_web_page(page).await)? {
                summary.web_pages += 1;
            }
        }
        for chunk in &data.web_content_chunks {
            if put_or_skip(mode, self.store.put_web_content_chunk(chunk).await)? {
                summary.web_content_chunks += 1;
            }
        }

        Ok(summary)
    }
}

/// `Ok(true)` if the row was inserted, `Ok(false)` if merge mode swallowed a
/// conflicting insert, `Err` for anything else (or any error in replace
/// mode, where a conflict is unexpected since the table was just cleared).
fn put_or_skip(mode: ImportMode, result: Result<(), StoreError>) -> Result<bool, StorageError> {
    match result {
        Ok(()) => Ok(true),
        Err(StoreError::Storage(_)) if mode == ImportMode::Merge => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageManager;
    use mneme_config::StorageConfig;
    use mneme_core::MemoryCategory;
    use mneme_crypto::Key;
    use mneme_vector::VectorStore;
    use sea_orm::Database;

    async fn test_manager(data_dir: &std::path::Path) -> StorageManager {
        let key = Key::generate_random();
        let config = StorageConfig {
            data_dir: data_dir.to_path_buf(),
            database_filename: "personal_ai.db".to_string(),
            vector_dir: "vectors".to_string(),
            documents_dir: "documents".to_string(),
            backups_dir: "backups".to_string(),
        };
        tokio::fs::create_dir_all(&config.data_dir).await.unwrap();
        let db = Database::connect(format!("sqlite:{}?mode=rwc", config.database_path().display())).await.unwrap();
        let store = mneme_store::MetadataStore::from_connection(db, key.clone()).await.unwrap();
        let vectors = VectorStore::open(config.vector_path()).await.unwrap();
        StorageManager::new(store, vectors, key, config)
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_store_preserves_ids() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = test_manager(source_dir.path()).await;
        let token = CancellationToken::new();

        let conversation = source.store.create_conversation(Some("trip".into())).await.unwrap();
        source.store.add_message(conversation.id, mneme_core::Role::User, "pack sunscreen").await.unwrap();
        let memory = source
            .store
            .create_memory_item("likes sunscreen", MemoryCategory::UserDefined, None, None, None, None)
            .await
            .unwrap();

        let exported = source.export_data(&token).await.unwrap();
        assert_eq!(exported.conversations.len(), 1);
        assert_eq!(exported.messages.len(), 1);
        assert_eq!(exported.memory_items.len(), 1);

        let dest_dir = tempfile::tempdir().unwrap();
        let dest = test_manager(dest_dir.path()).await;
        let summary = dest.import_data(&exported, ImportMode::Replace, &token).await.unwrap();
        assert_eq!(summary.conversations, 1);
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.memory_items, 1);

        let fetched_conversation = dest.store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(fetched_conversation.title.as_deref(), Some("trip"));
        let fetched_memory = dest.store.get_memory_item(memory.id).await.unwrap();
        assert_eq!(fetched_memory.content, "likes sunscreen");
    }

    #[tokio::test]
    async fn merge_mode_skips_already_present_ids() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        let conversation = manager.store.create_conversation(Some("existing".into())).await.unwrap();
        let mut data = ExportData::default();
        data.conversations.push(conversation.clone());

        let summary = manager.import_data(&data, ImportMode::Merge, &token).await.unwrap();
        assert_eq!(summary.conversations, 0);

        let list = manager.store.list_conversations(10, 0).await.unwrap();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn replace_mode_clears_existing_rows_first() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        manager.store.create_conversation(Some("to be replaced".into())).await.unwrap();
        let summary = manager.import_data(&ExportData::default(), ImportMode::Replace, &token).await.unwrap();
        assert_eq!(summary.conversations, 0);

        let list = manager.store.list_conversations(10, 0).await.unwrap();
        assert!(list.is_empty());
    }
}
