//! Component byte sizes plus record counts by entity type (§4.9's `Stats`).

use crate::fsutil;
use crate::{StorageManager, StorageError};
use mneme_entities::prelude::{
    Conversations, DocumentChunks, Documents, MemoryItems, Messages, VectorEmbeddingRecords,
    WebContentChunks, WebPages,
};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Per-entity row counts plus on-disk byte sizes of the three store
/// components, as reported by `get_storage_stats` (§4.9).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub database_file_bytes: u64,
    pub vector_store_bytes: u64,
    pub documents_bytes: u64,
    pub conversation_count: u64,
    pub message_count: u64,
    pub memory_item_count: u64,
    pub document_count: u64,
    pub document_chunk_count: u64,
    pub web_page_count: u64,
    pub web_content_chunk_count: u64,
    pub vector_embedding_record_count: u64,
}

impl StorageManager {
    #[instrument(skip(self))]
    pub async fn get_storage_stats(&self) -> Result<StorageStats, StorageError> {
        let db = self.store.connection();

        let database_file_bytes = tokio::fs::metadata(self.config.database_path())
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        let (_, vector_store_bytes) = fsutil::dir_stats(self.config.vector_path()).await?;
        let documents_path = self.config.documents_path();
        let documents_bytes = if tokio::fs::try_exists(&documents_path).await.unwrap_or(false) {
            fsutil::dir_stats(documents_path).await?.1
        } else {
            0
        };

        Ok(StorageStats {
            database_file_bytes,
            vector_store_bytes,
            documents_bytes,
            conversation_count: Conversations::find().count(db).await?,
            message_count: Messages::find().count(db).await?,
            memory_item_count: MemoryItems::find().count(db).await?,
            document_count: Documents::find().count(db).await?,
            document_chunk_count: DocumentChunks::find().count(db).await?,
            web_page_count: WebPages::find().count(db).await?,
            web_content_chunk_count: WebContentChunks::find().count(db).await?,
            vector_embedding_record_count: VectorEmbeddingRecords::find().count(db).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageManager;
    use mneme_config::StorageConfig;
    use mneme_core::{MemoryCategory, Role};
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
        tokio::fs::create_dir_all(config.vector_path()).await.unwrap();
        let vectors = VectorStore::open(config.vector_path()).await.unwrap();
        StorageManager::new(store, vectors, key, config)
    }

    #[tokio::test]
    async fn stats_reports_counts_matching_inserted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;

        let conversation = manager.store.create_conversation(Some("trip".into())).await.unwrap();
        manager.store.add_message(conversation.id, Role::User, "pack sunscreen").await.unwrap();
        manager
            .store
            .create_memory_item("likes sunscreen", MemoryCategory::UserDefined, None, None, None, None)
            .await
            .unwrap();

        let stats = manager.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversation_count, 1);
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.memory_item_count, 1);
        assert!(stats.database_file_bytes > 0);
    }

    #[tokio::test]
    async fn stats_on_empty_store_is_all_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;

        let stats = manager.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversation_count, 0);
        assert_eq!(stats.memory_item_count, 0);
    }
}
