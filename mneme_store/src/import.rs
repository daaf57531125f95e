//! Explicit-id inserts and bulk clears, used by `mneme_storage`'s
//! export/import (§4.9) to round-trip rows under their original ids — the
//! `create_*` functions in the sibling modules always mint a fresh id via
//! [`mneme_core::new_id`], which a restore/import must not do.

use crate::convert::{seal_content, seal_message_content};
use crate::types::{Conversation, Document, DocumentChunk, MemoryItem, Message, VectorEmbeddingRecord, WebContentChunk, WebPage};
use crate::{MetadataStore, StoreError};
use mneme_entities::{
    conversations, document_chunks, documents, memory_items, messages, vector_embedding_records,
    web_content_chunks, web_pages,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::instrument;

impl MetadataStore {
    /// Inserts a conversation under its existing `id`. Errors if a row with
    /// that id already exists; callers doing a merge-mode import should
    /// check with [`Self::get_conversation`] first.
    #[instrument(skip(self, conversation))]
    pub async fn put_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let model = conversations::ActiveModel {
            id: Set(conversation.id),
            title: Set(conversation.title.clone()),
            summary: Set(conversation.summary.clone()),
            metadata: Set(conversation.metadata.clone()),
            created_at: Set(conversation.created_at),
            updated_at: Set(conversation.updated_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    pub async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let sealed = seal_message_content(&message.content, message.role, &self.key)?;
        let model = messages::ActiveModel {
            id: Set(message.id),
            conversation_id: Set(message.conversation_id),
            role: Set(message.role.as_str().to_string()),
            content: Set(sealed),
            metadata: Set(message.metadata.clone()),
            created_at: Set(message.created_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, item))]
    pub async fn put_memory_item(&self, item: &MemoryItem) -> Result<(), StoreError> {
        let sealed = seal_content(&item.content, &self.key)?;
        let model = memory_items::ActiveModel {
            id: Set(item.id),
            content: Set(sealed),
            category: Set(item.category.as_str().to_string()),
            source_type: Set(item.source_type.clone()),
            source_id: Set(item.source_id.clone()),
            importance: Set(item.importance),
            content_hash: Set(item.content_hash.clone()),
            metadata: Set(item.metadata.clone()),
            created_at: Set(item.created_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, document))]
    pub async fn put_document(&self, document: &Document) -> Result<(), StoreError> {
        let model = documents::ActiveModel {
            id: Set(document.id),
            filename: Set(document.filename.clone()),
            file_type: Set(document.file_type.clone()),
            storage_path: Set(document.storage_path.clone()),
            processed: Set(document.processed),
            summary: Set(document.summary.clone()),
            metadata: Set(document.metadata.clone()),
            created_at: Set(document.created_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, chunk))]
    pub async fn put_document_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        let sealed = seal_content(&chunk.content, &self.key)?;
        let model = document_chunks::ActiveModel {
            id: Set(chunk.id),
            document_id: Set(chunk.document_id),
            chunk_index: Set(chunk.chunk_index),
            content: Set(sealed),
            page_number: Set(chunk.page_number),
            metadata: Set(chunk.metadata.clone()),
            created_at: Set(chunk.created_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, page))]
    pub async fn put_web_page(&self, page: &WebPage) -> Result<(), StoreError> {
        let model = web_pages::ActiveModel {
            id: Set(page.id),
            url: Set(page.url.clone()),
            title: Set(page.title.clone()),
            processed: Set(page.processed),
            metadata: Set(page.metadata.clone()),
            created_at: Set(page.created_at),
            last_accessed: Set(page.last_accessed),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, chunk))]
    pub async fn put_web_content_chunk(&self, chunk: &WebContentChunk) -> Result<(), StoreError> {
        let sealed = seal_content(&chunk.content, &self.key)?;
        let model = web_content_chunks::ActiveModel {
            id: Set(chunk.id),
            web_page_id: Set(chunk.web_page_id),
            chunk_index: Set(chunk.chunk_index),
            content: Set(sealed),
            metadata: Set(chunk.metadata.clone()),
            created_at: Set(chunk.created_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, record))]
    pub async fn put_vector_embedding_record(&self, record: &VectorEmbeddingRecord) -> Result<(), StoreError> {
        let model = vector_embedding_records::ActiveModel {
            id: Set(record.id),
            source_type: Set(record.source_type.as_str().to_string()),
            source_id: Set(record.source_id),
            embedding_model: Set(record.embedding_model.clone()),
            indexed: Set(record.indexed),
            created_at: Set(record.created_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    /// Deletes every conversation and message. Used by replace-mode import
    /// before reinserting an export's contents (§4.9).
    pub async fn clear_conversations(&self) -> Result<(), StoreError> {
        messages::Entity::delete_many().exec(&self.db).await?;
        conversations::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }

    pub async fn clear_memory_items(&self) -> Result<(), StoreError> {
        memory_items::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }

    pub async fn clear_documents(&self) -> Result<(), StoreError> {
        document_chunks::Entity::delete_many().exec(&self.db).await?;
        documents::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }

    pub async fn clear_web_pages(&self) -> Result<(), StoreError> {
        web_content_chunks::Entity::delete_many().exec(&self.db).await?;
        web_pages::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }

    pub async fn clear_vector_embedding_records(&self) -> Result<(), StoreError> {
        vector_embedding_records::Entity::delete_many().exec(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_core::{new_id, MemoryCategory, Role};
    use mneme_crypto::Key;
    use sea_orm::Database;

    async fn test_store() -> MetadataStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        MetadataStore::from_connection(db, Key::generate_random()).await.unwrap()
    }

    #[tokio::test]
    async fn put_conversation_preserves_the_supplied_id() {
        let store = test_store().await;
        let conversation = Conversation {
            id: new_id(),
            title: Some("restored".into()),
            summary: None,
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.put_conversation(&conversation).await.unwrap();

        let fetched = store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(fetched.id, conversation.id);
        assert_eq!(fetched.title.as_deref(), Some("restored"));
    }

    #[tokio::test]
    async fn put_message_reseals_content_under_this_stores_key() {
        let store = test_store().await;
        let conversation = store.create_conversation(None).await.unwrap();
        let message = Message {
            id: new_id(),
            conversation_id: conversation.id,
            role: Role::User,
            content: "my dog's name is buddy".into(),
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
        };
        store.put_message(&message).await.unwrap();

        let history = store.get_conversation_history(conversation.id, 10, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "my dog's name is buddy");
        assert_eq!(history[0].id, message.id);
    }

    #[tokio::test]
    async fn put_memory_item_preserves_id_and_content_hash() {
        let store = test_store().await;
        let item = MemoryItem {
            id: new_id(),
            content: "likes hiking".into(),
            category: MemoryCategory::UserDefined,
            source_type: None,
            source_id: None,
            importance: 2,
            content_hash: "deadbeef".into(),
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
        };
        store.put_memory_item(&item).await.unwrap();

        let fetched = store.get_memory_item(item.id).await.unwrap();
        assert_eq!(fetched.content_hash, "deadbeef");
        assert_eq!(fetched.content, "likes hiking");
    }

    #[tokio::test]
    async fn clear_conversations_removes_conversations_and_messages() {
        let store = test_store().await;
        let conversation = store.create_conversation(None).await.unwrap();
        store.add_message(conversation.id, Role::User, "hi").await.unwrap();

        store.clear_conversations().await.unwrap();

        assert!(store.get_conversation(conversation.id).await.is_err());
        let history = store.get_conversation_history(conversation.id, 10, 0).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn clear_memory_items_empties_the_table() {
        let store = test_store().await;
        store.create_memory_item("a", MemoryCategory::Document, None, None, None, None).await.unwrap();
        store.create_memory_item("b", MemoryCategory::Web, None, None, None, None).await.unwrap();

        store.clear_memory_items().await.unwrap();

        let total = store.count_memory_items(&crate::MemoryFilter::default()).await.unwrap();
        assert_eq!(total, 0);
    }
}
