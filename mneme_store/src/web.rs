//! Web pages and their owned WebContentChunks (§3, §3.1, §4.3), analogous to
//! [`crate::documents`].

use crate::convert::{seal_content, unseal_content};
use crate::types::{WebContentChunk, WebPage};
use crate::{MetadataStore, StoreError};
use mneme_core::{new_id, Id};
use mneme_entities::{web_content_chunks, web_pages};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value as Json;
use tracing::{info, instrument};

impl MetadataStore {
    #[instrument(skip(self))]
    pub async fn create_web_page(&self, url: &str, title: Option<String>) -> Result<WebPage, StoreError> {
        let now = chrono::Utc::now();
        let model = web_pages::ActiveModel {
            id: Set(new_id()),
            url: Set(url.to_string()),
            title: Set(title),
            processed: Set(false),
            metadata: Set(serde_json::json!({})),
            created_at: Set(now),
            last_accessed: Set(now),
        };
        let inserted = model.insert(&self.db).await?;
        info!(web_page_id = %inserted.id, "web page registered");
        Ok(to_web_page(inserted))
    }

    pub async fn get_web_page(&self, id: Id) -> Result<WebPage, StoreError> {
        let model = web_pages::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("web page {id}")))?;
        Ok(to_web_page(model))
    }

    pub async fn mark_web_page_processed(&self, id: Id) -> Result<WebPage, StoreError> {
        let model = web_pages::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("web page {id}")))?;
        let mut active: web_pages::ActiveModel = model.into();
        active.processed = Set(true);
        let updated = active.update(&self.db).await?;
        Ok(to_web_page(updated))
    }

    /// Bumps `last_accessed` (§3.1), distinct from `mark_web_page_processed`.
    pub async fn touch_web_page(&self, id: Id) -> Result<WebPage, StoreError> {
        let model = web_pages::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("web page {id}")))?;
        let mut active: web_pages::ActiveModel = model.into();
        active.last_accessed = Set(chrono::Utc::now());
        let updated = active.update(&self.db).await?;
        Ok(to_web_page(updated))
    }

    #[instrument(skip(self))]
    pub async fn delete_web_page(&self, id: Id) -> Result<(), StoreError> {
        web_content_chunks::Entity::delete_many()
            .filter(web_content_chunks::Column::WebPageId.eq(id))
            .exec(&self.db)
            .await?;
        let result = web_pages::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("web page {id}")));
        }
        info!(web_page_id = %id, "web page and its chunks deleted");
        Ok(())
    }

    pub async fn list_web_pages(&self, limit: u64, offset: u64) -> Result<Vec<WebPage>, StoreError> {
        let models = web_pages::Entity::find()
            .order_by_desc(web_pages::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(to_web_page).collect())
    }

    #[instrument(skip(self, content, metadata))]
    pub async fn create_web_content_chunk(
        &self,
        web_page_id: Id,
        chunk_index: i32,
        content: &str,
        metadata: Option<Json>,
    ) -> Result<WebContentChunk, StoreError> {
        let sealed = seal_content(content, &self.key)?;
        let model = web_content_chunks::ActiveModel {
            id: Set(new_id()),
            web_page_id: Set(web_page_id),
            chunk_index: Set(chunk_index),
            content: Set(sealed),
            metadata: Set(metadata.unwrap_or_else(|| serde_json::json!({}))),
            created_at: Set(chrono::Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        to_web_content_chunk(inserted, &self.key)
    }

    pub async fn list_web_content_chunks(&self, web_page_id: Id) -> Result<Vec<WebContentChunk>, StoreError> {
        let models = web_content_chunks::Entity::find()
            .filter(web_content_chunks::Column::WebPageId.eq(web_page_id))
            .order_by_asc(web_content_chunks::Column::ChunkIndex)
            .all(&self.db)
            .await?;
        models.into_iter().map(|m| to_web_content_chunk(m, &self.key)).collect()
    }
}

fn to_web_page(model: web_pages::Model) -> WebPage {
    WebPage {
        id: model.id,
        url: model.url,
        title: model.title,
        processed: model.processed,
        metadata: model.metadata,
        created_at: model.created_at,
        last_accessed: model.last_accessed,
    }
}

fn to_web_content_chunk(model: web_content_chunks::Model, key: &mneme_crypto::Key) -> Result<WebContentChunk, StoreError> {
    Ok(WebContentChunk {
        id: model.id,
        web_page_id: model.web_page_id,
        chunk_index: model.chunk_index,
        content: unseal_content(&model.content, key)?,
        metadata: model.metadata,
        created_at: model.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_crypto::Key;
    use sea_orm::Database;

    async fn test_store() -> MetadataStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        MetadataStore::from_connection(db, Key::generate_random()).await.unwrap()
    }

    #[tokio::test]
    async fn create_web_page_and_chunks_round_trip() {
        let store = test_store().await;
        let page = store.create_web_page("https://example.com", Some("Example".into())).await.unwrap();
        store.create_web_content_chunk(page.id, 0, "hello web", None).await.unwrap();

        let chunks = store.list_web_content_chunks(page.id).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello web");
    }

    #[tokio::test]
    async fn touch_bumps_last_accessed_independent_of_processed() {
        let store = test_store().await;
        let page = store.create_web_page("https://example.com", None).await.unwrap();
        let before = page.last_accessed;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let touched = store.touch_web_page(page.id).await.unwrap();

        assert!(touched.last_accessed >= before);
        assert!(!touched.processed);
    }

    #[tokio::test]
    async fn delete_web_page_cascades_to_chunks() {
        let store = test_store().await;
        let page = store.create_web_page("https://example.com", None).await.unwrap();
        store.create_web_content_chunk(page.id, 0, "chunk", None).await.unwrap();

        store.delete_web_page(page.id).await.unwrap();

        let chunks = store.list_web_content_chunks(page.id).await.unwrap();
        assert!(chunks.is_empty());
    }
}
