//! Documents and their owned DocumentChunks (§3, §3.1, §4.3).

use crate::convert::{seal_content, unseal_content};
use crate::types::{Document, DocumentChunk};
use crate::{MetadataStore, StoreError};
use mneme_core::{new_id, Id};
use mneme_entities::{document_chunks, documents};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value as Json;
use tracing::{info, instrument};

impl MetadataStore {
    /// Registers a document the core never parses itself (§1, §6): the
    /// collaborator supplies `filename`/`file_type`/`storage_path` up front;
    /// chunks arrive afterwards via [`Self::create_document_chunk`].
    #[instrument(skip(self))]
    pub async fn create_document(
        &self,
        filename: &str,
        file_type: &str,
        storage_path: &str,
    ) -> Result<Document, StoreError> {
        let model = documents::ActiveModel {
            id: Set(new_id()),
            filename: Set(filename.to_string()),
            file_type: Set(file_type.to_string()),
            storage_path: Set(storage_path.to_string()),
            processed: Set(false),
            summary: Set(None),
            metadata: Set(serde_json::json!({})),
            created_at: Set(chrono::Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        info!(document_id = %inserted.id, "document registered");
        Ok(to_document(inserted))
    }

    pub async fn get_document(&self, id: Id) -> Result<Document, StoreError> {
        let model = documents::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        Ok(to_document(model))
    }

    /// Flips `processed` to `true` and optionally records a summary (§3.1),
    /// once every chunk has been ingested into memory.
    pub async fn mark_document_processed(&self, id: Id, summary: Option<String>) -> Result<Document, StoreError> {
        let model = documents::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        let mut active: documents::ActiveModel = model.into();
        active.processed = Set(true);
        if let Some(summary) = summary {
            active.summary = Set(Some(summary));
        }
        let updated = active.update(&self.db).await?;
        Ok(to_document(updated))
    }

    /// Deletes the document and every chunk with this `document_id` (§3's
    /// composition invariant).
    #[instrument(skip(self))]
    pub async fn delete_document(&self, id: Id) -> Result<(), StoreError> {
        document_chunks::Entity::delete_many()
            .filter(document_chunks::Column::DocumentId.eq(id))
            .exec(&self.db)
            .await?;
        let result = documents::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("document {id}")));
        }
        info!(document_id = %id, "document and its chunks deleted");
        Ok(())
    }

    pub async fn list_documents(&self, limit: u64, offset: u64) -> Result<Vec<Document>, StoreError> {
        let models = documents::Entity::find()
            .order_by_desc(documents::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(to_document).collect())
    }

    /// Inserts a chunk, sealing its content (§4.3). `chunk_index` is unique
    /// per parent document; the caller owns assigning it.
    #[instrument(skip(self, content, metadata))]
    pub async fn create_document_chunk(
        &self,
        document_id: Id,
        chunk_index: i32,
        content: &str,
        page_number: Option<i32>,
        metadata: Option<Json>,
    ) -> Result<DocumentChunk, StoreError> {
        let sealed = seal_content(content, &self.key)?;
        let model = document_chunks::ActiveModel {
            id: Set(new_id()),
            document_id: Set(document_id),
            chunk_index: Set(chunk_index),
            content: Set(sealed),
            page_number: Set(page_number),
            metadata: Set(metadata.unwrap_or_else(|| serde_json::json!({}))),
            created_at: Set(chrono::Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        to_document_chunk(inserted, &self.key)
    }

    /// Chunks of a document, ordered by `chunk_index` ascending.
    pub async fn list_document_chunks(&self, document_id: Id) -> Result<Vec<DocumentChunk>, StoreError> {
        let models = document_chunks::Entity::find()
            .filter(document_chunks::Column::DocumentId.eq(document_id))
            .order_by_asc(document_chunks::Column::ChunkIndex)
            .all(&self.db)
            .await?;
        models.into_iter().map(|m| to_document_chunk(m, &self.key)).collect()
    }

    pub async fn get_document_chunk(&self, id: Id) -> Result<DocumentChunk, StoreError> {
        let model = document_chunks::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("document chunk {id}")))?;
        to_document_chunk(model, &self.key)
    }
}

fn to_document(model: documents::Model) -> Document {
    Document {
        id: model.id,
        filename: model.filename,
        file_type: model.file_type,
        storage_path: model.storage_path,
        processed: model.processed,
        summary: model.summary,
        metadata: model.metadata,
        created_at: model.created_at,
    }
}

fn to_document_chunk(model: document_chunks::Model, key: &mneme_crypto::Key) -> Result<DocumentChunk, StoreError> {
    Ok(DocumentChunk {
        id: model.id,
        document_id: model.document_id,
        chunk_index: model.chunk_index,
        content: unseal_content(&model.content, key)?,
        page_number: model.page_number,
        metadata: model.metadata,
        created_at: model.created_at,
    })
}
