//! VectorEmbeddingRecord: the crosswalk between source items and vector
//! store entries (§3). `mneme_memory` owns coordinating these rows with
//! actual vector-store writes; this module is the thin relational layer.

use crate::convert::parse_source_type;
use crate::types::{VectorEmbeddingRecord, VectorSourceType};
use crate::{MetadataStore, StoreError};
use mneme_core::{new_id, Id};
use mneme_entities::vector_embedding_records;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::instrument;

impl MetadataStore {
    /// Inserts a crosswalk row with `indexed=false`; the caller flips it via
    /// [`Self::mark_vector_indexed`] once the vector-store write succeeds
    /// (§3's "marks whether the corresponding vector was successfully
    /// written").
    #[instrument(skip(self))]
    pub async fn create_vector_record(
        &self,
        source_type: VectorSourceType,
        source_id: Id,
        embedding_model: &str,
    ) -> Result<VectorEmbeddingRecord, StoreError> {
        let model = vector_embedding_records::ActiveModel {
            id: Set(new_id()),
            source_type: Set(source_type.as_str().to_string()),
            source_id: Set(source_id),
            embedding_model: Set(embedding_model.to_string()),
            indexed: Set(false),
            created_at: Set(chrono::Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        to_record(inserted)
    }

    /// `(source_type, source_id)` is unique (§3); this is the lookup that
    /// invariant supports.
    pub async fn find_vector_record_by_source(
        &self,
        source_type: VectorSourceType,
        source_id: Id,
    ) -> Result<Option<VectorEmbeddingRecord>, StoreError> {
        let model = vector_embedding_records::Entity::find()
            .filter(vector_embedding_records::Column::SourceType.eq(source_type.as_str()))
            .filter(vector_embedding_records::Column::SourceId.eq(source_id))
            .one(&self.db)
            .await?;
        model.map(to_record).transpose()
    }

    /// §3.1's discrete `mark_indexed()` state transition.
    pub async fn mark_vector_indexed(&self, id: Id) -> Result<VectorEmbeddingRecord, StoreError> {
        let model = vector_embedding_records::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("vector embedding record {id}")))?;
        let mut active: vector_embedding_records::ActiveModel = model.into();
        active.indexed = Set(true);
        let updated = active.update(&self.db).await?;
        to_record(updated)
    }

    pub async fn delete_vector_record(&self, id: Id) -> Result<(), StoreError> {
        let result = vector_embedding_records::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("vector embedding record {id}")));
        }
        Ok(())
    }

    pub async fn delete_vector_record_by_source(
        &self,
        source_type: VectorSourceType,
        source_id: Id,
    ) -> Result<(), StoreError> {
        vector_embedding_records::Entity::delete_many()
            .filter(vector_embedding_records::Column::SourceType.eq(source_type.as_str()))
            .filter(vector_embedding_records::Column::SourceId.eq(source_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

fn to_record(model: vector_embedding_records::Model) -> Result<VectorEmbeddingRecord, StoreError> {
    Ok(VectorEmbeddingRecord {
        id: model.id,
        source_type: parse_source_type(&model.source_type)?,
        source_id: model.source_id,
        embedding_model: model.embedding_model,
        indexed: model.indexed,
        created_at: model.created_at,
    })
}
