//! MemoryItem CRUD (§3, §4.3). Ranking, embedding, and vector-store
//! coordination live in `mneme_memory`; this module is the thin relational
//! layer it's built on.

use crate::convert::{content_hash, seal_content, unseal_content};
use crate::types::{MemoryFilter, MemoryItem};
use crate::{MetadataStore, StoreError};
use mneme_core::{new_id, Id, MemoryCategory};
use mneme_entities::memory_items;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::instrument;

const DEFAULT_IMPORTANCE: i32 = 1;

impl MetadataStore {
    /// Inserts a MemoryItem (§4.5.1 step 2). Validates `category` and
    /// `importance` (§3's fixed-set/range invariants); seals `content`.
    #[instrument(skip(self, content, metadata))]
    pub async fn create_memory_item(
        &self,
        content: &str,
        category: MemoryCategory,
        source_type: Option<String>,
        source_id: Option<String>,
        importance: Option<i32>,
        metadata: Option<Json>,
    ) -> Result<MemoryItem, StoreError> {
        let importance = importance.unwrap_or(DEFAULT_IMPORTANCE);
        if !(1..=5).contains(&importance) {
            return Err(StoreError::Validation(format!(
                "importance must be in 1..=5, got {importance}"
            )));
        }

        let hash = content_hash(category.as_str(), content);
        let sealed = seal_content(content, &self.key)?;
        let now = chrono::Utc::now();

        let model = memory_items::ActiveModel {
            id: Set(new_id()),
            content: Set(sealed),
            category: Set(category.as_str().to_string()),
            source_type: Set(source_type),
            source_id: Set(source_id),
            importance: Set(importance),
            content_hash: Set(hash),
            metadata: Set(metadata.unwrap_or_else(|| serde_json::json!({}))),
            created_at: Set(now),
        };
        let inserted = model.insert(&self.db).await?;
        to_memory_item(inserted, &self.key)
    }

    /// Looks up an active item by exact content hash, used by `mneme_memory`
    /// to implement the reinforcement-count dedup path (§4.5.5).
    pub async fn find_memory_item_by_hash(&self, hash: &str) -> Result<Option<MemoryItem>, StoreError> {
        let model = memory_items::Entity::find()
            .filter(memory_items::Column::ContentHash.eq(hash))
            .one(&self.db)
            .await?;
        model.map(|m| to_memory_item(m, &self.key)).transpose()
    }

    pub async fn get_memory_item(&self, id: Id) -> Result<MemoryItem, StoreError> {
        let model = memory_items::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("memory item {id}")))?;
        to_memory_item(model, &self.key)
    }

    /// Replaces `content` (and, if changed, recomputes the content hash) and
    /// optionally `metadata`. Does not touch `importance` — that is
    /// exclusively `mark_as_important`'s job.
    pub async fn update_memory_item_content(
        &self,
        id: Id,
        content: &str,
        metadata: Option<Json>,
    ) -> Result<MemoryItem, StoreError> {
        let model = memory_items::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("memory item {id}")))?;

        let category = model.category.clone();
        let mut active: memory_items::ActiveModel = model.into();
        active.content = Set(seal_content(content, &self.key)?);
        active.content_hash = Set(content_hash(&category, content));
        if let Some(metadata) = metadata {
            active.metadata = Set(metadata);
        }
        let updated = active.update(&self.db).await?;
        to_memory_item(updated, &self.key)
    }

    /// §4.5.4's `mark_as_important`; `level` validated in \[1,5\]. Permits
    /// downgrades (DESIGN.md open-question decision: §3's monotonicity
    /// clause binds automatic updates only).
    pub async fn mark_as_important(&self, id: Id, level: i32) -> Result<MemoryItem, StoreError> {
        if !(1..=5).contains(&level) {
            return Err(StoreError::Validation(format!("importance level must be in 1..=5, got {level}")));
        }
        let model = memory_items::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("memory item {id}")))?;
        let mut active: memory_items::ActiveModel = model.into();
        active.importance = Set(level);
        let updated = active.update(&self.db).await?;
        to_memory_item(updated, &self.key)
    }

    /// Bumps `metadata.reinforcement_count` by one (§4.5.5's dedup path).
    pub async fn increment_reinforcement_count(&self, id: Id) -> Result<MemoryItem, StoreError> {
        let model = memory_items::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("memory item {id}")))?;

        let mut metadata = model.metadata.clone();
        let current = metadata
            .get("reinforcement_count")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("reinforcement_count".to_string(), serde_json::json!(current + 1));
        }

        let mut active: memory_items::ActiveModel = model.into();
        active.metadata = Set(metadata);
        let updated = active.update(&self.db).await?;
        to_memory_item(updated, &self.key)
    }

    /// Cascading delete: metadata row only. The vector entry and embedding
    /// record are deleted by the caller (`mneme_memory`), which must roll
    /// the whole operation back if any of the three fails (§3).
    pub async fn delete_memory_item(&self, id: Id) -> Result<(), StoreError> {
        let result = memory_items::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("memory item {id}")));
        }
        Ok(())
    }

    /// Filtered, paginated listing; MemoryItems ordered by `created_at`
    /// descending (§4.3).
    pub async fn list_memory_items(&self, filter: &MemoryFilter, limit: u64, offset: u64) -> Result<Vec<MemoryItem>, StoreError> {
        let query = apply_filter(memory_items::Entity::find(), filter);
        let models = query
            .order_by_desc(memory_items::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        models.into_iter().map(|m| to_memory_item(m, &self.key)).collect()
    }

    pub async fn count_memory_items(&self, filter: &MemoryFilter) -> Result<u64, StoreError> {
        let query = apply_filter(memory_items::Entity::find(), filter);
        Ok(query.count(&self.db).await?)
    }

    /// `count_by_category` (§4.5.4, §8 property 5: must sum to
    /// `count_memories()`).
    pub async fn count_by_category(&self) -> Result<HashMap<MemoryCategory, u64>, StoreError> {
        let mut counts = HashMap::new();
        for category in MemoryCategory::all() {
            let filter = MemoryFilter {
                category: Some(category),
                ..MemoryFilter::default()
            };
            counts.insert(category, self.count_memory_items(&filter).await?);
        }
        Ok(counts)
    }
}

fn apply_filter(
    mut query: sea_orm::Select<memory_items::Entity>,
    filter: &MemoryFilter,
) -> sea_orm::Select<memory_items::Entity> {
    let mut condition = Condition::all();
    if let Some(category) = filter.category {
        condition = condition.add(memory_items::Column::Category.eq(category.as_str()));
    }
    if let Some(source_type) = &filter.source_type {
        condition = condition.add(memory_items::Column::SourceType.eq(source_type.clone()));
    }
    if let Some(source_id) = &filter.source_id {
        condition = condition.add(memory_items::Column::SourceId.eq(source_id.clone()));
    }
    if let Some(min_importance) = filter.min_importance {
        condition = condition.add(memory_items::Column::Importance.gte(min_importance));
    }
    query = query.filter(condition);
    query
}

fn to_memory_item(model: memory_items::Model, key: &mneme_crypto::Key) -> Result<MemoryItem, StoreError> {
    let category = MemoryCategory::from_str(&model.category)
        .map_err(|e| StoreError::Validation(e.to_string()))?;
    let content = unseal_content(&model.content, key)?;
    Ok(MemoryItem {
        id: model.id,
        content,
        category,
        source_type: model.source_type,
        source_id: model.source_id,
        importance: model.importance,
        content_hash: model.content_hash,
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
    async fn store_and_fetch_round_trips_content() {
        let store = test_store().await;
        let created = store
            .create_memory_item("my dog's name is buddy", MemoryCategory::UserDefined, None, None, Some(3), None)
            .await
            .unwrap();

        let fetched = store.get_memory_item(created.id).await.unwrap();
        assert_eq!(fetched.content, "my dog's name is buddy");
        assert_eq!(fetched.importance, 3);
    }

    #[tokio::test]
    async fn invalid_importance_is_rejected() {
        let store = test_store().await;
        let result = store
            .create_memory_item("x", MemoryCategory::Important, None, None, Some(6), None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mark_as_important_permits_downgrade() {
        let store = test_store().await;
        let created = store
            .create_memory_item("x", MemoryCategory::Important, None, None, Some(5), None)
            .await
            .unwrap();

        let updated = store.mark_as_important(created.id, 1).await.unwrap();
        assert_eq!(updated.importance, 1);
    }

    #[tokio::test]
    async fn mark_as_important_rejects_out_of_range() {
        let store = test_store().await;
        let created = store
            .create_memory_item("x", MemoryCategory::Important, None, None, None, None)
            .await
            .unwrap();

        assert!(store.mark_as_important(created.id, 0).await.is_err());
        assert!(store.mark_as_important(created.id, 6).await.is_err());
    }

    #[tokio::test]
    async fn count_by_category_sums_to_count_memories() {
        let store = test_store().await;
        store.create_memory_item("a", MemoryCategory::Document, None, None, None, None).await.unwrap();
        store.create_memory_item("b", MemoryCategory::Web, None, None, None, None).await.unwrap();
        store.create_memory_item("c", MemoryCategory::Web, None, None, None, None).await.unwrap();

        let total = store.count_memory_items(&MemoryFilter::default()).await.unwrap();
        let by_category = store.count_by_category().await.unwrap();
        let sum: u64 = by_category.values().sum();

        assert_eq!(total, 3);
        assert_eq!(sum, total);
    }
}
