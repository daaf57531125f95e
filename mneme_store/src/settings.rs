//! The singleton `UserSettings` record (§3, §3.1).

use crate::types::UserSettings;
use crate::{MetadataStore, StoreError};
use mneme_entities::user_settings;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::Value as Json;
use tracing::instrument;
use uuid::Uuid;

/// The one and only settings row's fixed id (§3.1: "exactly one row ever
/// exists").
const SINGLETON_ID: Uuid = Uuid::nil();

/// The seven settings groups; `update_user_settings` merges into exactly one
/// of these per call (§3.1's `dict.update` semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsGroup {
    Voice,
    Personality,
    Privacy,
    Storage,
    Llm,
    Search,
    Memory,
}

fn default_personality() -> Json {
    serde_json::json!({
        "name": "Assistant",
        "style": "helpful",
        "formality": "neutral",
        "verbosity": "balanced",
        "empathy": "none",
        "humor": "none",
        "creativity": "none",
    })
}

fn default_llm() -> Json {
    serde_json::json!({
        "provider": "openai",
        "model": "gpt-4o-mini",
        "temperature": 0.7,
        "max_tokens": 1000,
        "use_local_llm": false,
        "local_model_path": "",
    })
}

fn default_memory() -> Json {
    serde_json::json!({
        "vector_db_path": "vectors",
        "sqlite_db_path": "personal_ai.db",
        "max_memory_items": 10_000,
        "context_window_size": 10,
        "search_limit": 100,
        "importance_weight": 0.10,
        "recency_weight": 0.25,
        "similarity_weight": 0.65,
    })
}

impl MetadataStore {
    /// Fetches the singleton settings row, creating it with defaults (§3.1)
    /// on first access.
    #[instrument(skip(self))]
    pub async fn get_user_settings(&self) -> Result<UserSettings, StoreError> {
        if let Some(model) = user_settings::Entity::find_by_id(SINGLETON_ID).one(&self.db).await? {
            return Ok(to_settings(model));
        }

        let now = chrono::Utc::now();
        let model = user_settings::ActiveModel {
            id: Set(SINGLETON_ID),
            voice: Set(serde_json::json!({})),
            personality: Set(default_personality()),
            privacy: Set(serde_json::json!({})),
            storage: Set(serde_json::json!({})),
            llm: Set(default_llm()),
            search: Set(serde_json::json!({})),
            memory: Set(default_memory()),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await?;
        Ok(to_settings(inserted))
    }

    /// Merges `patch` into `group`'s map (`dict.update` semantics: other keys
    /// in the group and every other group are untouched). Validates
    /// `memory.max_memory_items` into `[100, 1_000_000]` and
    /// `memory.context_window_size` into `[1, 100]` when present in the
    /// patch (§3.1).
    #[instrument(skip(self, patch))]
    pub async fn update_user_settings(&self, group: SettingsGroup, patch: Json) -> Result<UserSettings, StoreError> {
        if group == SettingsGroup::Memory {
            validate_memory_patch(&patch)?;
        }

        let current = self.get_user_settings().await?;
        let model = user_settings::Entity::find_by_id(SINGLETON_ID)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound("user settings".to_string()))?;

        let mut active: user_settings::ActiveModel = model.into();
        let merged = merge(group_value(&current, group), &patch);
        match group {
            SettingsGroup::Voice => active.voice = Set(merged),
            SettingsGroup::Personality => active.personality = Set(merged),
            SettingsGroup::Privacy => active.privacy = Set(merged),
            SettingsGroup::Storage => active.storage = Set(merged),
            SettingsGroup::Llm => active.llm = Set(merged),
            SettingsGroup::Search => active.search = Set(merged),
            SettingsGroup::Memory => active.memory = Set(merged),
        }
        active.updated_at = Set(chrono::Utc::now());

        let updated = active.update(&self.db).await?;
        Ok(to_settings(updated))
    }
}

fn group_value(settings: &UserSettings, group: SettingsGroup) -> &Json {
    match group {
        SettingsGroup::Voice => &settings.voice,
        SettingsGroup::Personality => &settings.personality,
        SettingsGroup::Privacy => &settings.privacy,
        SettingsGroup::Storage => &settings.storage,
        SettingsGroup::Llm => &settings.llm,
        SettingsGroup::Search => &settings.search,
        SettingsGroup::Memory => &settings.memory,
    }
}

/// Shallow `dict.update`: every key in `patch` overwrites the same key in
/// `base`; keys only in `base` survive untouched.
fn merge(base: &Json, patch: &Json) -> Json {
    let mut merged = base.clone();
    if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            merged_obj.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn validate_memory_patch(patch: &Json) -> Result<(), StoreError> {
    if let Some(max_items) = patch.get("max_memory_items").and_then(serde_json::Value::as_i64) {
        if !(100..=1_000_000).contains(&max_items) {
            return Err(StoreError::Validation(format!(
                "max_memory_items must be in 100..=1_000_000, got {max_items}"
            )));
        }
    }
    if let Some(window) = patch.get("context_window_size").and_then(serde_json::Value::as_i64) {
        if !(1..=100).contains(&window) {
            return Err(StoreError::Validation(format!(
                "context_window_size must be in 1..=100, got {window}"
            )));
        }
    }
    Ok(())
}

fn to_settings(model: user_settings::Model) -> UserSettings {
    UserSettings {
        id: model.id,
        voice: model.voice,
        personality: model.personality,
        privacy: model.privacy,
        storage: model.storage,
        llm: model.llm,
        search: model.search,
        memory: model.memory,
        updated_at: model.updated_at,
    }
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
    async fn first_access_creates_defaults() {
        let store = test_store().await;
        let settings = store.get_user_settings().await.unwrap();
        assert_eq!(settings.personality["style"], "helpful");
        assert_eq!(settings.memory["max_memory_items"], 10_000);
    }

    #[tokio::test]
    async fn update_merges_without_clobbering_other_keys() {
        let store = test_store().await;
        store.get_user_settings().await.unwrap();

        store
            .update_user_settings(SettingsGroup::Personality, serde_json::json!({"style": "formal"}))
            .await
            .unwrap();

        let settings = store.get_user_settings().await.unwrap();
        assert_eq!(settings.personality["style"], "formal");
        assert_eq!(settings.personality["formality"], "neutral");
    }

    #[tokio::test]
    async fn update_is_scoped_to_one_group() {
        let store = test_store().await;
        store.get_user_settings().await.unwrap();

        store
            .update_user_settings(SettingsGroup::Llm, serde_json::json!({"temperature": 0.2}))
            .await
            .unwrap();

        let settings = store.get_user_settings().await.unwrap();
        assert_eq!(settings.llm["temperature"], 0.2);
        assert_eq!(settings.memory["max_memory_items"], 10_000);
    }

    #[tokio::test]
    async fn out_of_range_max_memory_items_is_rejected() {
        let store = test_store().await;
        store.get_user_settings().await.unwrap();

        let result = store
            .update_user_settings(SettingsGroup::Memory, serde_json::json!({"max_memory_items": 10}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn out_of_range_context_window_size_is_rejected() {
        let store = test_store().await;
        store.get_user_settings().await.unwrap();

        let result = store
            .update_user_settings(SettingsGroup::Memory, serde_json::json!({"context_window_size": 0}))
            .await;
        assert!(result.is_err());
    }
}
