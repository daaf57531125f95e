//! Conversations and their owned Messages (§3, §4.3).

use crate::convert::{seal_message_content, unseal_message_content};
use crate::types::{Conversation, Message};
use crate::{MetadataStore, StoreError};
use mneme_core::{new_id, Id, Role};
use mneme_entities::conversations;
use mneme_entities::messages;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use tracing::{info, instrument};

impl MetadataStore {
    #[instrument(skip(self))]
    pub async fn create_conversation(&self, title: Option<String>) -> Result<Conversation, StoreError> {
        let now = chrono::Utc::now();
        let model = conversations::ActiveModel {
            id: Set(new_id()),
            title: Set(title),
            summary: Set(None),
            metadata: Set(serde_json::json!({})),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await?;
        info!(conversation_id = %inserted.id, "conversation created");
        Ok(to_conversation(inserted))
    }

    pub async fn get_conversation(&self, id: Id) -> Result<Conversation, StoreError> {
        let model = conversations::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))?;
        Ok(to_conversation(model))
    }

    /// Conversations ordered by `updated_at` descending (§4.3).
    pub async fn list_conversations(&self, limit: u64, offset: u64) -> Result<Vec<Conversation>, StoreError> {
        let models = conversations::Entity::find()
            .order_by_desc(conversations::Column::UpdatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(to_conversation).collect())
    }

    pub async fn update_conversation_summary(&self, id: Id, summary: String) -> Result<Conversation, StoreError> {
        let model = conversations::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))?;

        let mut active: conversations::ActiveModel = model.into();
        active.summary = Set(Some(summary));
        active.updated_at = Set(chrono::Utc::now());
        let updated = active.update(&self.db).await?;
        Ok(to_conversation(updated))
    }

    /// Deletes the conversation and every Message with this `conversation_id`
    /// (§3's composition/cascade invariant). Does not cascade further to
    /// MemoryItems sourced from those messages (DESIGN.md open-question
    /// decision).
    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, id: Id) -> Result<(), StoreError> {
        messages::Entity::delete_many()
            .filter(messages::Column::ConversationId.eq(id))
            .exec(&self.db)
            .await?;
        let result = conversations::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("conversation {id}")));
        }
        info!(conversation_id = %id, "conversation and its messages deleted");
        Ok(())
    }

    /// Appends a message, sealing its content (system-role excepted), and
    /// bumps the parent conversation's `updated_at` (§3's invariant).
    #[instrument(skip(self, content))]
    pub async fn add_message(&self, conversation_id: Id, role: Role, content: &str) -> Result<Message, StoreError> {
        let sealed = seal_message_content(content, role, &self.key)?;
        let now = chrono::Utc::now();

        let model = messages::ActiveModel {
            id: Set(new_id()),
            conversation_id: Set(conversation_id),
            role: Set(role.as_str().to_string()),
            content: Set(sealed),
            metadata: Set(serde_json::json!({})),
            created_at: Set(now),
        };
        let inserted = model.insert(&self.db).await?;

        let conversation = conversations::Entity::find_by_id(conversation_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("conversation {conversation_id}")))?;
        let mut active: conversations::ActiveModel = conversation.into();
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        to_message(inserted, &self.key)
    }

    /// Messages ascending by `created_at` within the conversation (§6).
    pub async fn get_conversation_history(
        &self,
        conversation_id: Id,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Message>, StoreError> {
        let models = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_asc(messages::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        models.into_iter().map(|m| to_message(m, &self.key)).collect()
    }
}

fn to_conversation(model: conversations::Model) -> Conversation {
    Conversation {
        id: model.id,
        title: model.title,
        summary: model.summary,
        metadata: model.metadata,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn to_message(model: messages::Model, key: &mneme_crypto::Key) -> Result<Message, StoreError> {
    let role = crate::convert::parse_role(&model.role)?;
    let content = unseal_message_content(&model.content, role, key)?;
    Ok(Message {
        id: model.id,
        conversation_id: model.conversation_id,
        role,
        content,
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
    async fn create_and_fetch_conversation() {
        let store = test_store().await;
        let created = store.create_conversation(Some("Trip planning".into())).await.unwrap();
        let fetched = store.get_conversation(created.id).await.unwrap();
        assert_eq!(fetched.title.as_deref(), Some("Trip planning"));
    }

    #[tokio::test]
    async fn add_message_bumps_conversation_updated_at() {
        let store = test_store().await;
        let conversation = store.create_conversation(None).await.unwrap();
        let before = conversation.updated_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.add_message(conversation.id, Role::User, "hello").await.unwrap();

        let after = store.get_conversation(conversation.id).await.unwrap();
        assert!(after.updated_at >= before);
    }

    #[tokio::test]
    async fn message_round_trips_through_seal_unseal() {
        let store = test_store().await;
        let conversation = store.create_conversation(None).await.unwrap();
        let saved = store.add_message(conversation.id, Role::User, "my dog's name is buddy").await.unwrap();
        assert_eq!(saved.content, "my dog's name is buddy");

        let history = store.get_conversation_history(conversation.id, 10, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "my dog's name is buddy");
    }

    #[tokio::test]
    async fn delete_conversation_cascades_to_messages() {
        let store = test_store().await;
        let conversation = store.create_conversation(None).await.unwrap();
        store.add_message(conversation.id, Role::User, "hi").await.unwrap();
        store.add_message(conversation.id, Role::Assistant, "hello").await.unwrap();

        store.delete_conversation(conversation.id).await.unwrap();

        let history = store.get_conversation_history(conversation.id, 10, 0).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn history_is_ascending_by_created_at() {
        let store = test_store().await;
        let conversation = store.create_conversation(None).await.unwrap();
        store.add_message(conversation.id, Role::User, "first").await.unwrap();
        store.add_message(conversation.id, Role::Assistant, "second").await.unwrap();

        let history = store.get_conversation_history(conversation.id, 10, 0).await.unwrap();
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
    }
}
