use sea_orm::entity::prelude::*;

/// A single conversation turn (§3). `content` is sealed at rest for every
/// role except `system` (§4.3); the sealed/plaintext distinction is handled
/// by `mneme_store`, not modeled here — this column always holds whatever
/// the store wrote to it.
/// Required index: `(conversation_id, created_at)` — created explicitly by
/// `mneme_store`'s bootstrap alongside table creation, since sea-orm's
/// `DeriveEntityModel` has no declarative secondary-index attribute.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// One of `user` / `assistant` / `system` (§3); validated by `mneme_store`,
    /// not by a database-level enum, keeping validation in application code
    /// rather than the schema.
    pub role: String,
    pub content: String,
    pub metadata: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::conversations::Entity",
        from = "Column::ConversationId",
        to = "super::conversations::Column::Id",
        on_delete = "Cascade"
    )]
    Conversation,
}

impl Related<super::conversations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
