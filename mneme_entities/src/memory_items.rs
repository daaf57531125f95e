use sea_orm::entity::prelude::*;

/// The unit of retrievable knowledge (§3). Required indexes: `(category)`,
/// `(source_type, source_id)`, `(importance)`, `(created_at)` — created by
/// `mneme_store`'s bootstrap.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "memory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub content: String,
    /// One of the fixed `MemoryCategory` variants; validated in
    /// `mneme_memory`/`mneme_store`, not at the database layer.
    pub category: String,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    /// 1..=5, default 1 (§3, §3.1).
    pub importance: i32,
    /// `sha256("{category}:{content}")`, used for exact-content dedup (§4.5.5).
    pub content_hash: String,
    pub metadata: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
