use sea_orm::entity::prelude::*;

/// Crosswalk between source items and vector-store entries (§3). Invariant:
/// `(source_type, source_id)` is unique — enforced by `mneme_store` via a
/// unique index created at bootstrap.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vector_embedding_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// One of `memory_item` / `document_chunk` / `web_content_chunk`.
    pub source_type: String,
    pub source_id: Uuid,
    pub embedding_model: String,
    pub indexed: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
