use sea_orm::entity::prelude::*;

/// An ingested web page (§3), analogous to [`super::documents::Model`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "web_pages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub processed: bool,
    pub metadata: Json,
    pub created_at: DateTimeUtc,
    pub last_accessed: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::web_content_chunks::Entity")]
    Chunks,
}

impl Related<super::web_content_chunks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chunks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
