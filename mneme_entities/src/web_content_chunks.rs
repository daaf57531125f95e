use sea_orm::entity::prelude::*;

/// A chunk of a [`super::web_pages::Model`]; `chunk_index` unique per parent.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "web_content_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub web_page_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub metadata: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::web_pages::Entity",
        from = "Column::WebPageId",
        to = "super::web_pages::Column::Id",
        on_delete = "Cascade"
    )]
    WebPage,
}

impl Related<super::web_pages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebPage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
