use sea_orm::entity::prelude::*;

/// Singleton settings record (§3, §3.1): exactly one row ever exists, its
/// `id` fixed at creation. Seven grouped JSON maps, each merged
/// per-group (not replaced wholesale) on update.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub voice: Json,
    pub personality: Json,
    pub privacy: Json,
    pub storage: Json,
    pub llm: Json,
    pub search: Json,
    pub memory: Json,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
