use crate::StoreError;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

/// Build a `CREATE TABLE` statement from the entity definition and
/// tolerate "already exists" on repeated startup, since this runs on
/// every `MetadataStore::open`.
fn is_table_already_exists_error(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("table") && msg.contains("already exists")
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), StoreError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let stmt = schema.create_table_from_entity(entity);

    match db.execute_unprepared(&backend.build(&stmt).to_string()).await {
        Ok(_) => Ok(()),
        Err(e) if is_table_already_exists_error(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn create_index(db: &DatabaseConnection, stmt: &str) -> Result<(), StoreError> {
    db.execute_unprepared(stmt).await?;
    Ok(())
}

pub(crate) async fn create_all_tables(db: &DatabaseConnection) -> Result<(), StoreError> {
    create_table(db, mneme_entities::prelude::Conversations).await?;
    create_table(db, mneme_entities::prelude::Messages).await?;
    create_table(db, mneme_entities::prelude::MemoryItems).await?;
    create_table(db, mneme_entities::prelude::Documents).await?;
    create_table(db, mneme_entities::prelude::DocumentChunks).await?;
    create_table(db, mneme_entities::prelude::WebPages).await?;
    create_table(db, mneme_entities::prelude::WebContentChunks).await?;
    create_table(db, mneme_entities::prelude::UserSettings).await?;
    create_table(db, mneme_entities::prelude::VectorEmbeddingRecords).await?;

    // Required indexes (§4.3). `CREATE INDEX IF NOT EXISTS` is portable
    // across repeated bootstraps on the same file.
    create_index(
        db,
        "CREATE INDEX IF NOT EXISTS idx_messages_conv_created ON messages (conversation_id, created_at);",
    )
    .await?;
    create_index(
        db,
        "CREATE INDEX IF NOT EXISTS idx_memory_items_category ON memory_items (category);",
    )
    .await?;
    create_index(
        db,
        "CREATE INDEX IF NOT EXISTS idx_memory_items_source ON memory_items (source_type, source_id);",
    )
    .await?;
    create_index(
        db,
        "CREATE INDEX IF NOT EXISTS idx_memory_items_importance ON memory_items (importance);",
    )
    .await?;
    create_index(
        db,
        "CREATE INDEX IF NOT EXISTS idx_memory_items_created ON memory_items (created_at);",
    )
    .await?;
    create_index(
        db,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_vector_records_source ON vector_embedding_records (source_type, source_id);",
    )
    .await?;

    info!("metadata store schema bootstrapped");
    Ok(())
}
