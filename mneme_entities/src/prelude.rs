pub use super::conversations::Entity as Conversations;
pub use super::document_chunks::Entity as DocumentChunks;
pub use super::documents::Entity as Documents;
pub use super::memory_items::Entity as MemoryItems;
pub use super::messages::Entity as Messages;
pub use super::user_settings::Entity as UserSettings;
pub use super::vector_embedding_records::Entity as VectorEmbeddingRecords;
pub use super::web_content_chunks::Entity as WebContentChunks;
pub use super::web_pages::Entity as WebPages;
