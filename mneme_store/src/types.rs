use chrono::{DateTime, Utc};
use mneme_core::{Id, MemoryCategory, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Plaintext-facing view of a conversation; content fields have already
/// been unsealed by the store. Serializable so `mneme_storage` can write it
/// straight into an export/backup manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Id,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub conversation_id: Id,
    pub role: Role,
    pub content: String,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Id,
    pub content: String,
    pub category: MemoryCategory,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub importance: i32,
    pub content_hash: String,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Id,
    pub filename: String,
    pub file_type: String,
    pub storage_path: String,
    pub processed: bool,
    pub summary: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Id,
    pub document_id: Id,
    pub chunk_index: i32,
    pub content: String,
    pub page_number: Option<i32>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebPage {
    pub id: Id,
    pub url: String,
    pub title: Option<String>,
    pub processed: bool,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebContentChunk {
    pub id: Id,
    pub web_page_id: Id,
    pub chunk_index: i32,
    pub content: String,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSettings {
    pub id: Id,
    pub voice: Json,
    pub personality: Json,
    pub privacy: Json,
    pub storage: Json,
    pub llm: Json,
    pub search: Json,
    pub memory: Json,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSourceType {
    MemoryItem,
    DocumentChunk,
    WebContentChunk,
}

impl VectorSourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MemoryItem => "memory_item",
            Self::DocumentChunk => "document_chunk",
            Self::WebContentChunk => "web_content_chunk",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorEmbeddingRecord {
    pub id: Id,
    pub source_type: VectorSourceType,
    pub source_id: Id,
    pub embedding_model: String,
    pub indexed: bool,
    pub created_at: DateTime<Utc>,
}

/// Filters accepted by `list_memory_items` / `count_memory_items`; every
/// field is an optional equality (or min-bound, for `min_importance`)
/// constraint, `None` meaning "no constraint on this column".
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub category: Option<MemoryCategory>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub min_importance: Option<i32>,
    pub conversation_id: Option<Id>,
}
