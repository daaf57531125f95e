//! sea-orm entity definitions for every §3 data-model type.
//!
//! Column shapes for `memory_items` and its neighbors follow the usual
//! `ActiveModel`/`Set(...)` sea-orm convention; every entity here
//! (conversations, messages, documents, web pages, user settings, vector
//! embedding records) follows the same column-for-column layout.

pub mod conversations;
pub mod document_chunks;
pub mod documents;
pub mod memory_items;
pub mod messages;
pub mod prelude;
pub mod user_settings;
pub mod vector_embedding_records;
pub mod web_content_chunks;
pub mod web_pages;
