#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! The durable relational store over every §3 entity (§4.3).
//!
//! Bootstrap uses `Schema::new(backend).create_table_from_entity(...)`,
//! tolerating an "already exists" error on repeated startup.

mod bootstrap;
mod convert;
mod error;
mod types;

pub mod conversations;
pub mod documents;
pub mod import;
pub mod memory_items;
pub mod settings;
pub mod vector_records;
pub mod web;

pub use error::StoreError;
pub use types::{
    Conversation, Document, DocumentChunk, MemoryFilter, MemoryItem, Message, UserSettings,
    VectorEmbeddingRecord, VectorSourceType, WebContentChunk, WebPage,
};

use mneme_crypto::Key;
use sea_orm::{Database, DatabaseConnection};
use std::path::Path;
use tracing::info;

/// Handle over the metadata store's connection pool and the encryption key
/// used to seal/unseal content fields. Cheaply `Clone`-able; the inner
/// connection pool is shared (§5).
#[derive(Clone)]
pub struct MetadataStore {
    pub(crate) db: DatabaseConnection,
    pub(crate) key: Key,
}

impl MetadataStore {
    /// Open (creating if absent) the SQLite metadata store at `path`,
    /// bootstrapping every §3 table.
    ///
    /// # Errors
    /// Returns [`StoreError::Storage`] if the connection or any table
    /// creation fails for a reason other than "already exists".
    pub async fn open(path: &Path, key: Key) -> Result<Self, StoreError> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        info!(db_url = %db_url, "opening metadata store");

        let db = Database::connect(&db_url).await?;
        bootstrap::create_all_tables(&db).await?;

        info!("metadata store ready");
        Ok(Self { db, key })
    }

    /// Build a store over an already-open connection (used by tests with
    /// an in-memory `sqlite::memory:` database).
    ///
    /// # Errors
    /// Returns [`StoreError::Storage`] if table creation fails.
    pub async fn from_connection(db: DatabaseConnection, key: Key) -> Result<Self, StoreError> {
        bootstrap::create_all_tables(&db).await?;
        Ok(Self { db, key })
    }

    /// Reclaim space and rebuild statistics (§4.3's `optimize`).
    ///
    /// # Errors
    /// Returns [`StoreError::Storage`] if either pragma fails.
    pub async fn optimize(&self) -> Result<(), StoreError> {
        use sea_orm::ConnectionTrait;
        self.db.execute_unprepared("PRAGMA optimize;").await?;
        self.db.execute_unprepared("VACUUM;").await?;
        info!("metadata store optimized");
        Ok(())
    }

    /// The underlying connection, for crates (`mneme_storage`) that need to
    /// close it explicitly as part of an orderly shutdown (§5).
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Closes the connection pool (§5's shutdown sequence). Consumes the
    /// handle; a clone sharing the same pool must not be used afterward.
    ///
    /// # Errors
    /// Returns [`StoreError::Storage`] if the pool fails to close cleanly.
    pub async fn close(self) -> Result<(), StoreError> {
        self.db.close().await?;
        Ok(())
    }
}
