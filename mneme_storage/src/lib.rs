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

//! Backup, restore, export/import, and retention over the aggregate
//! {metadata store, vector store, optional user files} (§4.9).
//!
//! Backups are plain directories rather than single-file archives: no zip
//! crate is carried in this stack, so the "may be zipped" packaging step
//! from §4.9 is dropped (DESIGN.md). The
//! "sealed into a single `.enc` file" option is implemented instead by
//! sealing every file in the backup directory in place with
//! `mneme_crypto`, which the stack already carries.

mod backup;
mod error;
mod export;
mod fsutil;
mod manifest;
mod retention;
mod stats;

pub use error::StorageError;
pub use manifest::{BackupContents, BackupHandle, BackupManifest};
pub use stats::StorageStats;

use mneme_config::StorageConfig;
use mneme_crypto::Key;
use mneme_events::{Event, EventBus};
use mneme_store::MetadataStore;
use mneme_vector::VectorStore;
use std::sync::Arc;
use tracing::instrument;

pub const EVENT_BACKUP_CREATED: &str = "storage:backup_created";
pub const EVENT_BACKUP_RESTORED: &str = "storage:backup_restored";

const VECTOR_SUBDIR: &str = "vectors";
const DOCUMENTS_SUBDIR: &str = "documents";

/// Owns the paths and store handles backup/restore/export/import operate
/// over. Not `Clone`: [`StorageManager::restore_from_backup`] reopens the
/// metadata store, which would otherwise leave clones pointed at a closed
/// connection pool.
pub struct StorageManager {
    pub(crate) store: MetadataStore,
    pub(crate) vectors: VectorStore,
    pub(crate) key: Key,
    pub(crate) config: StorageConfig,
    pub(crate) events: Option<Arc<EventBus>>,
}

impl StorageManager {
    #[must_use]
    pub const fn new(store: MetadataStore, vectors: VectorStore, key: Key, config: StorageConfig) -> Self {
        Self { store, vectors, key, config, events: None }
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &MetadataStore {
        &self.store
    }

    #[must_use]
    pub const fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// §4.9: delegates to each underlying store's `optimize`, then sweeps
    /// any `.tmp-`/`.restore-` staging directories an interrupted
    /// backup/restore left behind.
    #[instrument(skip(self))]
    pub async fn optimize_storage(&self) -> Result<(), StorageError> {
        self.store.optimize().await?;
        self.vectors.optimize().await?;

        let root = self.config.backups_path();
        if let Ok(mut entries) = tokio::fs::read_dir(&root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let is_stale_staging = path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(".tmp-") || n.starts_with(".restore-"));
                if is_stale_staging {
                    let _ = tokio::fs::remove_dir_all(&path).await;
                }
            }
        }
        Ok(())
    }

    pub(crate) async fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(events) = &self.events {
            events.publish_async(Event::new(event_type, payload)).await;
        }
    }
}
