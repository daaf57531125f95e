//! Backup, list, delete, and restore (§4.9). A backup artifact's state
//! machine (`PENDING -> WRITTEN -> (optional) ENCRYPTED -> LISTABLE`) is
//! realized as: build into a `.tmp-` staging directory (PENDING), copy the
//! store snapshots in (WRITTEN), optionally seal every file in place
//! (ENCRYPTED), then atomically rename into its final name (LISTABLE). A
//! failed transition never leaves a non-`.tmp-` directory behind.

use crate::manifest::{BackupContents, BackupHandle, BackupManifest, MANIFEST_FILENAME};
use crate::{fsutil, StorageManager, DOCUMENTS_SUBDIR, EVENT_BACKUP_CREATED, EVENT_BACKUP_RESTORED, VECTOR_SUBDIR};
use crate::StorageError;
use chrono::Utc;
use mneme_core::new_id;
use mneme_store::MetadataStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

impl StorageManager {
    /// Writes a backup directory under `backups_path()` (§6). Setting
    /// `include_documents` copies the documents directory in verbatim (no
    /// exclusion-pattern support — DESIGN.md open-question decision).
    /// Vectors are included as a point-in-time snapshot (not regenerated
    /// from the metadata store, unlike export/import's lazy re-embedding).
    #[instrument(skip(self, cancellation))]
    pub async fn create_backup(
        &self,
        include_documents: bool,
        encrypt: bool,
        cancellation: &CancellationToken,
    ) -> Result<BackupHandle, StorageError> {
        if cancellation.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let backups_root = self.config.backups_path();
        tokio::fs::create_dir_all(&backups_root).await?;

        let name = format!("backup-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
        let tmp_dir = backups_root.join(format!(".tmp-{name}"));
        let final_dir = backups_root.join(&name);
        tokio::fs::create_dir_all(&tmp_dir).await?;

        let db_src = self.config.database_path();
        let db_dst = tmp_dir.join(&self.config.database_filename);
        tokio::fs::copy(&db_src, &db_dst).await?;

        let vector_dst = tmp_dir.join(VECTOR_SUBDIR);
        tokio::fs::create_dir_all(&vector_dst).await?;
        self.vectors.backup(&vector_dst).await?;

        let mut documents_included = false;
        if include_documents {
            let documents_src = self.config.documents_path();
            if tokio::fs::try_exists(&documents_src).await.unwrap_or(false) {
                let documents_dst = tmp_dir.join(DOCUMENTS_SUBDIR);
                fsutil::copy_dir(documents_src, documents_dst).await?;
                documents_included = true;
            }
        }

        if encrypt {
            fsutil::seal_tree(tmp_dir.clone(), self.key.clone()).await?;
        }

        let (file_count, total_size_bytes) = fsutil::dir_stats(tmp_dir.clone()).await?;

        let manifest = BackupManifest {
            name: name.clone(),
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            encrypted: encrypt,
            contents: BackupContents {
                sqlite: true,
                vector: true,
                documents: documents_included,
                file_count,
                total_size_bytes,
            },
        };
        let manifest_path = tmp_dir.join(MANIFEST_FILENAME);
        tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).await?;

        tokio::fs::rename(&tmp_dir, &final_dir).await?;
        info!(backup = %name, "backup written");

        self.emit(EVENT_BACKUP_CREATED, serde_json::json!({ "path": final_dir.display().to_string() })).await;

        Ok(BackupHandle { manifest, path: final_dir })
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupHandle>, StorageError> {
        let root = self.config.backups_path();
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut handles = Vec::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_staging = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !path.is_dir() || is_staging {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(path.join(MANIFEST_FILENAME)).await else { continue };
            let Ok(manifest) = serde_json::from_slice::<BackupManifest>(&bytes) else { continue };
            handles.push(BackupHandle { manifest, path });
        }

        handles.sort_by(|a, b| b.manifest.created_at.cmp(&a.manifest.created_at));
        Ok(handles)
    }

    pub async fn delete_backup(&self, name: &str) -> Result<(), StorageError> {
        let path = self.config.backups_path().join(name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("backup {name}")));
        }
        tokio::fs::remove_dir_all(&path).await?;
        Ok(())
    }

    /// Validates the manifest, swaps the vector store and sqlite file in
    /// place, and reopens the metadata store (§4.9). Consumes and returns
    /// `self` since the metadata store connection must be closed and a
    /// fresh one opened against the restored file.
    #[instrument(skip(self, cancellation))]
    pub async fn restore_from_backup(mut self, name: &str, cancellation: &CancellationToken) -> Result<Self, StorageError> {
        if cancellation.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let backup_dir = self.config.backups_path().join(name);
        let manifest_bytes = tokio::fs::read(backup_dir.join(MANIFEST_FILENAME))
            .await
            .map_err(|_| StorageError::NotFound(format!("backup {name}")))?;
        let manifest: BackupManifest = serde_json::from_slice(&manifest_bytes)?;

        let staging_dir = self.config.backups_path().join(format!(".restore-{}", new_id()));
        let source_dir = if manifest.encrypted {
            fsutil::unseal_tree(backup_dir.clone(), staging_dir.clone(), self.key.clone()).await?;
            staging_dir.clone()
        } else {
            backup_dir.clone()
        };

        self.vectors.restore(&source_dir.join(VECTOR_SUBDIR)).await?;

        let db_path = self.config.database_path();
        let _ = self.store.close().await;
        tokio::fs::copy(source_dir.join(&self.config.database_filename), &db_path).await?;
        self.store = MetadataStore::open(&db_path, self.key.clone()).await?;

        if manifest.contents.documents {
            let documents_src = source_dir.join(DOCUMENTS_SUBDIR);
            let documents_dst = self.config.documents_path();
            if tokio::fs::try_exists(&documents_dst).await.unwrap_or(false) {
                tokio::fs::remove_dir_all(&documents_dst).await?;
            }
            fsutil::copy_dir(documents_src, documents_dst).await?;
        }

        if manifest.encrypted {
            let _ = tokio::fs::remove_dir_all(&staging_dir).await;
        }

        info!(backup = %name, "backup restored");
        self.emit(EVENT_BACKUP_RESTORED, serde_json::json!({ "name": name })).await;

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageManager;
    use mneme_config::StorageConfig;
    use mneme_core::{MemoryCategory, Role};
    use mneme_crypto::Key;
    use mneme_vector::VectorStore;
    use sea_orm::Database;

    async fn test_manager(data_dir: &std::path::Path) -> StorageManager {
        let key = Key::generate_random();
        let config = StorageConfig {
            data_dir: data_dir.to_path_buf(),
            database_filename: "personal_ai.db".to_string(),
            vector_dir: "vectors".to_string(),
            documents_dir: "documents".to_string(),
            backups_dir: "backups".to_string(),
        };
        tokio::fs::create_dir_all(&config.data_dir).await.unwrap();
        let db = Database::connect(format!("sqlite:{}?mode=rwc", config.database_path().display())).await.unwrap();
        let store = MetadataStore::from_connection(db, key.clone()).await.unwrap();
        tokio::fs::create_dir_all(config.vector_path()).await.unwrap();
        let vectors = VectorStore::open(config.vector_path()).await.unwrap();
        StorageManager::new(store, vectors, key, config)
    }

    #[tokio::test]
    async fn backup_then_restore_round_trips_conversations_and_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        let conversation = manager.store.create_conversation(Some("trip".into())).await.unwrap();
        manager.store.add_message(conversation.id, Role::User, "remember the flight time").await.unwrap();
        manager
            .store
            .create_memory_item("flight leaves at 9am", MemoryCategory::UserDefined, None, None, None, None)
            .await
            .unwrap();
        manager.vectors.add(mneme_core::new_id(), vec![1.0, 0.0], serde_json::json!({}), "flight leaves at 9am".into()).await.unwrap();

        let handle = manager.create_backup(false, false, &token).await.unwrap();
        assert!(handle.manifest.contents.sqlite);
        assert!(handle.manifest.contents.vector);
        assert!(!handle.manifest.encrypted);

        manager.store.create_conversation(Some("noise".into())).await.unwrap();

        let restored = manager.restore_from_backup(&handle.manifest.name, &token).await.unwrap();

        let fetched = restored.store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(fetched.title.as_deref(), Some("trip"));

        let history = restored.store.get_conversation_history(conversation.id, 10, 0).await.unwrap();
        assert_eq!(history[0].content, "remember the flight time");

        let conversations = restored.store.list_conversations(10, 0).await.unwrap();
        assert_eq!(conversations.len(), 1);
    }

    #[tokio::test]
    async fn encrypted_backup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        let conversation = manager.store.create_conversation(Some("secret".into())).await.unwrap();
        let handle = manager.create_backup(false, true, &token).await.unwrap();
        assert!(handle.manifest.encrypted);

        let restored = manager.restore_from_backup(&handle.manifest.name, &token).await.unwrap();
        let fetched = restored.store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(fetched.title.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn list_backups_excludes_staging_directories() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        manager.create_backup(false, false, &token).await.unwrap();
        manager.create_backup(false, false, &token).await.unwrap();

        let backups = manager.list_backups().await.unwrap();
        assert_eq!(backups.len(), 2);
        assert!(backups[0].manifest.created_at >= backups[1].manifest.created_at);
    }

    #[tokio::test]
    async fn delete_backup_removes_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        let handle = manager.create_backup(false, false, &token).await.unwrap();
        manager.delete_backup(&handle.manifest.name).await.unwrap();

        assert!(manager.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_of_unknown_backup_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        let result = manager.restore_from_backup("backup-does-not-exist", &token).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
