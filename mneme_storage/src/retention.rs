//! Backup retention (§4.9's `cleanup_old_backups`): deletes every backup
//! older than `max_age_days`, plus any beyond the newest `max_count`.

use crate::{StorageManager, StorageError};
use chrono::Utc;
use tracing::{info, instrument};

impl StorageManager {
    /// `list_backups` already returns newest-first; everything beyond
    /// `max_count` in that order, and everything whose age exceeds
    /// `max_age_days`, is deleted. A backup caught by either rule is
    /// deleted once, not twice.
    #[instrument(skip(self))]
    pub async fn cleanup_old_backups(&self, max_count: usize, max_age_days: i64) -> Result<usize, StorageError> {
        let backups = self.list_backups().await?;
        let now = Utc::now();

        let mut to_delete = Vec::new();
        for (index, backup) in backups.iter().enumerate() {
            let age_days = (now - backup.manifest.created_at).num_days();
            let beyond_max_count = index >= max_count;
            let too_old = age_days > max_age_days;
            if beyond_max_count || too_old {
                to_delete.push(backup.manifest.name.clone());
            }
        }

        let deleted = to_delete.len();
        for name in to_delete {
            self.delete_backup(&name).await?;
        }
        info!(deleted, "backup retention pass complete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageManager;
    use mneme_config::StorageConfig;
    use mneme_crypto::Key;
    use mneme_vector::VectorStore;
    use sea_orm::Database;
    use tokio_util::sync::CancellationToken;

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
        let store = mneme_store::MetadataStore::from_connection(db, key.clone()).await.unwrap();
        tokio::fs::create_dir_all(config.vector_path()).await.unwrap();
        let vectors = VectorStore::open(config.vector_path()).await.unwrap();
        StorageManager::new(store, vectors, key, config)
    }

    #[tokio::test]
    async fn cleanup_keeps_only_the_newest_max_count_backups() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        for _ in 0..5 {
            manager.create_backup(false, false, &token).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let deleted = manager.cleanup_old_backups(2, 365).await.unwrap();
        assert_eq!(deleted, 3);

        let remaining = manager.list_backups().await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn cleanup_deletes_nothing_when_within_limits() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        manager.create_backup(false, false, &token).await.unwrap();
        manager.create_backup(false, false, &token).await.unwrap();

        let deleted = manager.cleanup_old_backups(10, 365).await.unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(manager.list_backups().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cleanup_deletes_backups_older_than_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path()).await;
        let token = CancellationToken::new();

        manager.create_backup(false, false, &token).await.unwrap();
        let deleted = manager.cleanup_old_backups(10, -1).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(manager.list_backups().await.unwrap().is_empty());
    }
}
