//! Blocking directory-tree helpers, run via `spawn_blocking` so they never
//! occupy an async worker thread (§5's rule for CPU/IO-bound work).

use crate::StorageError;
use std::path::{Path, PathBuf};

fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn copy_dir_sync(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir_sync(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn dir_stats_sync(dir: &Path) -> std::io::Result<(u64, u64)> {
    let mut files = Vec::new();
    walk_files(dir, &mut files)?;
    let mut total = 0u64;
    for file in &files {
        total += std::fs::metadata(file)?.len();
    }
    #[allow(clippy::cast_possible_truncation)]
    let count = files.len() as u64;
    Ok((count, total))
}

fn seal_tree_sync(dir: &Path, key: &mneme_crypto::Key) -> Result<(), StorageError> {
    let mut files = Vec::new();
    walk_files(dir, &mut files)?;
    for file in files {
        let bytes = std::fs::read(&file)?;
        let sealed = mneme_crypto::seal(&bytes, key)?;
        std::fs::write(&file, sealed)?;
    }
    Ok(())
}

fn unseal_tree_sync(src: &Path, dst: &Path, key: &mneme_crypto::Key) -> Result<(), StorageError> {
    copy_dir_sync(src, dst)?;
    let mut files = Vec::new();
    walk_files(dst, &mut files)?;
    for file in files {
        let sealed = std::fs::read_to_string(&file)?;
        let bytes = mneme_crypto::unseal(&sealed, key)?;
        std::fs::write(&file, bytes)?;
    }
    Ok(())
}

pub(crate) async fn copy_dir(src: PathBuf, dst: PathBuf) -> Result<(), StorageError> {
    tokio::task::spawn_blocking(move || copy_dir_sync(&src, &dst))
        .await
        .map_err(|e| StorageError::Other(anyhow::anyhow!(e)))??;
    Ok(())
}

pub(crate) async fn dir_stats(dir: PathBuf) -> Result<(u64, u64), StorageError> {
    let stats = tokio::task::spawn_blocking(move || dir_stats_sync(&dir))
        .await
        .map_err(|e| StorageError::Other(anyhow::anyhow!(e)))??;
    Ok(stats)
}

pub(crate) async fn seal_tree(dir: PathBuf, key: mneme_crypto::Key) -> Result<(), StorageError> {
    tokio::task::spawn_blocking(move || seal_tree_sync(&dir, &key))
        .await
        .map_err(|e| StorageError::Other(anyhow::anyhow!(e)))?
}

pub(crate) async fn unseal_tree(src: PathBuf, dst: PathBuf, key: mneme_crypto::Key) -> Result<(), StorageError> {
    tokio::task::spawn_blocking(move || unseal_tree_sync(&src, &dst, &key))
        .await
        .map_err(|e| StorageError::Other(anyhow::anyhow!(e)))?
}
