use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub(crate) const MANIFEST_FILENAME: &str = "metadata.json";

/// Describes a backup artifact's contents and versions (§4.9). Always
/// written in plaintext, even when `encrypted` is true, so a restore can
/// check the flag before it has derived a key to unseal anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub encrypted: bool,
    pub contents: BackupContents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackupContents {
    pub sqlite: bool,
    pub vector: bool,
    pub documents: bool,
    pub file_count: u64,
    pub total_size_bytes: u64,
}

/// A listed backup: its manifest plus the directory it lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupHandle {
    pub manifest: BackupManifest,
    pub path: PathBuf,
}
