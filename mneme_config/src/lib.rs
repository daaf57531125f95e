//! The single on-disk `Config`: one serde struct with a
//! `#[serde(default = "...")]` on every tunable, loaded from a JSON file
//! under the user's config directory. Every other crate's tunable defaults
//! (retrieval weights, token budgets, backoff schedule, storage paths) are
//! mirrored here so a caller only has one file to edit.

mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "mneme";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_memory_config")]
    pub memory: MemoryConfig,

    #[serde(default = "default_context_config")]
    pub context: ContextConfig,

    #[serde(default = "default_llm_config")]
    pub llm: LlmConfig,

    #[serde(default = "default_storage_config")]
    pub storage: StorageConfig,

    #[serde(default = "default_backup_config")]
    pub backup: BackupConfig,

    #[serde(default = "default_optimization_config")]
    pub optimization: OptimizationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory: default_memory_config(),
            context: default_context_config(),
            llm: default_llm_config(),
            storage: default_storage_config(),
            backup: default_backup_config(),
            optimization: default_optimization_config(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_retrieval_config")]
    pub retrieval: RetrievalConfig,
}

fn default_memory_config() -> MemoryConfig {
    MemoryConfig {
        retrieval: default_retrieval_config(),
    }
}

/// Mirrors `mneme_memory::scoring::RetrievalWeights`'s defaults (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "default_importance_weight")]
    pub importance_weight: f64,
    #[serde(default = "default_tau_days")]
    pub tau_days: f64,
}

const fn default_similarity_weight() -> f64 {
    0.65
}
const fn default_recency_weight() -> f64 {
    0.25
}
const fn default_importance_weight() -> f64 {
    0.10
}
const fn default_tau_days() -> f64 {
    14.0
}

fn default_retrieval_config() -> RetrievalConfig {
    RetrievalConfig {
        similarity_weight: default_similarity_weight(),
        recency_weight: default_recency_weight(),
        importance_weight: default_importance_weight(),
        tau_days: default_tau_days(),
    }
}

/// Mirrors `mneme_context::token::TokenBudget`'s defaults (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_reserved_system_prompt_tokens")]
    pub reserved_system_prompt_tokens: u32,
    #[serde(default = "default_reserved_user_message_tokens")]
    pub reserved_user_message_tokens: u32,
    #[serde(default = "default_reserved_response_tokens")]
    pub reserved_response_tokens: u32,
    #[serde(default = "default_context_ratio")]
    pub context_ratio: f64,
}

const fn default_reserved_system_prompt_tokens() -> u32 {
    200
}
const fn default_reserved_user_message_tokens() -> u32 {
    200
}
const fn default_reserved_response_tokens() -> u32 {
    500
}
const fn default_context_ratio() -> f64 {
    0.75
}

fn default_context_config() -> ContextConfig {
    ContextConfig {
        reserved_system_prompt_tokens: default_reserved_system_prompt_tokens(),
        reserved_user_message_tokens: default_reserved_user_message_tokens(),
        reserved_response_tokens: default_reserved_response_tokens(),
        context_ratio: default_context_ratio(),
    }
}

/// Mirrors `mneme_llm::router`'s retry schedule and generation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_retry_base_delays_secs")]
    pub retry_base_delays_secs: Vec<u64>,
    #[serde(default = "default_final_retries")]
    pub final_retries: usize,
}

fn default_model() -> String {
    "default".to_string()
}
const fn default_temperature() -> f32 {
    0.7
}
const fn default_max_tokens() -> u32 {
    1000
}
fn default_retry_base_delays_secs() -> Vec<u64> {
    vec![2, 4, 6, 8]
}
const fn default_final_retries() -> usize {
    3
}

fn default_llm_config() -> LlmConfig {
    LlmConfig {
        default_model: default_model(),
        default_temperature: default_temperature(),
        default_max_tokens: default_max_tokens(),
        retry_base_delays_secs: default_retry_base_delays_secs(),
        final_retries: default_final_retries(),
    }
}

/// Relative paths under `data_dir`; `mneme_storage` joins these onto
/// whatever root it is pointed at (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_database_filename")]
    pub database_filename: String,
    #[serde(default = "default_vector_dir")]
    pub vector_dir: String,
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
    #[serde(default = "default_backups_dir")]
    pub backups_dir: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CONFIG_DIR_NAME)
}
fn default_database_filename() -> String {
    "personal_ai.db".to_string()
}
fn default_vector_dir() -> String {
    "vectors".to_string()
}
fn default_documents_dir() -> String {
    "documents".to_string()
}
fn default_backups_dir() -> String {
    "backups".to_string()
}

fn default_storage_config() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        database_filename: default_database_filename(),
        vector_dir: default_vector_dir(),
        documents_dir: default_documents_dir(),
        backups_dir: default_backups_dir(),
    }
}

impl StorageConfig {
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    #[must_use]
    pub fn vector_path(&self) -> PathBuf {
        self.data_dir.join(&self.vector_dir)
    }

    #[must_use]
    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join(&self.documents_dir)
    }

    #[must_use]
    pub fn backups_path(&self) -> PathBuf {
        self.data_dir.join(&self.backups_dir)
    }
}

/// §4.9 backup defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_enabled")]
    pub enabled: bool,
    #[serde(default = "default_auto_backup")]
    pub auto_backup: bool,
    #[serde(default = "default_backup_frequency")]
    pub backup_frequency: String,
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
}

const fn default_backup_enabled() -> bool {
    true
}
const fn default_auto_backup() -> bool {
    true
}
fn default_backup_frequency() -> String {
    "daily".to_string()
}
const fn default_backup_count() -> u32 {
    7
}

fn default_backup_config() -> BackupConfig {
    BackupConfig {
        enabled: default_backup_enabled(),
        auto_backup: default_auto_backup(),
        backup_frequency: default_backup_frequency(),
        backup_count: default_backup_count(),
    }
}

/// §4.9 optimization defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default = "default_auto_optimize")]
    pub auto_optimize: bool,
    #[serde(default = "default_optimization_frequency")]
    pub optimization_frequency: String,
}

const fn default_auto_optimize() -> bool {
    true
}
fn default_optimization_frequency() -> String {
    "weekly".to_string()
}

fn default_optimization_config() -> OptimizationConfig {
    OptimizationConfig {
        auto_optimize: default_auto_optimize(),
        optimization_frequency: default_optimization_frequency(),
    }
}

impl Config {
    /// `~/.config/mneme/config.json` (or the platform equivalent via
    /// `dirs::config_dir`).
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(CONFIG_DIR_NAME);
        Ok(dir.join(CONFIG_FILE_NAME))
    }

    /// Loads from `default_config_path()`, falling back to built-in
    /// defaults (and writing them out) if the file does not exist yet.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_config_path()?;
        self.save_to(&path)
    }

    /// Dotted-key lookup (`"backup.backup_count"`, `"memory.retrieval.tau_days"`)
    /// over the serialized struct, satisfying the abstract config-provider
    /// contract without a second source of truth.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Json> {
        let value = serde_json::to_value(self).ok()?;
        key.split('.')
            .try_fold(value, |acc, segment| acc.get(segment).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retrieval_weights_match_mneme_memory_scoring_defaults() {
        let config = Config::default();
        assert!((config.memory.retrieval.similarity_weight - 0.65).abs() < f64::EPSILON);
        assert!((config.memory.retrieval.recency_weight - 0.25).abs() < f64::EPSILON);
        assert!((config.memory.retrieval.importance_weight - 0.10).abs() < f64::EPSILON);
        assert!((config.memory.retrieval.tau_days - 14.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_context_budget_matches_mneme_context_token_defaults() {
        let config = Config::default();
        assert_eq!(config.context.reserved_system_prompt_tokens, 200);
        assert_eq!(config.context.reserved_user_message_tokens, 200);
        assert_eq!(config.context.reserved_response_tokens, 500);
        assert!((config.context.context_ratio - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn default_llm_retry_schedule_matches_router_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.retry_base_delays_secs, vec![2, 4, 6, 8]);
        assert_eq!(config.llm.final_retries, 3);
    }

    #[test]
    fn default_backup_and_optimization_settings() {
        let config = Config::default();
        assert!(config.backup.enabled);
        assert!(config.backup.auto_backup);
        assert_eq!(config.backup.backup_frequency, "daily");
        assert_eq!(config.backup.backup_count, 7);
        assert!(config.optimization.auto_optimize);
        assert_eq!(config.optimization.optimization_frequency, "weekly");
    }

    #[test]
    fn partial_json_fills_in_missing_fields_via_serde_default() {
        let partial = r#"{"backup": {"backup_count": 30}}"#;
        let config: Config = serde_json::from_str(partial).unwrap();
        assert_eq!(config.backup.backup_count, 30);
        assert!(config.backup.enabled);
        assert!((config.memory.retrieval.similarity_weight - 0.65).abs() < f64::EPSILON);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.backup.backup_count = 14;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backup.backup_count, 14);
    }

    #[test]
    fn dotted_key_lookup_reaches_nested_fields() {
        let config = Config::default();
        assert_eq!(
            config.get("backup.backup_count"),
            Some(Json::from(7))
        );
        assert_eq!(
            config.get("memory.retrieval.tau_days"),
            Some(Json::from(14.0))
        );
        assert_eq!(config.get("nonexistent.path"), None);
    }

    #[test]
    fn storage_config_joins_paths_under_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/tmp/mneme-test");
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from("/tmp/mneme-test/personal_ai.db")
        );
        assert_eq!(
            config.storage.vector_path(),
            PathBuf::from("/tmp/mneme-test/vectors")
        );
    }
}
