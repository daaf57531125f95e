use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup manifest is not valid JSON: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("metadata store failure: {0}")]
    Store(#[from] mneme_store::StoreError),

    #[error("database query failed: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("vector store failure: {0}")]
    Vector(#[from] mneme_vector::VectorStoreError),

    #[error("encryption failure: {0}")]
    Crypto(#[from] mneme_crypto::CryptoError),

    #[error("config failure: {0}")]
    Config(#[from] mneme_config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StorageError> for mneme_core::CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(msg) => Self::Validation(msg),
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::Cancelled => Self::Cancelled,
            other => Self::Other(other.into()),
        }
    }
}

impl From<mneme_core::CoreError> for StorageError {
    fn from(err: mneme_core::CoreError) -> Self {
        match err {
            mneme_core::CoreError::Validation(msg) => Self::Validation(msg),
            mneme_core::CoreError::NotFound(msg) => Self::NotFound(msg),
            mneme_core::CoreError::Cancelled => Self::Cancelled,
            mneme_core::CoreError::Other(e) => Self::Other(e),
        }
    }
}
