use thiserror::Error;

/// §7's memory-service error kinds; everything below it (`mneme_store`,
/// `mneme_vector`) folds in via `#[from]`.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("metadata store failure: {0}")]
    Store(#[from] mneme_store::StoreError),

    #[error("vector store failure: {0}")]
    Vector(#[from] mneme_vector::VectorStoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<MemoryError> for mneme_core::CoreError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Validation(msg) => Self::Validation(msg),
            MemoryError::NotFound(msg) => Self::NotFound(msg),
            MemoryError::Cancelled => Self::Cancelled,
            other => Self::Other(other.into()),
        }
    }
}

impl From<mneme_core::CoreError> for MemoryError {
    fn from(err: mneme_core::CoreError) -> Self {
        match err {
            mneme_core::CoreError::Validation(msg) => Self::Validation(msg),
            mneme_core::CoreError::NotFound(msg) => Self::NotFound(msg),
            mneme_core::CoreError::Cancelled => Self::Cancelled,
            mneme_core::CoreError::Other(e) => Self::Other(e),
        }
    }
}
