use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector entry not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<VectorStoreError> for mneme_core::CoreError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::NotFound(msg) => Self::NotFound(msg),
            VectorStoreError::Validation(msg) => Self::Validation(msg),
            other => Self::Other(other.into()),
        }
    }
}
