use thiserror::Error;

/// §7's metadata-store error kinds, folded into one enum: `ValidationError`,
/// `NotFound`, `StorageError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage I/O failure: {0}")]
    Storage(#[from] sea_orm::DbErr),

    #[error("content seal/unseal failed: {0}")]
    Crypto(#[from] mneme_crypto::CryptoError),
}

impl From<StoreError> for mneme_core::CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Other(other.into()),
        }
    }
}
