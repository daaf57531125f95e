use thiserror::Error;

/// §7's conversation-orchestrator error kinds; the store and memory layers
/// fold in via `#[from]`, mirroring `mneme_memory::MemoryError`.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("conversation store failure: {0}")]
    Store(#[from] mneme_store::StoreError),

    #[error("memory service failure: {0}")]
    Memory(#[from] mneme_memory::MemoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<mneme_core::CoreError> for ConversationError {
    fn from(err: mneme_core::CoreError) -> Self {
        match err {
            mneme_core::CoreError::Validation(msg) => Self::Validation(msg),
            mneme_core::CoreError::NotFound(msg) => Self::NotFound(msg),
            mneme_core::CoreError::Cancelled => Self::Cancelled,
            mneme_core::CoreError::Other(e) => Self::Other(e),
        }
    }
}

impl From<ConversationError> for mneme_core::CoreError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Validation(msg) => Self::Validation(msg),
            ConversationError::NotFound(msg) => Self::NotFound(msg),
            ConversationError::Cancelled => Self::Cancelled,
            other => Self::Other(other.into()),
        }
    }
}
