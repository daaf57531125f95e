use thiserror::Error;

/// Errors shared across crate boundaries. Component crates (`mneme_store`,
/// `mneme_vector`, `mneme_crypto`, `mneme_llm`, ...) own a richer,
/// kind-specific error enum for internal matching; this is the common
/// currency at the seams between them, per §7's error-handling design.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
