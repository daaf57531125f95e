use thiserror::Error;

/// Distinguishes the router's "try the fallback" cases (rate limit, server
/// error, timeout, auth failure) from programming errors it must not retry
/// (§4.7).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("both primary and fallback models failed: {0}")]
    AllBackendsFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether the router should fall through to the secondary backend
    /// (§4.7 step 2: "not a programming error").
    #[must_use]
    pub const fn is_retryable_at_router_level(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::ServerError(_) | Self::Timeout(_) | Self::AuthFailure(_)
        )
    }
}

impl From<LlmError> for mneme_core::CoreError {
    fn from(err: LlmError) -> Self {
        Self::Other(err.into())
    }
}
