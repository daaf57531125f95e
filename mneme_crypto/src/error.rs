use thiserror::Error;

/// §7: `CryptoError` — seal/unseal failure, surfaced and treated as fatal
/// for the affected item.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is malformed or truncated")]
    MalformedCiphertext,

    #[error("ciphertext is missing the {ENC_PREFIX:?} version prefix")]
    MissingPrefix,

    #[error("AES-GCM seal failed")]
    SealFailed,

    #[error("AES-GCM unseal failed: authentication tag mismatch or wrong key")]
    UnsealFailed,

    #[error("key store unavailable: {0}")]
    KeyStoreUnavailable(String),
}

use crate::seal::ENC_PREFIX;
