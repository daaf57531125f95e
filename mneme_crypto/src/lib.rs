#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! AES-GCM seal/unseal over a 256-bit key, acquired from the OS credential
//! store or derived from a passphrase, per §4.1.

mod error;
mod keystore;
mod seal;

pub use error::CryptoError;
pub use keystore::{InMemoryKeyStore, KeyStore, OsKeyStore};
pub use seal::{is_sealed, seal, unseal, ENC_PREFIX};

/// A 256-bit symmetric key.
#[derive(Clone)]
pub struct Key(pub(crate) [u8; 32]);

impl Key {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a key from a user passphrase via PBKDF2-HMAC-SHA256.
    ///
    /// 100 000 iterations, matching §4.1's contract; the salt must be
    /// generated once and persisted by the caller (typically alongside the
    /// keyring entry's metadata) so the same passphrase re-derives the same
    /// key on every subsequent process start.
    #[must_use]
    pub fn derive_from_passphrase(passphrase: &str, salt: &[u8; 16]) -> Self {
        let mut out = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(passphrase.as_bytes(), salt, 100_000, &mut out);
        Self(out)
    }

    /// Generate a fresh random 256-bit key.
    #[must_use]
    pub fn generate_random() -> Self {
        use rand::RngCore;
        let mut out = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut out);
        Self(out)
    }
}

/// Generate a fresh random 16-byte PBKDF2 salt.
#[must_use]
pub fn generate_salt() -> [u8; 16] {
    use rand::RngCore;
    let mut out = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_derivation_is_deterministic() {
        let salt = generate_salt();
        let a = Key::derive_from_passphrase("correct horse battery staple", &salt);
        let b = Key::derive_from_passphrase("correct horse battery staple", &salt);
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = Key::derive_from_passphrase("same passphrase", &generate_salt());
        let b = Key::derive_from_passphrase("same passphrase", &generate_salt());
        assert_ne!(a.0, b.0);
    }
}
