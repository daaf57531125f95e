use crate::{CryptoError, Key};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use rand::RngCore;

/// Version tag prepended to every sealed value so the metadata store can
/// detect and transparently unseal on read (§4.1). A future `"enc2:"` scheme
/// can coexist with this one during key rotation.
pub const ENC_PREFIX: &str = "enc1:";

const NONCE_LEN: usize = 12;

/// Seal `plaintext` under `key`. Ciphertext layout is `nonce ∥ AES-GCM(plaintext)`,
/// base64-encoded and prefixed with [`ENC_PREFIX`].
///
/// # Errors
/// Returns [`CryptoError::SealFailed`] if the underlying AEAD operation fails.
pub fn seal(plaintext: &[u8], key: &Key) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| CryptoError::SealFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::SealFailed)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    let encoded = base64::engine::general_purpose::STANDARD.encode(combined);
    Ok(format!("{ENC_PREFIX}{encoded}"))
}

/// Unseal a value previously produced by [`seal`].
///
/// # Errors
/// Returns [`CryptoError::MissingPrefix`] if `stored` does not begin with
/// [`ENC_PREFIX`], [`CryptoError::MalformedCiphertext`] if the base64 decodes
/// to fewer than `NONCE_LEN` bytes, and [`CryptoError::UnsealFailed`] if
/// authentication fails (wrong key or corrupted ciphertext).
pub fn unseal(stored: &str, key: &Key) -> Result<Vec<u8>, CryptoError> {
    let encoded = stored.strip_prefix(ENC_PREFIX).ok_or(CryptoError::MissingPrefix)?;

    let combined = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::MalformedCiphertext)?;

    if combined.len() < NONCE_LEN {
        return Err(CryptoError::MalformedCiphertext);
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| CryptoError::UnsealFailed)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::UnsealFailed)
}

/// Returns `true` if `value` looks like a sealed value (carries the
/// recognizable prefix), without attempting to unseal it.
#[must_use]
pub fn is_sealed(value: &str) -> bool {
    value.starts_with(ENC_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_unseal_round_trips() {
        let key = Key::generate_random();
        let plaintext = b"my dog's name is buddy";

        let sealed = seal(plaintext, &key).unwrap();
        assert!(is_sealed(&sealed));

        let unsealed = unseal(&sealed, &key).unwrap();
        assert_eq!(unsealed, plaintext);
    }

    #[test]
    fn unseal_with_wrong_key_fails() {
        let key_a = Key::generate_random();
        let key_b = Key::generate_random();

        let sealed = seal(b"secret", &key_a).unwrap();
        assert!(unseal(&sealed, &key_b).is_err());
    }

    #[test]
    fn unseal_rejects_missing_prefix() {
        let key = Key::generate_random();
        assert!(matches!(
            unseal("not-sealed-at-all", &key),
            Err(CryptoError::MissingPrefix)
        ));
    }

    #[test]
    fn two_seals_of_same_plaintext_differ() {
        let key = Key::generate_random();
        let a = seal(b"same text", &key).unwrap();
        let b = seal(b"same text", &key).unwrap();
        assert_ne!(a, b, "nonce must be fresh per call");
    }
}
