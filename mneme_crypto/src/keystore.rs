use crate::{CryptoError, Key};
use base64::Engine;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

const SERVICE: &str = "mneme";
const ACCOUNT: &str = "master-key";

/// Narrow seam over the OS credential store so tests can substitute an
/// in-memory stand-in without touching the real keyring (§4.1 implementation
/// notes).
pub trait KeyStore: Send + Sync {
    /// Load the previously-stored key, if any.
    ///
    /// # Errors
    /// Returns [`CryptoError::KeyStoreUnavailable`] if the backing store
    /// cannot be reached at all (distinct from "entry absent", which is `Ok(None)`).
    fn load(&self) -> Result<Option<Key>, CryptoError>;

    /// Persist `key`, overwriting any previously-stored value.
    ///
    /// # Errors
    /// Returns [`CryptoError::KeyStoreUnavailable`] if the write fails.
    fn store(&self, key: &Key) -> Result<(), CryptoError>;
}

/// Production [`KeyStore`] backed by the OS credential manager (Keychain,
/// Secret Service, Windows Credential Manager, depending on platform) via the
/// `keyring` crate, read once at process start and cached by the caller
/// (§5, "Keyring: read once at startup, cached").
pub struct OsKeyStore {
    service: String,
    account: String,
}

impl OsKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            service: SERVICE.to_string(),
            account: ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, CryptoError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| CryptoError::KeyStoreUnavailable(e.to_string()))
    }
}

impl Default for OsKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for OsKeyStore {
    fn load(&self) -> Result<Option<Key>, CryptoError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| CryptoError::KeyStoreUnavailable(e.to_string()))?;
                let array: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| CryptoError::KeyStoreUnavailable("stored key has wrong length".into()))?;
                info!("loaded master key from OS credential store");
                Ok(Some(Key::from_bytes(array)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                warn!("keyring unavailable: {e}");
                Err(CryptoError::KeyStoreUnavailable(e.to_string()))
            }
        }
    }

    fn store(&self, key: &Key) -> Result<(), CryptoError> {
        let entry = self.entry()?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(key.0);
        entry
            .set_password(&encoded)
            .map_err(|e| CryptoError::KeyStoreUnavailable(e.to_string()))?;
        info!("persisted master key to OS credential store");
        Ok(())
    }
}

/// In-memory [`KeyStore`] for tests and for environments with no usable OS
/// credential store.
#[derive(Default)]
pub struct InMemoryKeyStore {
    slot: Mutex<HashMap<&'static str, [u8; 32]>>,
}

impl InMemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn load(&self) -> Result<Option<Key>, CryptoError> {
        let slot = self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(slot.get("key").map(|bytes| Key::from_bytes(*bytes)))
    }

    fn store(&self, key: &Key) -> Result<(), CryptoError> {
        let mut slot = self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.insert("key", key.0);
        Ok(())
    }
}
