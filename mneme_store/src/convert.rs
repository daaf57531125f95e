use crate::types::VectorSourceType;
use crate::StoreError;
use mneme_core::Role;
use mneme_crypto::Key;
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// `sha256("{category}:{content}")`, the exact-content dedup key (§4.5.5).
#[must_use]
pub(crate) fn content_hash(category: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn seal_content(plaintext: &str, key: &Key) -> Result<String, StoreError> {
    Ok(mneme_crypto::seal(plaintext.as_bytes(), key)?)
}

pub(crate) fn unseal_content(stored: &str, key: &Key) -> Result<String, StoreError> {
    if !mneme_crypto::is_sealed(stored) {
        return Ok(stored.to_string());
    }
    let bytes = mneme_crypto::unseal(stored, key)?;
    String::from_utf8(bytes).map_err(|e| StoreError::Validation(format!("sealed content is not utf8: {e}")))
}

/// System-role messages are never sealed (§4.3): unsealing is a no-op for
/// them regardless of whether the value happens to look sealed.
pub(crate) fn unseal_message_content(stored: &str, role: Role, key: &Key) -> Result<String, StoreError> {
    if role == Role::System {
        return Ok(stored.to_string());
    }
    unseal_content(stored, key)
}

pub(crate) fn seal_message_content(plaintext: &str, role: Role, key: &Key) -> Result<String, StoreError> {
    if role == Role::System {
        return Ok(plaintext.to_string());
    }
    seal_content(plaintext, key)
}

pub(crate) fn parse_source_type(s: &str) -> Result<VectorSourceType, StoreError> {
    match s {
        "memory_item" => Ok(VectorSourceType::MemoryItem),
        "document_chunk" => Ok(VectorSourceType::DocumentChunk),
        "web_content_chunk" => Ok(VectorSourceType::WebContentChunk),
        other => Err(StoreError::Validation(format!("unknown vector source_type: {other}"))),
    }
}

pub(crate) fn parse_role(s: &str) -> Result<Role, StoreError> {
    Role::from_str(s).map_err(|_| StoreError::Validation(format!("unknown role: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_for_same_input() {
        let a = content_hash("user_defined", "my dog's name is buddy");
        let b = content_hash("user_defined", "my dog's name is buddy");
        assert_eq!(a, b);
    }

    #[test]
    fn content_hash_distinguishes_category() {
        let a = content_hash("user_defined", "same text");
        let b = content_hash("conversation", "same text");
        assert_ne!(a, b);
    }
}
