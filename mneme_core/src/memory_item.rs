use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The fixed category set a `MemoryItem` may belong to (§3, `MEMORY_CATEGORIES`
/// in `original_source/database/models.py`). Any other string is rejected at
/// construction, never silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Conversation,
    Document,
    Web,
    Important,
    UserDefined,
}

#[derive(Debug, Error)]
#[error("invalid memory category: {0}")]
pub struct MemoryCategoryError(String);

impl MemoryCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Document => "document",
            Self::Web => "web",
            Self::Important => "important",
            Self::UserDefined => "user_defined",
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Conversation,
            Self::Document,
            Self::Web,
            Self::Important,
            Self::UserDefined,
        ]
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = MemoryCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "document" => Ok(Self::Document),
            "web" => Ok(Self::Web),
            "important" => Ok(Self::Important),
            "user_defined" => Ok(Self::UserDefined),
            other => Err(MemoryCategoryError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_round_trips() {
        for category in MemoryCategory::all() {
            let parsed: MemoryCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!("scrapbook".parse::<MemoryCategory>().is_err());
    }
}
