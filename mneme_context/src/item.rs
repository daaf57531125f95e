//! The memory-item shape the context assembler formats (§4.6). Deliberately
//! independent of `mneme_store::MemoryItem` — this crate depends on nothing
//! but `mneme_core`/`mneme_events`, so callers adapt their own item type
//! into this one at the call site.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMemoryItem {
    pub content: String,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ContextMemoryItem {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), source_type: None, source_id: None, timestamp: None }
    }
}

/// One bullet per item, joined by a single newline — source/timestamp
/// annotations are appended inline when present (§4.6).
#[must_use]
pub fn format_memory_items(items: &[ContextMemoryItem]) -> String {
    items
        .iter()
        .map(|item| {
            let mut line = format!("- {}", item.content);
            if let (Some(source_type), Some(source_id)) = (&item.source_type, &item.source_id) {
                line.push_str(&format!(" (source: {source_type} {source_id})"));
            }
            if let Some(timestamp) = item.timestamp {
                line.push_str(&format!(" - {}", timestamp.to_rfc3339()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
