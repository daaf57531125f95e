//! The fixed context-wrapping preambles (§4.6, §9 Glossary).

/// Wraps retrieved memory items for the memory-only assembly mode.
#[must_use]
pub fn wrap_memory_context(memory_text: &str) -> String {
    format!("Here is some relevant information from memory that may help with this request:\n\n{memory_text}\n\nUse it when it's relevant to the response.")
}

/// Wraps retrieved memory items for the combined assembly mode. Kept
/// distinct from [`wrap_memory_context`] because the source keeps two
/// separate templates (`CONTEXT_PROMPT` vs `MEMORY_PROMPT`) for the same
/// shape of content in the two call sites.
#[must_use]
pub fn wrap_combined_memories(memory_text: &str) -> String {
    format!("Here are some relevant memories that may help with this request:\n\n{memory_text}\n\nUse them when they're relevant to the response.")
}

#[must_use]
pub fn wrap_document_context(document_content: &str) -> String {
    format!("Here is content from a document the user referenced:\n\n{document_content}\n\nUse it to inform the response.")
}

#[must_use]
pub fn wrap_web_context(web_content: &str) -> String {
    format!("Here is content from a web page that may be relevant:\n\n{web_content}\n\nUse it to inform the response when relevant.")
}
