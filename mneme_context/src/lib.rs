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

//! The context assembler (§4.6): token budgeting, five assembly modes
//! (memory-only, document, web, history, combined), paragraph-aware
//! truncation, and deterministic personality-clause system prompts.

mod assemble;
mod item;
mod personality;
mod templates;
mod token;
mod truncate;

pub use assemble::{
    AssembledPrompt, CombinedRatios, CombinedSources, ContextAssembler, EVENT_CONTEXT_BUILT, EVENT_CONTEXT_COMBINED_BUILT,
    EVENT_CONTEXT_DOCUMENT_BUILT, EVENT_CONTEXT_HISTORY_BUILT, EVENT_CONTEXT_WEB_BUILT,
};
pub use item::{format_memory_items, ContextMemoryItem};
pub use personality::{build_system_prompt, Formality, Level, PersonalitySettings, Style, Verbosity};
pub use token::{TokenBudget, TokenCounter, WordCountEstimator};
pub use truncate::truncate_to_token_limit;
