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

//! The conversation orchestrator (§4.8): ties retrieval, context assembly
//! and LLM generation into one turn, persisting both sides of the exchange
//! and tagging each into memory.

mod error;
mod orchestrator;

pub use error::ConversationError;
pub use orchestrator::{ConversationOrchestrator, ConversationStore, ProcessedMessage, ResponseGenerator, EVENT_MESSAGE_PROCESSED};
