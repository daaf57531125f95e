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

//! LLM backend abstraction and routing (§4.7): a uniform `LlmProvider`
//! capability set, a remote HTTP-backed implementation, a deterministic
//! local-model stand-in, and the router that picks between a primary and
//! fallback backend.

mod error;
mod local;
mod remote;
mod retry;
mod router;

pub use error::LlmError;
pub use local::LocalProvider;
pub use remote::RemoteProvider;
pub use retry::retry_with_backoff;
pub use router::{LlmRouter, EVENT_LLM_ERROR};
