//! pdta-runtime: client for the remote agent execution runtime
//!
//! This crate owns the wire-level conversation with the hosted
//! chat-completions service: typed messages, the streaming event model,
//! and the OpenAI-compatible HTTP client.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::{ReplyEvent, ReplyStream};
pub use types::*;
