//! pdta-agent: conversational agent session over the PDTA guideline
//!
//! This crate owns the conversation transcript and mediates between user
//! turns and the remote agent runtime, in both blocking and streaming form.

pub mod error;
pub mod prompt;
pub mod registry;
pub mod runtime;
pub mod session;

pub use error::{Error, Result};
pub use registry::{SessionId, SessionRegistry};
pub use runtime::{ProviderRuntime, Runtime};
pub use session::{AgentSession, SessionOptions, FALLBACK_NOTICE};
