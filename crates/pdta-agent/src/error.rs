//! Error types for pdta-agent

use thiserror::Error;

/// Result type alias using pdta-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration at startup (e.g. no API key).
    /// Fatal: surfaced to the operator before any request is served.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error from the runtime client layer
    #[error(transparent)]
    Runtime(#[from] pdta_runtime::Error),
}
