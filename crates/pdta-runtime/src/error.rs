//! Error types for pdta-runtime

use std::time::Duration;
use thiserror::Error;

/// Result type alias using pdta-runtime Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when calling the remote agent runtime
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Invalid or missing API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The request exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The request was cancelled
    #[error("Request aborted")]
    Aborted,
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check whether this error is a deadline or cancellation, as opposed
    /// to a provider-side failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let e = Error::api("invalid_request_error", "model not found");
        assert_eq!(
            e.to_string(),
            "API error: model not found (type: invalid_request_error)"
        );
    }

    #[test]
    fn test_interrupted_variants() {
        assert!(Error::Timeout(Duration::from_secs(30)).is_interrupted());
        assert!(Error::Aborted.is_interrupted());
        assert!(!Error::InvalidApiKey.is_interrupted());
        assert!(!Error::api("server_error", "boom").is_interrupted());
    }
}
