//! Errors raised while talking to the generation service.

use serde::{Deserialize, Serialize};

/// Failure of a request against the generation service.
///
/// Variants serialize so that cassettes can replay failures exactly as
/// they were recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// The request was rejected locally before anything was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The service answered with a non-success HTTP status.
    #[error("Generation service responded with HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The request could not be delivered (DNS, connect, TLS, ...).
    #[error("Request to generation service failed: {0}")]
    Transport(String),
    /// The response body broke off while it was being read.
    #[error("Failed to read generation stream: {0}")]
    Read(String),
    /// The service reported a business-level error (bad credential,
    /// unknown repository, quota exceeded, ...). Passed through verbatim.
    #[error("{0}")]
    Service(String),
}

impl GenerationError {
    /// Message stored in the stream state when this error ends a generation.
    #[must_use]
    pub fn stream_message(&self) -> String {
        match self {
            Self::Status { .. } => "Failed to start streaming".to_string(),
            other => other.to_string(),
        }
    }
}
