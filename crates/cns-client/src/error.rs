//! CNS client errors

use thiserror::Error;

/// Errors that can occur when talking to the container networking service
#[derive(Debug, Error)]
pub enum CnsError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CNS answered with a non-zero return code or a failing HTTP status
    #[error("CNS API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
