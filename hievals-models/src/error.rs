//! Error types for catalog and model operations.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the provider catalog.
#[derive(Debug, Error)]
pub enum Error {
    /// Request to the agent daemon failed outright.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Daemon answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match any accepted shape.
    #[error("decoding providers response: {0}")]
    Decode(#[from] serde_json::Error),
}
