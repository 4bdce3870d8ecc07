//! Error types for the eval engine.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an eval.
#[derive(Debug, Error)]
pub enum Error {
    /// Artifact read or write failed.
    #[error("store error: {0}")]
    Store(#[from] hievals_store::Error),

    /// Could not spawn the agent daemon binary.
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP request to the daemon failed outright.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The daemon answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Session response parsed but carried no usable session ID.
    #[error("empty session ID in response: {body}")]
    EmptySessionId { body: String },

    /// Session response body did not parse at all.
    #[error("parsing session response: {0}")]
    SessionDecode(#[source] serde_json::Error),

    /// No daemon served the providers endpoint inside the startup window.
    #[error("providers endpoint not ready after {timeout:?}: {last_error}")]
    ProvidersUnavailable { timeout: Duration, last_error: String },

    /// A helper tool (lsof, ps) failed to run.
    #[error("running {tool}: {detail}")]
    Tool { tool: &'static str, detail: String },

    /// Cleanup could not free the ports a stale session holds.
    #[error("session ports still listening after termination attempts")]
    PortsStillListening,
}
