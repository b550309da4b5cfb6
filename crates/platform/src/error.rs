//! Errors from the platform client.

use thiserror::Error;

/// Errors that can occur when talking to the platform.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with an error status.
    #[error("platform returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A unique constraint rejected the write.
    #[error("conflict on {table}: {message}")]
    Conflict {
        /// Table the write targeted.
        table: &'static str,
        /// Constraint details.
        message: String,
    },

    /// Rate limited by the platform.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Realtime subscription failed.
    #[error("realtime error: {0}")]
    Realtime(String),

    /// File storage rejected an upload.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BackendError {
    /// `true` for unique-constraint violations.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Realtime(err.to_string())
    }
}
