//! Error types for the LogDB client.

/// Error type for LogDB operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be sent or its response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status other than 409.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The server reported a stale or contended read cursor (409).
    #[error("read cursor conflict")]
    Conflict,

    /// Fetch kept conflicting after the configured number of nack + retry rounds.
    #[error("fetch still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { attempts: u32 },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The log is not reachable (used by the in-memory log for injected failures).
    #[error("log unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Whether this error is the 409 conflict signal.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict)
    }
}

/// Result type alias for LogDB operations.
pub type Result<T> = std::result::Result<T, Error>;
