//! Transport error types

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while performing the network call
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(#[source] BoxError),

    /// The connection could not be established
    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),

    /// Any other failure reported by the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[source] BoxError),

    /// A streaming request body was already sent once and cannot be replayed
    #[error("Request body was already consumed")]
    BodyConsumed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(Box::new(err))
        } else if err.is_connect() {
            Self::Connection(Box::new(err))
        } else {
            Self::Http(Box::new(err))
        }
    }
}
