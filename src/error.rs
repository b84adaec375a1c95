//! Error types for fusegate

use std::io;

use thiserror::Error;

/// Result type alias for fusegate
pub type Result<T> = std::result::Result<T, Error>;

/// Fusegate errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Isolation limit exceeded for a route
    #[error("Concurrency limit reached for route: {0}")]
    Rejected(String),

    /// Circuit breaker is open for a route
    #[error("Circuit open for route: {0}")]
    CircuitOpen(String),

    /// Downstream call exceeded its deadline
    #[error("Downstream timeout: {0}")]
    Timeout(String),

    /// Downstream call completed with a failure
    #[error("Downstream error: {0}")]
    Downstream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status a gateway would surface for this error when it reaches
    /// the edge without a fallback body.
    #[must_use]
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Rejected(_) | Self::CircuitOpen(_) => 503,
            Self::Timeout(_) => 504,
            Self::Downstream(_) | Self::Http(_) => 502,
            _ => 500,
        }
    }
}
