//! Error types for the collector.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while fetching or reshaping tweet data.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required key was absent (or null where a value is required)
    /// during deserialization of a tweet payload.
    #[error("missing field `{0}` in payload")]
    MissingField(&'static str),

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Twitter API returned an error response
    #[error("Twitter API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// Transient transport failure while reading the filtered stream
    #[error("stream transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if a failed REST request is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a transport-layer failure of the live stream.
    ///
    /// Transport failures tear the stream down and reopen it; anything
    /// else propagates to the caller.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Get the suggested retry delay, if the server provided one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(Duration::from_secs(*retry_after)),
            _ => None,
        }
    }
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, Error>;
