//! Error types for remote fetching.

use thiserror::Error;

use dp1_core::{CoreError, ValidationError};

/// Errors that can occur fetching or loading a playlist.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The input could not be parsed as an absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection, TLS or body read failure.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The request did not complete within the configured timeout.
    #[error("timed out fetching {0}")]
    Timeout(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The response body exceeded the configured size cap.
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    /// The body is not a decodable playlist.
    #[error("failed to decode playlist: {0}")]
    Decode(String),

    /// The playlist decoded but is structurally invalid.
    #[error("playlist validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<CoreError> for FetchError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(v) => FetchError::Validation(v),
            other => FetchError::Decode(other.to_string()),
        }
    }
}

impl FetchError {
    /// Map a reqwest error for `url` onto the matching variant.
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
