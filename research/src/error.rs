//! Fetch error taxonomy shared by RetryExecutor, FallbackChain, URLProcessor, and scrapers

use std::time::Duration;

use thiserror::Error;

/// The tag vocabulary `retryableErrors` is expressed in terms of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    Timeout,
    NetworkError,
    RateLimit,
    ServerError,
    ClientError,
}

/// Errors a URL fetch (via a [`crate::scraper::Scraper`]) can fail with.
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("client error {status}: {message}")]
    ClientError { status: u16, message: String },
}

impl FetchError {
    pub fn tag(&self) -> ErrorTag {
        match self {
            FetchError::Timeout(_) => ErrorTag::Timeout,
            FetchError::NetworkError(_) => ErrorTag::NetworkError,
            FetchError::RateLimit { .. } => ErrorTag::RateLimit,
            FetchError::ServerError { .. } => ErrorTag::ServerError,
            FetchError::ClientError { .. } => ErrorTag::ClientError,
        }
    }

    /// Maps an HTTP status code to a classified fetch error the way a scraper would.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => FetchError::RateLimit { retry_after: None },
            500..=599 => FetchError::ServerError { status, message },
            400..=499 => FetchError::ClientError { status, message },
            _ => FetchError::ServerError { status, message },
        }
    }

    pub fn is_retryable(&self, retryable_status_codes: &[u16]) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::NetworkError(_) | FetchError::RateLimit { .. } => true,
            FetchError::ServerError { status, .. } | FetchError::ClientError { status, .. } => {
                retryable_status_codes.contains(status)
            }
        }
    }
}
