use std::fmt;
use std::time::Duration;

use sf_ratelimit::RateLimitError;
use thiserror::Error;

/// Errors raised while building the HTTP stack
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP client construction failed: {0}")]
    Build(#[from] reqwest::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// Failure of a single fetch; never retried by the fetcher itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Rate limited by upstream (HTTP {status})")]
    RateLimited { status: u16, retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Admission refused: {0}")]
    Admission(#[from] RateLimitError),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::RateLimited { .. } => FailureKind::RateLimited,
            FetchError::Network(_) => FailureKind::NetworkError,
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::Admission(RateLimitError::Closed) => FailureKind::Cancelled,
            FetchError::Admission(_) => FailureKind::RateLimited,
        }
    }

    /// Server-suggested wait before trying again, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Coarse classification of a fetch failure, reported per identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RateLimited,
    NetworkError,
    Timeout,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::RateLimited => "RateLimited",
            FailureKind::NetworkError => "NetworkError",
            FailureKind::Timeout => "Timeout",
            FailureKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}
