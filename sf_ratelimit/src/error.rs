use std::fmt;

/// Result type for admission and rate limiting operations
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Errors that can occur while acquiring admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// No permit or budget available right now
    Exceeded,

    /// Invalid configuration
    InvalidConfig(&'static str),

    /// The gate was closed and admits nothing further
    Closed,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::Exceeded => write!(f, "Rate limit exceeded"),
            RateLimitError::InvalidConfig(msg) => write!(f, "Invalid rate limiter configuration: {}", msg),
            RateLimitError::Closed => write!(f, "Rate gate closed"),
        }
    }
}

impl std::error::Error for RateLimitError {}
