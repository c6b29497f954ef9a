//! Admission control for outbound exchange requests.
//!
//! [`RateGate`] bounds how many requests are in flight at once, optionally
//! spaces successive admissions, and can draw from a shared [`RateLimiter`]
//! budget such as a [`TokenBucket`].

pub mod error;
pub mod gate;
pub mod limiter;
pub mod presets;
mod time;
pub mod token_bucket;

pub use error::RateLimitError;
pub use error::Result;
pub use gate::GatePermit;
pub use gate::GateStats;
pub use gate::RateGate;
pub use gate::RateGateConfig;
pub use limiter::RateLimiter;
pub use token_bucket::TokenBucket;
pub use token_bucket::TokenBucketBuilder;
