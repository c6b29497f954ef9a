use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// A request budget that hands out weighted tokens
///
/// Implementations must be shareable across tasks; a [`crate::RateGate`] holds
/// one behind an `Arc` so several gates can draw from the same credential.
pub trait RateLimiter: Send + Sync {
    /// Take `weight` tokens if they are available right now
    fn try_acquire(&self, weight: u32) -> Result<()>;

    /// Wait until `weight` tokens are available, then take them
    fn acquire(&self, weight: u32) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Tokens currently available
    fn available(&self) -> u32;

    /// Maximum number of tokens the budget can hold
    fn capacity(&self) -> u32;

    /// Refill to capacity
    fn reset(&self);
}
