//! Gate presets for exchange endpoints
//!
//! Each preset builds a [`RateGate`] with a [`TokenBucket`] budget sized below
//! the exchange's published request-weight limit for one API key.

use std::time::Duration;

use crate::RateGate;
use crate::RateGateConfig;
use crate::Result;
use crate::TokenBucket;

/// Binance options (`/eapi`) ticker endpoint
///
/// - at most 5 requests in flight
/// - 50ms between admissions (20 req/s ceiling)
/// - 300 requests per minute budget, bursts of 20
pub fn binance_options() -> Result<RateGate> {
    let budget = TokenBucket::builder().burst(20).per_minute(300.0).build()?;
    let config = RateGateConfig::new(5).min_interval(Duration::from_millis(50));
    Ok(RateGate::new(config)?.with_budget(budget))
}

/// Binance spot (`/api/v3`) ticker endpoint
///
/// - at most 10 requests in flight
/// - 1_000 requests per minute budget, bursts of 50
pub fn binance_spot() -> Result<RateGate> {
    let budget = TokenBucket::builder().burst(50).per_minute(1_000.0).build()?;
    Ok(RateGate::bounded(10)?.with_budget(budget))
}

/// Build a gate from plain numbers, as read from a config file
///
/// A `requests_per_second` of zero or less disables the budget; `burst` of
/// zero defaults to one second worth of requests.
pub fn from_limits(max_concurrent: usize, min_interval: Option<Duration>, requests_per_second: f64, burst: u32) -> Result<RateGate> {
    let mut config = RateGateConfig::new(max_concurrent);
    config.min_interval = min_interval;
    let gate = RateGate::new(config)?;

    if requests_per_second <= 0.0 {
        return Ok(gate);
    }

    let mut builder = TokenBucket::builder().per_second(requests_per_second);
    if burst > 0 {
        builder = builder.burst(burst);
    }
    Ok(gate.with_budget(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RateLimitError;

    #[test]
    fn test_binance_presets() {
        let options = binance_options().unwrap();
        assert_eq!(options.max_concurrent(), 5);
        assert_eq!(options.config().min_interval, Some(Duration::from_millis(50)));

        let spot = binance_spot().unwrap();
        assert_eq!(spot.max_concurrent(), 10);
        assert_eq!(spot.config().min_interval, None);
    }

    #[test]
    fn test_from_limits() {
        let gate = from_limits(4, None, 0.0, 0).unwrap();
        assert_eq!(gate.max_concurrent(), 4);

        let gate = from_limits(4, Some(Duration::from_millis(10)), 2.0, 0).unwrap();
        let _a = gate.try_acquire().unwrap();
        // Spacing refuses the immediate second attempt
        assert!(matches!(gate.try_acquire(), Err(RateLimitError::Exceeded)));

        assert!(from_limits(0, None, 5.0, 5).is_err());
    }
}
