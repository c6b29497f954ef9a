use std::time::Duration;

use tokio::time::Instant;

/// Monotonic clock measuring nanoseconds from a fixed epoch
///
/// Reads the tokio clock, so refills follow paused and advanced test time
/// the same way the gate's spacing does. Outside a runtime it is the system
/// monotonic clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    #[inline(always)]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    /// Nanoseconds elapsed since the clock was created
    #[inline(always)]
    pub fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time needed to accumulate `milli_tokens` at `milli_per_sec`
#[inline]
pub(crate) fn refill_wait(milli_tokens: u64, milli_per_sec: u64) -> Duration {
    if milli_per_sec == 0 {
        return Duration::MAX;
    }
    let nanos = (milli_tokens as u128 * 1_000_000_000).div_ceil(milli_per_sec as u128);
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = MonotonicClock::new();
        let t1 = clock.now_nanos();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = clock.now_nanos();

        assert!(t2 - t1 >= 5_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_paused_time() {
        let clock = MonotonicClock::new();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_nanos(), 250_000_000);
    }

    #[test]
    fn test_refill_wait() {
        // 1 token at 10 tokens/sec takes 100ms
        assert_eq!(refill_wait(1_000, 10_000), Duration::from_millis(100));
        // Half a token at 1 token/sec takes 500ms
        assert_eq!(refill_wait(500, 1_000), Duration::from_millis(500));
        assert_eq!(refill_wait(1, 0), Duration::MAX);
    }
}
