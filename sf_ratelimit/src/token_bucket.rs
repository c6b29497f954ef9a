use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::time::MonotonicClock;
use crate::time::refill_wait;

// Tokens are tracked in thousandths so slow refill rates still make progress
const MILLI: u64 = 1_000;

// Upper bound on a single sleep while waiting for tokens, so reset() is noticed
const MAX_WAIT: Duration = Duration::from_millis(250);

/// Lock-free token bucket used as a per-credential request budget
///
/// The bucket starts full at `burst` tokens and refills continuously at
/// `per_second` tokens per second, never exceeding `burst`.
pub struct TokenBucket {
    /// Available tokens, in milli-tokens
    milli_tokens: AtomicU64,

    /// Clock reading of the last refill, in nanoseconds
    last_refill: AtomicU64,

    burst: u32,

    /// Refill rate in milli-tokens per second
    milli_per_sec: u64,

    clock: MonotonicClock,
}

impl TokenBucket {
    /// Create a bucket holding `burst` tokens that refills at `per_second`
    pub fn new(burst: u32, per_second: f64) -> Result<Self> {
        if burst == 0 {
            return Err(RateLimitError::InvalidConfig("burst must be greater than 0"));
        }
        if !per_second.is_finite() || per_second <= 0.0 {
            return Err(RateLimitError::InvalidConfig("refill rate must be a positive number"));
        }

        let clock = MonotonicClock::new();
        let milli_per_sec = ((per_second * MILLI as f64).round() as u64).max(1);

        Ok(Self {
            milli_tokens: AtomicU64::new(burst as u64 * MILLI),
            last_refill: AtomicU64::new(clock.now_nanos()),
            burst,
            milli_per_sec,
            clock,
        })
    }

    pub fn builder() -> TokenBucketBuilder {
        TokenBucketBuilder::new()
    }

    /// Refill rate in tokens per second
    pub fn per_second(&self) -> f64 {
        self.milli_per_sec as f64 / MILLI as f64
    }

    #[inline(always)]
    fn refill(&self) {
        let now = self.clock.now_nanos();
        let last = self.last_refill.load(Ordering::Acquire);
        let elapsed = now.saturating_sub(last);
        if elapsed == 0 {
            return;
        }

        let added = (elapsed as u128 * self.milli_per_sec as u128 / 1_000_000_000) as u64;
        if added == 0 {
            return;
        }

        // Whoever advances the timestamp owns the refill for that interval
        if self.last_refill.compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed).is_err() {
            return;
        }

        let cap = self.burst as u64 * MILLI;
        // Err only means the bucket was already full
        let _ = self.milli_tokens.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            let next = current.saturating_add(added).min(cap);
            (next != current).then_some(next)
        });
    }

    /// How long until `weight` tokens could be available, zero if they are now
    fn wait_for(&self, weight: u32) -> Duration {
        let required = weight as u64 * MILLI;
        let current = self.milli_tokens.load(Ordering::Acquire);
        refill_wait(required.saturating_sub(current), self.milli_per_sec)
    }
}

impl RateLimiter for TokenBucket {
    fn try_acquire(&self, weight: u32) -> Result<()> {
        if weight == 0 {
            return Ok(());
        }
        if weight > self.burst {
            return Err(RateLimitError::InvalidConfig("weight exceeds bucket burst"));
        }

        self.refill();

        let required = weight as u64 * MILLI;
        self.milli_tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| current.checked_sub(required))
            .map(|_| ())
            .map_err(|_| RateLimitError::Exceeded)
    }

    fn acquire(&self, weight: u32) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            loop {
                match self.try_acquire(weight) {
                    Ok(()) => return Ok(()),
                    Err(RateLimitError::Exceeded) => {
                        let wait = self.wait_for(weight).clamp(Duration::from_micros(100), MAX_WAIT);
                        tokio::time::sleep(wait).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }

    fn available(&self) -> u32 {
        self.refill();
        (self.milli_tokens.load(Ordering::Acquire) / MILLI) as u32
    }

    fn capacity(&self) -> u32 {
        self.burst
    }

    fn reset(&self) {
        self.milli_tokens.store(self.burst as u64 * MILLI, Ordering::Release);
        self.last_refill.store(self.clock.now_nanos(), Ordering::Release);
    }
}

/// Builder for a [`TokenBucket`]
pub struct TokenBucketBuilder {
    burst: Option<u32>,
    per_second: Option<f64>,
}

impl TokenBucketBuilder {
    pub fn new() -> Self {
        Self { burst: None, per_second: None }
    }

    /// Maximum tokens held at once
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Refill rate in tokens per second
    pub fn per_second(mut self, rate: f64) -> Self {
        self.per_second = Some(rate);
        self
    }

    /// Refill rate in tokens per minute
    pub fn per_minute(mut self, rate: f64) -> Self {
        self.per_second = Some(rate / 60.0);
        self
    }

    /// Build the bucket; a missing burst defaults to one second of refill
    pub fn build(self) -> Result<TokenBucket> {
        let per_second = self.per_second.ok_or(RateLimitError::InvalidConfig("refill rate must be set"))?;
        let burst = self.burst.unwrap_or_else(|| per_second.ceil().max(1.0) as u32);
        TokenBucket::new(burst, per_second)
    }
}

impl Default for TokenBucketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
