use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::sync::TryAcquireError;
use tokio::time::Instant;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::RateLimiter;

/// Configuration for a [`RateGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateGateConfig {
    /// Upper bound on simultaneously admitted requests
    pub max_concurrent: usize,

    /// Minimum spacing between two successive admissions
    pub min_interval: Option<Duration>,
}

impl RateGateConfig {
    pub fn new(max_concurrent: usize) -> Self {
        Self { max_concurrent, min_interval: None }
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(RateLimitError::InvalidConfig("max_concurrent must be greater than 0"));
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(RateLimitError::InvalidConfig("max_concurrent exceeds semaphore capacity"));
        }
        if self.min_interval == Some(Duration::ZERO) {
            return Err(RateLimitError::InvalidConfig("min_interval must be non-zero when set"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    granted: AtomicU64,
    released: AtomicU64,
}

/// Point-in-time view of a gate's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStats {
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub granted: u64,
    pub released: u64,
}

/// Bounds concurrent outbound requests against one upstream credential
///
/// A gate is built once and shared by `Arc` between every fetch that uses the
/// same credential, so that several batches running at once still respect a
/// single concurrency bound and admission spacing.
pub struct RateGate {
    semaphore: Arc<Semaphore>,
    config: RateGateConfig,
    /// Earliest instant the next admission may be granted
    next_slot: Mutex<Option<Instant>>,
    budget: Option<Arc<dyn RateLimiter>>,
    counters: Arc<Counters>,
}

impl RateGate {
    pub fn new(config: RateGateConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            next_slot: Mutex::new(None),
            budget: None,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Gate admitting at most `max_concurrent` requests with no spacing
    pub fn bounded(max_concurrent: usize) -> Result<Self> {
        Self::new(RateGateConfig::new(max_concurrent))
    }

    /// Draw one token from `limiter` for every admission
    pub fn with_budget<L: RateLimiter + 'static>(self, limiter: L) -> Self {
        self.with_shared_budget(Arc::new(limiter))
    }

    /// Draw from a budget that other gates may also hold
    pub fn with_shared_budget(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.budget = Some(limiter);
        self
    }

    /// Wait for admission
    ///
    /// Order of waits: a concurrency permit, then the reserved admission slot
    /// when `min_interval` is set, then the budget. Dropping the returned
    /// future at any of these points gives back whatever it held.
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.map_err(|_| RateLimitError::Closed)?;

        let booking = match self.config.min_interval {
            Some(interval) => {
                let booking = self.reserve_slot(Instant::now(), interval);
                tokio::time::sleep_until(booking.slot).await;
                Some(booking)
            }
            None => None,
        };

        if let Some(budget) = &self.budget {
            budget.acquire(1).await?;
        }

        if let Some(booking) = booking {
            booking.commit();
        }
        Ok(self.admit(permit))
    }

    /// Admit immediately or fail with [`RateLimitError::Exceeded`]
    pub fn try_acquire(&self) -> Result<GatePermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().map_err(|err| match err {
            TryAcquireError::Closed => RateLimitError::Closed,
            TryAcquireError::NoPermits => RateLimitError::Exceeded,
        })?;

        if let Some(interval) = self.config.min_interval {
            let now = Instant::now();
            let mut next = self.next_slot.lock();
            if matches!(*next, Some(slot) if slot > now) {
                return Err(RateLimitError::Exceeded);
            }
            if let Some(budget) = &self.budget {
                budget.try_acquire(1)?;
            }
            *next = Some(now + interval);
        } else if let Some(budget) = &self.budget {
            budget.try_acquire(1)?;
        }

        Ok(self.admit(permit))
    }

    /// Stop admitting; waiting and future acquisitions fail with `Closed`
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            tracing::debug!("Closing rate gate with {} requests in flight", self.counters.in_flight.load(Ordering::Acquire));
        }
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    pub fn config(&self) -> &RateGateConfig {
        &self.config
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            in_flight: self.counters.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::Acquire),
            granted: self.counters.granted.load(Ordering::Acquire),
            released: self.counters.released.load(Ordering::Acquire),
        }
    }

    fn reserve_slot(&self, now: Instant, interval: Duration) -> SlotBooking<'_> {
        let mut next = self.next_slot.lock();
        let previous = *next;
        let slot = match previous {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        *next = Some(slot + interval);
        SlotBooking { next_slot: &self.next_slot, previous, slot, booked_until: slot + interval, committed: false }
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak_in_flight.fetch_max(in_flight, Ordering::AcqRel);
        self.counters.granted.fetch_add(1, Ordering::AcqRel);
        GatePermit { _permit: permit, counters: Arc::clone(&self.counters) }
    }
}

/// An admission slot taken from `next_slot` but not yet used
///
/// Dropped uncommitted, it hands the slot back if no later waiter has booked
/// behind it. A slot with later bookings stays as a gap in the schedule.
struct SlotBooking<'a> {
    next_slot: &'a Mutex<Option<Instant>>,
    previous: Option<Instant>,
    slot: Instant,
    booked_until: Instant,
    committed: bool,
}

impl SlotBooking<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SlotBooking<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut next = self.next_slot.lock();
        if *next == Some(self.booked_until) {
            *next = self.previous;
        }
    }
}

/// Right to perform one request; capacity returns to the gate on drop
#[must_use = "dropping the permit immediately releases it"]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Runs before the semaphore permit field is dropped, so in_flight never over-reports
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.counters.released.fetch_add(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatePermit").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenBucket;

    #[test]
    fn test_invalid_config() {
        assert!(matches!(RateGate::bounded(0), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(
            RateGate::new(RateGateConfig::new(2).min_interval(Duration::ZERO)),
            Err(RateLimitError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_exceeds_bound() {
        let gate = Arc::new(RateGate::bounded(3).unwrap());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    let _permit = gate.acquire().await.unwrap();
                    assert!(gate.stats().in_flight <= 3);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let stats = gate.stats();
        assert_eq!(stats.peak_in_flight, 3);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.granted, 20);
        assert_eq!(stats.released, 20);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_spaces_admissions() {
        let gate = RateGate::new(RateGateConfig::new(10).min_interval(Duration::from_millis(100))).unwrap();

        let start = Instant::now();
        let mut grants = Vec::new();
        let mut permits = Vec::new();
        for _ in 0..4 {
            permits.push(gate.acquire().await.unwrap());
            grants.push(Instant::now() - start);
        }

        assert_eq!(grants[0], Duration::ZERO);
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100), "grants too close: {pair:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_holds_nothing() {
        let gate = RateGate::bounded(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(10), gate.acquire()).await;
        assert!(waited.is_err());
        assert_eq!(gate.stats().granted, 1);

        drop(held);
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.stats().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_spacing_returns_permit() {
        let gate = RateGate::new(RateGateConfig::new(1).min_interval(Duration::from_secs(1))).unwrap();
        drop(gate.acquire().await.unwrap());

        // Second admission must wait ~1s for its slot; give up before that
        let waited = tokio::time::timeout(Duration::from_millis(10), gate.acquire()).await;
        assert!(waited.is_err());

        assert_eq!(gate.available(), 1);
        let stats = gate.stats();
        assert_eq!(stats.granted, 1);
        assert_eq!(stats.released, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiters_do_not_push_back_admission() {
        let gate = RateGate::new(RateGateConfig::new(4).min_interval(Duration::from_millis(100))).unwrap();
        let start = Instant::now();
        let _first = gate.acquire().await.unwrap();

        for _ in 0..3 {
            let waited = tokio::time::timeout(Duration::from_millis(1), gate.acquire()).await;
            assert!(waited.is_err());
        }

        let _second = gate.acquire().await.unwrap();
        let admitted = Instant::now() - start;
        assert!(admitted >= Duration::from_millis(100), "admitted too early: {admitted:?}");
        assert!(admitted <= Duration::from_millis(110), "admitted at {admitted:?}, expected ~100ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_behind_abandoned_one_keeps_its_slot() {
        let gate = Arc::new(RateGate::new(RateGateConfig::new(4).min_interval(Duration::from_millis(100))).unwrap());
        let start = Instant::now();
        let _first = gate.acquire().await.unwrap();

        // Slot at 100ms, later abandoned
        let abandoned = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await.is_err() })
        };
        tokio::task::yield_now().await;

        // Slot at 200ms, booked behind the abandoned one
        let second = gate.acquire().await.unwrap();
        assert!(abandoned.await.unwrap());
        let admitted = Instant::now() - start;
        assert!((Duration::from_millis(200)..=Duration::from_millis(210)).contains(&admitted), "second admitted at {admitted:?}");
        drop(second);

        // The gap stays; the next free slot follows the last real booking
        let _third = gate.acquire().await.unwrap();
        let admitted = Instant::now() - start;
        assert!((Duration::from_millis(300)..=Duration::from_millis(310)).contains(&admitted), "third admitted at {admitted:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_budget_delays_admission() {
        let gate = RateGate::bounded(10).unwrap().with_budget(TokenBucket::new(1, 10.0).unwrap());
        let start = Instant::now();

        let _first = gate.acquire().await.unwrap();
        assert_eq!(Instant::now() - start, Duration::ZERO);

        let _second = gate.acquire().await.unwrap();
        let admitted = Instant::now() - start;
        assert!(admitted >= Duration::from_millis(99), "admitted too early: {admitted:?}");
        assert!(admitted <= Duration::from_millis(110), "admitted at {admitted:?}, expected ~100ms");
        assert_eq!(gate.stats().in_flight, 2);
    }

    #[tokio::test]
    async fn test_close_rejects_new_admissions() {
        let gate = RateGate::bounded(2).unwrap();
        let held = gate.acquire().await.unwrap();

        gate.close();
        assert!(gate.is_closed());
        assert!(matches!(gate.acquire().await, Err(RateLimitError::Closed)));
        assert!(matches!(gate.try_acquire(), Err(RateLimitError::Closed)));

        drop(held);
        assert_eq!(gate.stats().in_flight, 0);
    }

    #[test]
    fn test_try_acquire_respects_budget() {
        let gate = RateGate::bounded(10).unwrap().with_budget(TokenBucket::new(2, 0.001).unwrap());

        let first = gate.try_acquire().unwrap();
        let second = gate.try_acquire().unwrap();
        assert!(matches!(gate.try_acquire(), Err(RateLimitError::Exceeded)));

        // The refused attempt must not leak its concurrency permit
        assert_eq!(gate.available(), 8);
        drop((first, second));
        assert_eq!(gate.available(), 10);
    }

    #[test]
    fn test_try_acquire_respects_spacing() {
        let gate = RateGate::new(RateGateConfig::new(4).min_interval(Duration::from_secs(60))).unwrap();

        let _first = gate.try_acquire().unwrap();
        assert!(matches!(gate.try_acquire(), Err(RateLimitError::Exceeded)));
        assert_eq!(gate.available(), 3);
    }

    #[test]
    fn test_try_acquire_at_capacity() {
        let gate = RateGate::bounded(1).unwrap();
        let _held = gate.try_acquire().unwrap();
        assert!(matches!(gate.try_acquire(), Err(RateLimitError::Exceeded)));
    }
}
