use std::time::Duration;

/// Exponential backoff between retry rounds
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { current: initial.min(max), max }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        delay
    }

    /// Next delay, stretched to a server-provided `Retry-After` when that is longer
    pub fn next_delay_honouring(&mut self, retry_after: Option<Duration>) -> Duration {
        let delay = self.next_delay();
        retry_after.map_or(delay, |hint| delay.max(hint))
    }
}
