use std::time::Duration;
use std::time::Instant;

/// Per-fetch latency samples for one batch, in microseconds
#[derive(Debug, Clone)]
pub struct FetchLatencies {
    latency_us: Vec<u64>,
    start_time: Instant,
}

impl Default for FetchLatencies {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchLatencies {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { latency_us: Vec::with_capacity(capacity), start_time: Instant::now() }
    }

    pub fn record(&mut self, latency: Duration) {
        self.latency_us.push(latency.as_micros().min(u64::MAX as u128) as u64);
    }

    /// Fold in samples from a later batch; throughput keeps counting from the earlier start
    pub fn merge(&mut self, other: FetchLatencies) {
        self.latency_us.extend(other.latency_us);
        self.start_time = self.start_time.min(other.start_time);
    }

    pub fn count(&self) -> usize {
        self.latency_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latency_us.is_empty()
    }

    /// Completed fetches per second since the collector was created
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 { self.latency_us.len() as f64 / elapsed } else { 0.0 }
    }

    /// Nearest-rank percentile in microseconds, `p` in 0..=100
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.latency_us.is_empty() {
            return None;
        }

        let mut sorted = self.latency_us.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * p.clamp(0.0, 100.0) / 100.0) as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn log_summary(&self, what: &str) {
        tracing::info!("{what}: {} samples ({:.2}/sec)", self.count(), self.throughput());

        for (label, p) in [("P50", 50.0), ("P95", 95.0), ("P99", 99.0)] {
            if let Some(us) = self.percentile(p) {
                tracing::info!("  {label}: {:>10} us ({:>8.2} ms)", us, us as f64 / 1000.0);
            }
        }
    }
}
