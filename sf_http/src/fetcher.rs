use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use sf_ratelimit::RateGate;
use tokio::time::Instant;

use crate::endpoint::Endpoint;
use crate::errors::FetchError;
use crate::transport::Transport;

/// Caller-supplied name of an instrument to fetch
pub type ResourceId = Arc<str>;

/// Outcome of one fetch with where its time went
#[derive(Debug)]
pub struct TimedFetch {
    pub outcome: Result<Bytes, FetchError>,
    /// Waiting for gate admission
    pub queued: Duration,
    /// From admission to outcome; `None` when the gate refused admission
    pub elapsed: Option<Duration>,
}

/// Issues one gated request per identifier
///
/// Every fetch holds a [`sf_ratelimit::GatePermit`] from before the request
/// is sent until its outcome is known. Failures come back as-is; retrying is
/// left to the caller.
pub struct Fetcher<T> {
    transport: T,
    gate: Arc<RateGate>,
    endpoint: Endpoint,
    timeout: Option<Duration>,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, gate: Arc<RateGate>, endpoint: Endpoint) -> Self {
        Self { transport, gate, endpoint, timeout: None }
    }

    /// Bound each request, measured from admission
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn fetch(&self, id: &str) -> Result<Bytes, FetchError> {
        self.fetch_timed(id).await.outcome
    }

    /// Like [`Fetcher::fetch`], also reporting admission wait and request time separately
    pub async fn fetch_timed(&self, id: &str) -> TimedFetch {
        let request = self.endpoint.request(id);

        let queued_at = Instant::now();
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(err) => return TimedFetch { outcome: Err(err.into()), queued: queued_at.elapsed(), elapsed: None },
        };
        let queued = queued_at.elapsed();

        let started = Instant::now();
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(&request)).await.unwrap_or(Err(FetchError::Timeout(limit))),
            None => self.transport.send(&request).await,
        };
        let elapsed = started.elapsed();

        match &outcome {
            Ok(body) => tracing::trace!("Fetched {id}: {} bytes in {elapsed:?} after {queued:?} queued", body.len()),
            Err(err) => tracing::debug!("Fetch of {id} failed after {elapsed:?}: {err}"),
        }

        TimedFetch { outcome, queued, elapsed: Some(elapsed) }
    }
}
