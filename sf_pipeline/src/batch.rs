use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use sf_http::FailureKind;
use sf_http::Fetcher;
use sf_http::ResourceId;
use sf_http::Transport;
use sf_http::TimedFetch;
use sf_parser::RecordParser;

use crate::aggregate::Aggregator;
use crate::aggregate::AggregatorConfig;
use crate::cancel::Cancellation;
use crate::errors::PipelineError;
use crate::errors::Result;
use crate::metrics::FetchLatencies;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchConfig {
    pub aggregator: AggregatorConfig,

    /// Fetch futures polled at once; 0 follows the gate's concurrency bound
    pub max_in_flight: usize,
}

/// One identifier that produced no response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Position of the identifier in the batch
    pub index: usize,
    pub id: ResourceId,
    pub kind: FailureKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
pub struct BatchReport<R> {
    pub records: Vec<R>,
    pub failures: Vec<FetchFailure>,
    pub dropped: usize,
    pub cancelled: bool,
    /// Request time of every admitted fetch, from admission to outcome
    pub latencies: FetchLatencies,
    /// Time each completed fetch spent waiting for gate admission
    pub admission_waits: FetchLatencies,
}

impl<R> BatchReport<R> {
    /// Failures of the given kind
    pub fn failed(&self, kind: FailureKind) -> impl Iterator<Item = &FetchFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    /// Responses received, whether or not they parsed
    pub fn fetched(&self) -> usize {
        self.records.len() + self.dropped
    }
}

/// Fetch every identifier through `fetcher` and parse the bodies as they arrive
///
/// Failed identifiers are reported, never retried. Cancelling stops the batch
/// between completions: fetches not yet finished are dropped, which hands
/// their gate permits back, and whatever was already parsed is returned.
///
/// If the parse workers stop taking input, fetching stops, the workers are
/// joined off the async thread and the error is returned.
pub async fn run_batch<T, P>(
    fetcher: &Fetcher<T>,
    parser: Arc<P>,
    ids: &[ResourceId],
    config: BatchConfig,
    cancellation: &Cancellation,
) -> Result<BatchReport<P::Record>>
where
    T: Transport,
    P: RecordParser + 'static,
{
    let max_in_flight = if config.max_in_flight == 0 { fetcher.gate().max_concurrent() } else { config.max_in_flight };
    let aggregator = Aggregator::start(parser, config.aggregator.for_inputs(ids.len()))?;

    tracing::info!("Fetching {} instruments ({} in flight, {} parse workers)", ids.len(), max_in_flight, aggregator.worker_count());

    let mut failures = Vec::new();
    let mut latencies = FetchLatencies::with_capacity(ids.len());
    let mut admission_waits = FetchLatencies::with_capacity(ids.len());
    let mut cancelled = false;
    let mut submit_error = None;

    {
        let mut fetches = pin!(
            stream::iter(ids.iter().enumerate())
                .map(|(index, id)| async move { (index, fetcher.fetch_timed(id).await) })
                .buffer_unordered(max_in_flight.max(1))
        );

        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = fetches.next() => {
                    let Some((index, TimedFetch { outcome, queued, elapsed })) = next else { break };
                    admission_waits.record(queued);
                    if let Some(elapsed) = elapsed {
                        latencies.record(elapsed);
                    }

                    match outcome {
                        Ok(body) => {
                            if let Err(err) = aggregator.submit(index, body) {
                                tracing::error!("Parse workers stopped taking input at {}: {err}", ids[index]);
                                submit_error = Some(err);
                                break;
                            }
                        }
                        Err(err) => {
                            let id = Arc::clone(&ids[index]);
                            tracing::warn!("Fetch failed for {id}: {err}");
                            failures.push(FetchFailure { index, id, kind: err.kind(), message: err.to_string(), retry_after: err.retry_after() });
                        }
                    }
                }
            }
        }
    }

    if cancelled {
        tracing::warn!("Batch cancelled after {} of {} fetches", admission_waits.count(), ids.len());
    }

    let finished = tokio::task::spawn_blocking(move || aggregator.finish()).await.map_err(|_| PipelineError::WorkerPanicked)?;
    // Submit only fails once the workers are gone; a panic among them wins
    let aggregated = match (finished, submit_error) {
        (Err(err), _) => return Err(err),
        (Ok(_), Some(err)) => return Err(err),
        (Ok(aggregated), None) => aggregated,
    };

    if aggregated.dropped > 0 {
        tracing::warn!("Dropped {} unparseable responses", aggregated.dropped);
    }

    failures.sort_unstable_by_key(|f| f.index);

    Ok(BatchReport { records: aggregated.records, failures, dropped: aggregated.dropped, cancelled, latencies, admission_waits })
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;

    use bytes::Bytes;
    use sf_http::Endpoint;
    use sf_http::FetchError;
    use sf_http::FetchRequest;
    use sf_ratelimit::RateGate;

    use super::*;

    struct Echo;

    impl Transport for Echo {
        fn send<'a>(&'a self, request: &'a FetchRequest) -> Pin<Box<dyn Future<Output = std::result::Result<Bytes, FetchError>> + Send + 'a>> {
            Box::pin(async move {
                let symbol = &request.query[0].1;
                if symbol.starts_with("BAD") {
                    return Err(FetchError::Network("connection reset".to_string()));
                }
                Ok(Bytes::from(symbol.clone()))
            })
        }
    }

    fn ids(names: &[&str]) -> Vec<ResourceId> {
        names.iter().map(|n| ResourceId::from(*n)).collect()
    }

    fn fetcher(max_concurrent: usize) -> Fetcher<Echo> {
        Fetcher::new(Echo, Arc::new(RateGate::bounded(max_concurrent).unwrap()), Endpoint::binance_options())
    }

    fn upper(raw: &[u8]) -> Option<String> {
        let s = std::str::from_utf8(raw).ok()?;
        s.chars().all(|c| c.is_ascii_uppercase()).then(|| s.to_string())
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let ids = ids(&["AAA", "BAD1", "bbb", "CCC"]);
        let config = BatchConfig { aggregator: AggregatorConfig::default().ordered(true), max_in_flight: 0 };

        let report = run_batch(&fetcher(2), Arc::new(upper), &ids, config, &Cancellation::never()).await.unwrap();

        assert_eq!(report.records, vec!["AAA".to_string(), "CCC".to_string()]);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.fetched(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(&*report.failures[0].id, "BAD1");
        assert_eq!(report.failed(FailureKind::NetworkError).count(), 1);
        assert!(!report.cancelled);
        assert_eq!(report.latencies.count(), 4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = run_batch(&fetcher(1), Arc::new(upper), &[], BatchConfig::default(), &Cancellation::never()).await.unwrap();
        assert!(report.records.is_empty());
        assert!(report.failures.is_empty());
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_parser_panic_fails_batch() {
        fn explode(raw: &[u8]) -> Option<String> {
            assert_ne!(raw, b"BOOM", "unparseable");
            upper(raw)
        }

        let mut names = vec!["BOOM"];
        names.extend(["AAA"; 64]);
        let config = BatchConfig { aggregator: AggregatorConfig::default().workers(1), max_in_flight: 0 };

        let result = run_batch(&fetcher(4), Arc::new(explode), &ids(&names), config, &Cancellation::never()).await;
        assert!(matches!(result, Err(PipelineError::WorkerPanicked)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (handle, token) = Cancellation::pair();
        handle.cancel();

        let report = run_batch(&fetcher(1), Arc::new(upper), &ids(&["AAA", "BBB"]), BatchConfig::default(), &token).await.unwrap();
        assert!(report.cancelled);
        assert!(report.records.is_empty());
        assert_eq!(report.latencies.count(), 0);
        assert_eq!(report.admission_waits.count(), 0);
    }
}
