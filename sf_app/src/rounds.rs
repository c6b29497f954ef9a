use std::sync::Arc;

use sf_http::FailureKind;
use sf_http::Fetcher;
use sf_http::ResourceId;
use sf_http::Transport;
use sf_parser::RecordParser;
use sf_pipeline::BatchConfig;
use sf_pipeline::BatchReport;
use sf_pipeline::Cancellation;
use sf_pipeline::run_batch;

use crate::backoff::ExponentialBackoff;

/// Run a batch, then re-run its rate-limited symbols for up to `max_rounds` more rounds
///
/// Each retry round waits for the next backoff delay, or the longest
/// `Retry-After` seen in the previous round if that is longer. Failures keep
/// their index into `ids`. Records from retry rounds come after those of
/// earlier rounds, even when the batch is ordered.
pub async fn run_with_retries<T, P>(
    fetcher: &Fetcher<T>,
    parser: Arc<P>,
    ids: &[ResourceId],
    config: BatchConfig,
    max_rounds: u32,
    mut backoff: ExponentialBackoff,
    cancellation: &Cancellation,
) -> sf_pipeline::Result<BatchReport<P::Record>>
where
    T: Transport,
    P: RecordParser + 'static,
{
    let mut report = run_batch(fetcher, Arc::clone(&parser), ids, config, cancellation).await?;

    for round in 1..=max_rounds {
        if report.cancelled {
            break;
        }

        let (retry, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut report.failures).into_iter().partition(|f| f.kind == FailureKind::RateLimited);
        report.failures = kept;
        if retry.is_empty() {
            break;
        }

        let delay = backoff.next_delay_honouring(retry.iter().filter_map(|f| f.retry_after).max());
        tracing::info!("Retry round {round}/{max_rounds}: {} rate-limited symbols after {delay:?}", retry.len());

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                report.failures.extend(retry);
                report.cancelled = true;
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let original_index: Vec<usize> = retry.iter().map(|f| f.index).collect();
        let retry_ids: Vec<ResourceId> = retry.into_iter().map(|f| f.id).collect();
        let next = run_batch(fetcher, Arc::clone(&parser), &retry_ids, config, cancellation).await?;

        report.records.extend(next.records);
        report.dropped += next.dropped;
        report.cancelled = next.cancelled;
        report.latencies.merge(next.latencies);
        report.admission_waits.merge(next.admission_waits);
        report.failures.extend(next.failures.into_iter().map(|mut f| {
            f.index = original_index[f.index];
            f
        }));
    }

    report.failures.sort_unstable_by_key(|f| f.index);
    Ok(report)
}
