use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::bounded;
use sf_parser::RecordParser;

use crate::errors::PipelineError;
use crate::errors::Result;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Sizing and ordering of the parse worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Worker threads; 0 means one per logical CPU
    pub workers: usize,

    /// Bound on raw responses waiting to be parsed
    pub queue_capacity: usize,

    /// Return records in submission-index order instead of completion order
    pub ordered: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { workers: 0, queue_capacity: DEFAULT_QUEUE_CAPACITY, ordered: false }
    }
}

impl AggregatorConfig {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 { num_cpus::get().max(1) } else { self.workers }
    }

    /// Size the pool for a known number of inputs
    ///
    /// Never more workers than inputs, and a queue that holds every input so
    /// submitting never blocks.
    pub fn for_inputs(mut self, inputs: usize) -> Self {
        self.workers = self.effective_workers().min(inputs).max(1);
        self.queue_capacity = inputs.max(1);
        self
    }
}

/// Result of running the parser over a set of raw responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregated<R> {
    pub records: Vec<R>,
    pub parsed: usize,
    pub dropped: usize,
}

impl<R> Aggregated<R> {
    /// Number of raw responses that went in
    pub fn inputs(&self) -> usize {
        self.parsed + self.dropped
    }
}

/// Each worker's private share of the output, merged once at the end
struct Partition<R> {
    records: Vec<(usize, R)>,
    dropped: usize,
}

/// Fixed pool of parse threads fed through a bounded queue
///
/// Workers share nothing but the queue; every worker fills its own
/// partition, and [`Aggregator::finish`] merges the partitions on the caller's
/// thread.
pub struct Aggregator<P: RecordParser> {
    sender: Option<Sender<(usize, Bytes)>>,
    workers: Vec<JoinHandle<Partition<P::Record>>>,
    ordered: bool,
}

impl<P: RecordParser + 'static> Aggregator<P> {
    pub fn start(parser: Arc<P>, config: AggregatorConfig) -> Result<Self> {
        let (tx, rx) = bounded::<(usize, Bytes)>(config.queue_capacity.max(1));
        let worker_count = config.effective_workers();

        let mut aggregator = Self { sender: Some(tx), workers: Vec::with_capacity(worker_count), ordered: config.ordered };

        for id in 0..worker_count {
            let rx = rx.clone();
            let parser = Arc::clone(&parser);
            let handle = std::thread::Builder::new().name(format!("sf-parse-{id}")).spawn(move || parse_worker(parser.as_ref(), rx))?;
            aggregator.workers.push(handle);
        }

        tracing::debug!("Started {worker_count} parse workers (queue capacity {})", config.queue_capacity.max(1));
        Ok(aggregator)
    }

    /// Hand one raw response to the pool; blocks while the queue is full
    pub fn submit(&self, index: usize, raw: Bytes) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(PipelineError::Closed)?;
        sender.send((index, raw)).map_err(|_| PipelineError::Closed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue, wait for the workers and merge their partitions
    pub fn finish(mut self) -> Result<Aggregated<P::Record>> {
        self.sender = None;

        let mut partitions = Vec::with_capacity(self.workers.len());
        let mut panicked = false;
        for handle in std::mem::take(&mut self.workers) {
            match handle.join() {
                Ok(partition) => partitions.push(partition),
                Err(_) => panicked = true,
            }
        }
        if panicked {
            return Err(PipelineError::WorkerPanicked);
        }

        let dropped = partitions.iter().map(|p| p.dropped).sum();
        let mut tagged: Vec<(usize, P::Record)> = Vec::with_capacity(partitions.iter().map(|p| p.records.len()).sum());
        for partition in partitions {
            tagged.extend(partition.records);
        }

        if self.ordered {
            tagged.sort_unstable_by_key(|(index, _)| *index);
        }

        let records: Vec<P::Record> = tagged.into_iter().map(|(_, record)| record).collect();
        Ok(Aggregated { parsed: records.len(), records, dropped })
    }
}

impl<P: RecordParser> Drop for Aggregator<P> {
    fn drop(&mut self) {
        // Unfinished aggregators still shut their workers down
        self.sender = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn parse_worker<P: RecordParser>(parser: &P, rx: Receiver<(usize, Bytes)>) -> Partition<P::Record> {
    let mut partition = Partition { records: Vec::new(), dropped: 0 };

    for (index, raw) in rx.iter() {
        match parser.parse(&raw) {
            Some(record) => partition.records.push((index, record)),
            None => {
                partition.dropped += 1;
                tracing::trace!("Dropped unparseable response #{index} ({} bytes)", raw.len());
            }
        }
    }

    partition
}

/// Parse a whole batch of raw responses on a worker pool
pub fn aggregate<P: RecordParser + 'static>(parser: Arc<P>, responses: Vec<Bytes>, config: AggregatorConfig) -> Result<Aggregated<P::Record>> {
    if responses.is_empty() {
        return Ok(Aggregated { records: Vec::new(), parsed: 0, dropped: 0 });
    }

    let aggregator = Aggregator::start(parser, config.for_inputs(responses.len()))?;
    for (index, raw) in responses.into_iter().enumerate() {
        aggregator.submit(index, raw)?;
    }
    aggregator.finish()
}
