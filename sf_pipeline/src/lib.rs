//! # sf_pipeline
//!
//! Fetch a batch of instruments through a shared rate gate and parse the
//! responses on a fixed pool of worker threads.

pub mod aggregate;
pub mod batch;
pub mod cancel;
pub mod errors;
pub mod metrics;

pub use aggregate::Aggregated;
pub use aggregate::Aggregator;
pub use aggregate::AggregatorConfig;
pub use aggregate::aggregate;
pub use batch::BatchConfig;
pub use batch::BatchReport;
pub use batch::FetchFailure;
pub use batch::run_batch;
pub use cancel::CancelHandle;
pub use cancel::Cancellation;
pub use errors::PipelineError;
pub use errors::Result;
pub use metrics::FetchLatencies;
