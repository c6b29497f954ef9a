use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to spawn parse worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Parse worker panicked")]
    WorkerPanicked,

    #[error("Aggregator no longer accepts responses")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
