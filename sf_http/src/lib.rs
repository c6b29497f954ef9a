pub mod client;
pub mod endpoint;
pub mod errors;
pub mod fetcher;
pub mod transport;

pub use client::HttpClient;
pub use client::HttpClientConfig;
pub use endpoint::Endpoint;
pub use errors::FailureKind;
pub use errors::FetchError;
pub use errors::HttpError;
pub use errors::Result;
pub use fetcher::Fetcher;
pub use fetcher::ResourceId;
pub use fetcher::TimedFetch;
pub use transport::FetchRequest;
pub use transport::Transport;
