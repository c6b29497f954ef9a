use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::errors::FetchError;

/// One outbound GET, fully resolved
#[derive(Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub api_key: Option<Arc<str>>,
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("url", &self.url)
            .field("query", &self.query)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Network capability the fetcher depends on
///
/// `send` performs exactly one request and returns the raw response body.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a FetchRequest) -> Pin<Box<dyn Future<Output = Result<Bytes, FetchError>> + Send + 'a>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send<'a>(&'a self, request: &'a FetchRequest) -> Pin<Box<dyn Future<Output = Result<Bytes, FetchError>> + Send + 'a>> {
        (**self).send(request)
    }
}
