use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use reqwest::ClientBuilder;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::header::RETRY_AFTER;

use crate::errors::FetchError;
use crate::errors::Result;
use crate::transport::FetchRequest;
use crate::transport::Transport;

/// Header carrying the API key on Binance endpoints
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Connection and timeout settings for [`HttpClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Idle keep-alive connections kept per exchange host
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub connect_timeout: Duration,
    /// Whole-request bound, from send to last body byte
    pub request_timeout: Duration,
    pub tcp_nodelay: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
        }
    }
}

/// reqwest-backed [`Transport`]
///
/// One client, and so one connection pool, is shared by every fetch.
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(config.tcp_nodelay)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            // rustls only, TLS 1.2 floor
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .http2_adaptive_window(true)
            .gzip(true)
            .brotli(true)
            .hickory_dns(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.request_timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Map a non-success status to a fetch error; `None` for 2xx
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    // 418 is Binance's follow-up to ignored 429s (temporary IP ban)
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
        // Binance sends delay-seconds; an HTTP-date value is left as no hint
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Some(FetchError::RateLimited { status: status.as_u16(), retry_after });
    }

    Some(FetchError::Network(format!("HTTP {status}")))
}

impl Transport for HttpClient {
    fn send<'a>(&'a self, request: &'a FetchRequest) -> Pin<Box<dyn Future<Output = std::result::Result<Bytes, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url).query(&request.query);
            if let Some(key) = &request.api_key {
                builder = builder.header(API_KEY_HEADER, key.as_ref());
            }

            let response = builder.send().await.map_err(|err| self.classify(err))?;

            if let Some(err) = classify_status(response.status(), response.headers()) {
                return Err(err);
            }

            response.bytes().await.map_err(|err| self.classify(err))
        })
    }
}
