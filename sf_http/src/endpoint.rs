use std::fmt;
use std::sync::Arc;

use crate::errors::HttpError;
use crate::errors::Result;
use crate::transport::FetchRequest;

const BINANCE_OPTIONS_URL: &str = "https://eapi.binance.com";
const BINANCE_OPTIONS_TICKER: &str = "/eapi/v1/ticker";
const BINANCE_SPOT_URL: &str = "https://api.binance.com";
const BINANCE_SPOT_TICKER: &str = "/api/v3/ticker/24hr";

/// Where and how to ask for one resource
#[derive(Clone)]
pub struct Endpoint {
    base_url: String,
    path: String,
    symbol_param: String,
    api_key: Option<Arc<str>>,
}

impl Endpoint {
    /// Endpoint querying `base_url` + `path` with `?symbol=<id>`
    pub fn new(base_url: &str, path: &str) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpError::InvalidEndpoint(format!("base url must be http(s): {base_url}")));
        }

        let path = if path.is_empty() || path.starts_with('/') { path.to_string() } else { format!("/{path}") };

        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), path, symbol_param: "symbol".to_string(), api_key: None })
    }

    /// Binance options 24h ticker
    pub fn binance_options() -> Self {
        Self {
            base_url: BINANCE_OPTIONS_URL.to_string(),
            path: BINANCE_OPTIONS_TICKER.to_string(),
            symbol_param: "symbol".to_string(),
            api_key: None,
        }
    }

    /// Binance spot 24h ticker
    pub fn binance_spot() -> Self {
        Self { base_url: BINANCE_SPOT_URL.to_string(), path: BINANCE_SPOT_TICKER.to_string(), symbol_param: "symbol".to_string(), api_key: None }
    }

    /// Name of the query parameter carrying the identifier
    pub fn symbol_param(mut self, name: &str) -> Self {
        self.symbol_param = name.to_string();
        self
    }

    /// API key sent with every request; empty keys are ignored
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty()).map(Arc::from);
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the request for one identifier
    pub fn request(&self, id: &str) -> FetchRequest {
        FetchRequest { url: self.url(), query: vec![(self.symbol_param.clone(), id.to_string())], api_key: self.api_key.clone() }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url())
            .field("symbol_param", &self.symbol_param)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_options_request() {
        let request = Endpoint::binance_options().request("BTC-200730-9000-C");
        assert_eq!(request.url, "https://eapi.binance.com/eapi/v1/ticker");
        assert_eq!(request.query, vec![("symbol".to_string(), "BTC-200730-9000-C".to_string())]);
        assert!(request.api_key.is_none());
    }

    #[test]
    fn test_custom_endpoint_normalises_slashes() {
        let endpoint = Endpoint::new("http://localhost:8080/", "ticker").unwrap().symbol_param("instId");
        let request = endpoint.request("ETH-USD");
        assert_eq!(request.url, "http://localhost:8080/ticker");
        assert_eq!(request.query[0].0, "instId");
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(Endpoint::new("ftp://host", "/x"), Err(HttpError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_api_key_handling() {
        let endpoint = Endpoint::binance_spot().api_key(Some("abc".into()));
        assert!(endpoint.has_api_key());
        assert_eq!(endpoint.request("BTCUSDT").api_key.as_deref(), Some("abc"));
        assert!(!format!("{endpoint:?}").contains("abc"));

        assert!(!Endpoint::binance_spot().api_key(Some(String::new())).has_api_key());
    }
}
