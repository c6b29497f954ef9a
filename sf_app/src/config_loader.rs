use std::path::Path;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use sf_http::Endpoint;
use sf_http::HttpClientConfig;
use sf_pipeline::AggregatorConfig;
use sf_ratelimit::RateGate;

use crate::backoff::ExponentialBackoff;

/// Prefix for environment overrides, e.g. `SF__GATE__MAX_CONCURRENT=3`
pub const ENV_PREFIX: &str = "SF";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    pub base_url: String,
    pub path: String,
    pub symbol_param: String,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self { base_url: "https://eapi.binance.com".to_string(), path: "/eapi/v1/ticker".to_string(), symbol_param: "symbol".to_string() }
    }
}

impl EndpointSection {
    pub fn build(&self, api_key: Option<String>) -> sf_http::Result<Endpoint> {
        Ok(Endpoint::new(&self.base_url, &self.path)?.symbol_param(&self.symbol_param).api_key(api_key))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GateSection {
    pub max_concurrent: usize,
    /// 0 disables spacing
    pub min_interval_ms: u64,
    /// 0 disables the token budget
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for GateSection {
    fn default() -> Self {
        Self { max_concurrent: 5, min_interval_ms: 50, requests_per_second: 5.0, burst: 20 }
    }
}

impl GateSection {
    pub fn build(&self) -> sf_ratelimit::Result<RateGate> {
        let min_interval = (self.min_interval_ms > 0).then(|| Duration::from_millis(self.min_interval_ms));
        sf_ratelimit::presets::from_limits(self.max_concurrent, min_interval, self.requests_per_second, self.burst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            connect_timeout_ms: defaults.connect_timeout.as_millis() as u64,
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
            pool_max_idle_per_host: defaults.pool_max_idle_per_host,
        }
    }
}

impl HttpSection {
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: self.request_timeout(),
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            ..HttpClientConfig::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AggregateSection {
    /// 0 means one worker per logical CPU
    pub workers: usize,
    pub ordered: bool,
}

impl AggregateSection {
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig::default().workers(self.workers).ordered(self.ordered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Extra rounds for rate-limited symbols; 0 disables retrying
    pub max_rounds: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self { max_rounds: 0, initial_backoff_ms: 1_000, max_backoff_ms: 30_000 }
    }
}

impl RetrySection {
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_millis(self.initial_backoff_ms), Duration::from_millis(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfigFile {
    /// Used when no symbols are given on the command line
    pub symbols: Vec<String>,
    pub log_dir: String,
    pub endpoint: EndpointSection,
    pub gate: GateSection,
    pub http: HttpSection,
    pub aggregate: AggregateSection,
    pub retry: RetrySection,
}

impl Default for FetchConfigFile {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            log_dir: "./logs".to_string(),
            endpoint: EndpointSection::default(),
            gate: GateSection::default(),
            http: HttpSection::default(),
            aggregate: AggregateSection::default(),
            retry: RetrySection::default(),
        }
    }
}

/// `SF__SECTION__KEY` environment overrides
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR).try_parsing(true)
}

pub fn load_fetch_config<P: AsRef<Path>>(path: P) -> Result<FetchConfigFile, ConfigError> {
    load_fetch_config_with(path, environment())
}

/// Load from `path`, then apply `env` on top
pub fn load_fetch_config_with<P: AsRef<Path>>(path: P, env: Environment) -> Result<FetchConfigFile, ConfigError> {
    let config = Config::builder().add_source(File::from(path.as_ref())).add_source(env).build()?;

    config.try_deserialize()
}

/// Keep a loaded config, or warn and fall back to defaults
pub fn or_default(path: &str, loaded: Result<FetchConfigFile, ConfigError>) -> FetchConfigFile {
    match loaded {
        Ok(config) => {
            tracing::info!("Loaded fetch config from {path}");
            config
        }
        Err(err) => {
            tracing::warn!("Failed to load fetch config from {}: {}. Using defaults.", path, err);
            FetchConfigFile::default()
        }
    }
}

/// Load fetch config with fallback to default
pub fn load_fetch_config_or_default(path: &str) -> FetchConfigFile {
    or_default(path, load_fetch_config(path))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sf_app_{}_{name}.toml", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn no_env() -> Environment {
        environment().source(Some(config::Map::new()))
    }

    #[test]
    fn test_defaults() {
        let config = FetchConfigFile::default();
        assert_eq!(config.gate.max_concurrent, 5);
        assert_eq!(config.retry.max_rounds, 0);
        assert_eq!(config.http.request_timeout(), Duration::from_secs(10));
        assert!(!config.aggregate.ordered);
        assert!(config.symbols.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = write_config(
            "partial",
            r#"
symbols = ["BTC-200730-9000-C"]

[gate]
max_concurrent = 2

[aggregate]
ordered = true
"#,
        );

        let config = load_fetch_config_with(&path, no_env()).unwrap();
        assert_eq!(config.symbols, vec!["BTC-200730-9000-C"]);
        assert_eq!(config.gate.max_concurrent, 2);
        assert_eq!(config.gate.min_interval_ms, 50);
        assert!(config.aggregate.ordered);
        assert_eq!(config.endpoint, EndpointSection::default());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = write_config("env", "[gate]\nmax_concurrent = 2\n");
        let vars: config::Map<String, String> =
            [("SF__GATE__MAX_CONCURRENT", "9"), ("SF__RETRY__MAX_ROUNDS", "3"), ("SF_API_KEY", "ignored")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

        let config = load_fetch_config_with(&path, environment().source(Some(vars))).unwrap();
        assert_eq!(config.gate.max_concurrent, 9);
        assert_eq!(config.retry.max_rounds, 3);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/sf_fetch.toml");
        let config = load_fetch_config_with(path, no_env()).unwrap();
        assert!(!config.symbols.is_empty());
        assert_eq!(config.gate, GateSection::default());
        assert_eq!(config.retry.max_rounds, 2);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = load_fetch_config_or_default("/nonexistent/sf_fetch.toml");
        assert_eq!(config, FetchConfigFile::default());
    }

    #[test]
    fn test_sections_build() {
        let config = FetchConfigFile::default();

        let endpoint = config.endpoint.build(Some("key".to_string())).unwrap();
        assert_eq!(endpoint.url(), "https://eapi.binance.com/eapi/v1/ticker");
        assert!(endpoint.has_api_key());

        let gate = config.gate.build().unwrap();
        assert_eq!(gate.max_concurrent(), 5);

        let bad = GateSection { max_concurrent: 0, ..GateSection::default() };
        assert!(bad.build().is_err());

        let http = HttpSection { connect_timeout_ms: 250, request_timeout_ms: 750, pool_max_idle_per_host: 4 }.client_config();
        assert_eq!(http.connect_timeout, Duration::from_millis(250));
        assert_eq!(http.request_timeout, Duration::from_millis(750));
        assert!(http.tcp_nodelay);
    }
}
