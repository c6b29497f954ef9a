use std::collections::BTreeMap;
use std::io::BufWriter;
use std::sync::Arc;

use sf_app::cli;
use sf_app::config_loader;
use sf_app::output;
use sf_app::rounds;
use sf_app::shutdown_handler;
use sf_http::Fetcher;
use sf_http::HttpClient;
use sf_http::ResourceId;
use sf_parser::InstrumentStatsParser;
use sf_pipeline::BatchConfig;
use sf_pipeline::Cancellation;
use tikv_jemallocator::Jemalloc;
use tracing::info;
use tracing::warn;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Environment variable holding the exchange API key
const API_KEY_VAR: &str = "SF_API_KEY";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables (.env honoured)
    dotenvy::dotenv().ok();

    let args = cli::from_env();
    let loaded = config_loader::load_fetch_config(&args.config_path);
    let log_dir = loaded.as_ref().map_or_else(|_| config_loader::FetchConfigFile::default().log_dir, |c| c.log_dir.clone());

    // CRITICAL: Keep guard alive for entire application lifetime
    let _guard = sf_app::tracing_setup::init("sf_fetch", &log_dir, tracing::Level::INFO);
    let config = config_loader::or_default(&args.config_path, loaded);

    let symbols = if args.symbols.is_empty() { cli::normalise_symbols(config.symbols.iter().map(String::as_str)) } else { args.symbols };
    if symbols.is_empty() {
        anyhow::bail!("No symbols given; pass them as arguments or set `symbols` in {}", args.config_path);
    }
    let ids: Vec<ResourceId> = symbols.iter().map(|s| ResourceId::from(s.as_str())).collect();

    let api_key = std::env::var(API_KEY_VAR).ok();
    if api_key.is_none() {
        info!("{API_KEY_VAR} not set, sending unauthenticated requests");
    }

    let endpoint = config.endpoint.build(api_key)?;
    let gate = Arc::new(config.gate.build()?);
    let client = HttpClient::with_config(config.http.client_config())?;
    let fetcher = Fetcher::new(client, Arc::clone(&gate), endpoint).with_timeout(config.http.request_timeout());

    info!("Fetching {} symbols from {:?} (max {} concurrent)", ids.len(), fetcher.endpoint(), gate.max_concurrent());

    // Ctrl+C cancels the batch; whatever has been parsed is still written out
    let (cancel, token) = Cancellation::pair();
    shutdown_handler::setup(cancel)?;

    let batch_config = BatchConfig { aggregator: config.aggregate.aggregator_config(), max_in_flight: 0 };
    let report = rounds::run_with_retries(
        &fetcher,
        Arc::new(InstrumentStatsParser),
        &ids,
        batch_config,
        config.retry.max_rounds,
        config.retry.backoff(),
        &token,
    )
    .await?;

    let written = output::write_json_lines(&mut BufWriter::new(std::io::stdout().lock()), &report.records)?;

    info!("Wrote {written} records ({} failed, {} unparseable)", report.failures.len(), report.dropped);
    if !report.failures.is_empty() {
        let mut by_kind: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for failure in &report.failures {
            by_kind.entry(failure.kind.to_string()).or_default().push(&failure.id);
        }
        for (kind, ids) in by_kind {
            warn!("{kind}: {}", ids.join(", "));
        }
    }
    report.latencies.log_summary("Request latency");
    report.admission_waits.log_summary("Admission wait");

    let stats = gate.stats();
    info!("Gate: {} granted, peak {} in flight", stats.granted, stats.peak_in_flight);

    if report.cancelled {
        warn!("Stopped early on shutdown signal");
    }

    Ok(())
}
