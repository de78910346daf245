//! DocSearch scraper main entry point
//!
//! This is the command-line interface for crawling a documentation site into
//! a search index.

use anyhow::{bail, Context};
use clap::Parser;
use docsearch_scraper::config::{load_config_with_hash, CrawlConfig};
use docsearch_scraper::crawler::{BasicAuth, Coordinator, CrawlStrategy, HttpFetcher};
use docsearch_scraper::index::{AlgoliaClient, IndexStore, SqliteIndexStore, API_KEY_ENV, APP_ID_ENV};
use docsearch_scraper::output::WebhookNotifier;
use docsearch_scraper::{ScraperError, EXIT_CODE_EXCEEDED_RECORDS};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// DocSearch scraper: crawls documentation into a search index
///
/// Pages are staged into a temporary index that replaces the production
/// index only once the whole crawl has finished.
#[derive(Parser, Debug)]
#[command(name = "docsearch-scraper")]
#[command(version)]
#[command(about = "Crawls a documentation site into a search index", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Write to a local SQLite index file instead of Algolia
    #[arg(long, value_name = "PATH")]
    local_index: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            match e.downcast_ref::<ScraperError>() {
                Some(err) if err.is_circuit_breaker() => {
                    ExitCode::from(EXIT_CODE_EXCEEDED_RECORDS as u8)
                }
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if config.js_render {
        tracing::warn!("js-render is set but pages are fetched without JavaScript rendering");
    }

    let store = open_store(&config, cli.local_index.as_deref())?;
    handle_crawl(config, store).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docsearch_scraper=info,warn"),
            1 => EnvFilter::new("docsearch_scraper=debug,info"),
            2 => EnvFilter::new("docsearch_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Picks the index backend: a local SQLite file, or Algolia
///
/// Algolia credentials come from the `[algolia]` table, falling back to the
/// `APPLICATION_ID` and `API_KEY` environment variables.
fn open_store(config: &CrawlConfig, local_index: Option<&Path>) -> anyhow::Result<Arc<dyn IndexStore>> {
    if let Some(path) = local_index {
        tracing::info!("Using local index database: {}", path.display());
        return Ok(Arc::new(SqliteIndexStore::open(path)?));
    }

    let app_id = config
        .algolia
        .app_id
        .clone()
        .or_else(|| std::env::var(APP_ID_ENV).ok());
    let api_key = config
        .algolia
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok());

    match (app_id, api_key) {
        (Some(app_id), Some(api_key)) => Ok(Arc::new(AlgoliaClient::new(&app_id, &api_key)?)),
        _ => bail!(
            "Algolia credentials missing: set [algolia] app-id/api-key or {}/{}",
            APP_ID_ENV,
            API_KEY_ENV
        ),
    }
}

/// Handles the --dry-run mode: shows the strategy and its initial requests
fn handle_dry_run(config: &CrawlConfig) {
    let strategy = CrawlStrategy::select(config);

    println!("=== DocSearch Dry Run ===\n");
    println!("Index: {} (staging: {}_tmp)", config.index_name, config.index_name);
    println!("Strategy: {}", strategy);
    println!("Clear index: {}", config.clear_index);
    if config.nb_hits_max > 0 {
        println!("Record limit: {}", config.nb_hits_max);
    }

    println!("\nFetch:");
    println!("  Max concurrent requests: {}", config.fetch.max_concurrent_requests);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Retries: {} ({}ms apart)",
        config.fetch.max_retries, config.fetch.retry_delay_ms
    );

    let docs_to_remove = strategy.docs_to_remove();
    if !docs_to_remove.is_empty() {
        println!("\nRecords removed for ({}):", docs_to_remove.len());
        for doc in docs_to_remove {
            println!("  - {} (slug: {}, language: {})", doc.file_path, doc.filename, doc.language);
        }
    }

    let requests = strategy.initial_requests();
    println!("\nInitial requests ({}):", requests.len());
    for request in &requests {
        println!("  - {}", request.url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: CrawlConfig, store: Arc<dyn IndexStore>) -> anyhow::Result<()> {
    let auth = BasicAuth::from_env();
    if auth.is_some() {
        tracing::info!("Using HTTP basic auth from the environment");
    }
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch, auth)?);

    let notifier = match &config.notification.webhook_url {
        Some(url) => Some(Arc::new(WebhookNotifier::new(url)?)),
        None => None,
    };

    let mut coordinator = Coordinator::new(Arc::new(config), store, fetcher)?;
    if let Some(notifier) = notifier {
        coordinator = coordinator.with_notifier(notifier);
    }

    let report = coordinator.run().await?;
    tracing::info!(
        "Crawl completed: {} records staged, {} removed, {} pages failed",
        report.records_staged,
        report.records_removed,
        report.stats.failed
    );
    Ok(())
}
