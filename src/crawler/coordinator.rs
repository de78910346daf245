//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the run driver that ties every component together:
//! - Preparing the staging index and removing stale records
//! - Dispatching the strategy's requests concurrently
//! - Driving each request through the failover state machine
//! - Gating responses through the compliance filter and staging records
//! - Reporting outcomes and committing the staging index
//!
//! Each logical request runs as its own task. Concurrency is capped by a
//! semaphore that is held only while a fetch is in flight, so requests
//! sleeping before a retry never occupy a slot.

use crate::config::CrawlConfig;
use crate::crawler::compliance::{Compliance, ComplianceFilter};
use crate::crawler::extractor::{ContentExtractor, SelectorExtractor};
use crate::crawler::failover::{FailoverController, FailoverDecision, RequestContext};
use crate::crawler::fetcher::{FetchedPage, Fetcher};
use crate::crawler::parser::parse_html;
use crate::crawler::sitemap::parse_sitemap;
use crate::crawler::strategy::{run_removal_pass, CrawlRequest, CrawlStrategy, RequestKind};
use crate::index::{IndexCommitter, IndexStore, RecordIndexer};
use crate::output::{notify_failures, print_summary, Notification, Notifier, RunStats, StatsSnapshot};
use crate::url::{compile_patterns, url_key, RuleSet, SchemeSet};
use crate::ScraperError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Name of the strategy that ran
    pub strategy: &'static str,
    pub stats: StatsSnapshot,
    /// Records staged during the crawl
    pub records_staged: usize,
    /// Records deleted by the removal pass
    pub records_removed: usize,
}

/// What a finished request task hands back to the driver
#[derive(Debug, Default)]
struct TaskOutcome {
    follow_ups: Vec<CrawlRequest>,
    fatal: Option<ScraperError>,
}

impl TaskOutcome {
    fn follow(follow_ups: Vec<CrawlRequest>) -> Self {
        Self {
            follow_ups,
            fatal: None,
        }
    }

    fn fatal(error: ScraperError) -> Self {
        Self {
            follow_ups: Vec::new(),
            fatal: Some(error),
        }
    }
}

/// State shared by every request task of a run
struct Shared {
    config: Arc<CrawlConfig>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ContentExtractor>,
    notifier: Option<Arc<dyn Notifier>>,
    compliance: ComplianceFilter,
    failover: FailoverController,
    sitemap_filters: Vec<Regex>,
    indexer: Arc<RecordIndexer>,
    stats: Arc<RunStats>,
    slots: Semaphore,
}

impl Shared {
    fn is_halted(&self) -> bool {
        self.indexer.is_halted()
    }

    /// Runs one logical request to a terminal state
    async fn process(self: Arc<Self>, request: CrawlRequest) -> TaskOutcome {
        let mut ctx = match self
            .failover
            .context(&request.url, request.file_path().map(str::to_string))
        {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Dropping request with invalid URL");
                return TaskOutcome::default();
            }
        };

        loop {
            // The context stays queued until a fetch slot is free.
            let result = {
                let _permit = self.slots.acquire().await.ok();
                if self.is_halted() {
                    debug!(
                        url = %ctx.url,
                        state = %ctx.state(),
                        "Dropping queued request after halt"
                    );
                    return TaskOutcome::default();
                }
                if let Err(e) = self.failover.dispatch(&mut ctx) {
                    warn!(url = %ctx.url, error = %e, "Cannot dispatch request");
                    return TaskOutcome::default();
                }
                self.fetcher.fetch(&ctx.url).await
            };

            let failure = match result {
                Ok(page) => {
                    if let Err(e) = self.failover.succeed(&mut ctx) {
                        warn!(url = %ctx.url, error = %e, "Cannot complete request");
                        return TaskOutcome::default();
                    }
                    return self.handle_page(&request, &ctx, page).await;
                }
                Err(failure) => failure,
            };

            match self.failover.fail(&mut ctx, &failure) {
                Ok(FailoverDecision::Retry { delay }) => tokio::time::sleep(delay).await,
                Ok(FailoverDecision::Advance { .. }) => {}
                Ok(FailoverDecision::Terminal { class }) => {
                    error!(
                        url = %ctx.original_url,
                        status = %class,
                        attempts = ctx.dispatch_count(),
                        "Request failed"
                    );
                    self.stats.record_failure(&ctx);
                    return TaskOutcome::default();
                }
                Err(e) => {
                    warn!(url = %ctx.url, error = %e, "Cannot fail request");
                    return TaskOutcome::default();
                }
            }
        }
    }

    /// Handles a 2xx response according to why it was requested
    async fn handle_page(
        &self,
        request: &CrawlRequest,
        ctx: &RequestContext,
        page: FetchedPage,
    ) -> TaskOutcome {
        if self.is_halted() {
            debug!(url = %ctx.url, "Discarding response after halt");
            return TaskOutcome::default();
        }
        self.stats.record_success();

        match &request.kind {
            RequestKind::Sitemap => {
                let entries = parse_sitemap(&page.body, &self.sitemap_filters);
                debug!(
                    url = %ctx.url,
                    sitemaps = entries.sitemaps.len(),
                    pages = entries.pages.len(),
                    "Parsed sitemap"
                );
                let follow_ups = entries
                    .sitemaps
                    .into_iter()
                    .map(|url| CrawlRequest::new(url, RequestKind::Sitemap))
                    .chain(
                        entries
                            .pages
                            .into_iter()
                            .map(|url| CrawlRequest::new(url, RequestKind::SitemapPage)),
                    )
                    .collect();
                TaskOutcome::follow(follow_ups)
            }
            RequestKind::SitemapPage => {
                let effective_url = if self.config.force_sitemap_urls_crawling {
                    page.final_url.clone()
                } else {
                    match self.compliance.check(&page.final_url, &ctx.url) {
                        Compliance::Compliant { effective_url } => effective_url,
                        Compliance::Rejected(reason) => {
                            debug!(%reason, "Skipping sitemap page");
                            return TaskOutcome::default();
                        }
                    }
                };
                match self.stage(&page, &effective_url, true).await {
                    Err(e) => TaskOutcome::fatal(e),
                    Ok(()) => TaskOutcome::default(),
                }
            }
            RequestKind::Document { file_path } => {
                match self.compliance.check(&page.final_url, &ctx.url) {
                    Compliance::Compliant { effective_url } => {
                        if let Err(e) = self.stage(&page, &effective_url, false).await {
                            return TaskOutcome::fatal(e);
                        }
                    }
                    Compliance::Rejected(reason) => {
                        debug!(%reason, "Skipping document page");
                    }
                }
                if let Some(notifier) = &self.notifier {
                    let notification = Notification::now(Some(file_path), &ctx.url, "200");
                    notifier.notify(&notification).await;
                }
                TaskOutcome::default()
            }
            RequestKind::StartPage | RequestKind::Discovered => {
                match self.compliance.check(&page.final_url, &ctx.url) {
                    Compliance::Compliant { effective_url } => {
                        if let Err(e) = self.stage(&page, &effective_url, false).await {
                            return TaskOutcome::fatal(e);
                        }
                    }
                    Compliance::Rejected(reason) => {
                        debug!(%reason, "Not indexing page");
                        if request.kind == RequestKind::Discovered {
                            return TaskOutcome::default();
                        }
                    }
                }
                TaskOutcome::follow(self.discover_links(&page))
            }
        }
    }

    /// Extracts and stages the records of an in-scope page
    ///
    /// Only the circuit breaker is returned as an error; a failed staging
    /// write is logged and the crawl goes on.
    async fn stage(
        &self,
        page: &FetchedPage,
        effective_url: &str,
        from_sitemap: bool,
    ) -> Result<(), ScraperError> {
        let records = self.extractor.extract_records(page, effective_url);
        match self
            .indexer
            .add_records(&records, effective_url, from_sitemap)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_circuit_breaker() => Err(e),
            Err(e) => {
                error!(url = effective_url, error = %e, "Failed to stage records");
                Ok(())
            }
        }
    }

    /// Links on a page that satisfy every link rule
    fn discover_links(&self, page: &FetchedPage) -> Vec<CrawlRequest> {
        let Ok(base) = Url::parse(&page.final_url) else {
            return Vec::new();
        };

        parse_html(&page.body, &base, self.config.remove_get_params)
            .links
            .into_iter()
            .filter(|link| self.compliance.rules().allows(link))
            .map(|link| CrawlRequest::new(link, RequestKind::Discovered))
            .collect()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<CrawlConfig>,
    strategy: CrawlStrategy,
    committer: Arc<IndexCommitter>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ContentExtractor>,
    notifier: Option<Arc<dyn Notifier>>,
    compliance: ComplianceFilter,
    failover: FailoverController,
    sitemap_filters: Vec<Regex>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated run configuration
    /// * `store` - Index backend holding the production and staging indexes
    /// * `fetcher` - Fetch collaborator
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ScraperError)` - A pattern or selector in the config does not compile
    pub fn new(
        config: Arc<CrawlConfig>,
        store: Arc<dyn IndexStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, ScraperError> {
        let schemes = SchemeSet::default();
        let rules = RuleSet::from_config(&config, &schemes)?;
        let compliance = ComplianceFilter::new(
            rules,
            config.strict_redirect,
            config.scrape_start_urls,
            config.start_url_strings(),
        );
        let failover = FailoverController::new(
            config.fetch.max_retries,
            Duration::from_millis(config.fetch.retry_delay_ms),
        )
        .with_schemes(schemes);
        let sitemap_filters = compile_patterns(config.sitemap_urls_regexs.iter().cloned())?;
        let extractor = Arc::new(SelectorExtractor::new(&config.selectors)?);
        let committer = Arc::new(IndexCommitter::new(
            store,
            &config.index_name,
            config.clear_index,
        ));

        Ok(Self {
            strategy: CrawlStrategy::select(&config),
            config,
            committer,
            fetcher,
            extractor,
            notifier: None,
            compliance,
            failover,
            sitemap_filters,
        })
    }

    /// Replaces the default selector-based extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Sends per-URL notifications to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn strategy(&self) -> &CrawlStrategy {
        &self.strategy
    }

    /// Runs the whole crawl
    ///
    /// 1. Prepare the staging index and stage synonyms
    /// 2. Remove records of deleted and updated files (file-diff only)
    /// 3. Crawl until no request is left
    /// 4. Print the summary and send failure notifications
    /// 5. Commit staging into production
    ///
    /// When the circuit breaker trips, the summary is still reported but the
    /// staging index is never committed.
    pub async fn run(self) -> Result<RunReport, ScraperError> {
        let start_time = Instant::now();
        info!(
            strategy = %self.strategy,
            index = %self.committer.pair().production_name,
            "Starting run"
        );

        self.committer
            .initialize(self.config.custom_settings.as_ref(), &self.config.query_rules)
            .await?;

        let indexer = Arc::new(RecordIndexer::new(
            self.committer.clone(),
            self.config.nb_hits_max,
        ));
        if !self.config.synonyms.is_empty() {
            indexer.add_synonyms(&self.config.synonyms).await?;
        }

        let records_removed =
            run_removal_pass(&self.committer, self.strategy.docs_to_remove()).await;

        let stats = Arc::new(RunStats::new());
        let shared = Arc::new(Shared {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            extractor: self.extractor.clone(),
            notifier: self.notifier.clone(),
            compliance: self.compliance.clone(),
            failover: self.failover.clone(),
            sitemap_filters: self.sitemap_filters.clone(),
            indexer: indexer.clone(),
            stats: stats.clone(),
            slots: Semaphore::new(self.config.fetch.max_concurrent_requests.max(1) as usize),
        });

        let fatal = crawl(shared, self.strategy.initial_requests()).await;

        let snapshot = stats.snapshot();
        print_summary(&snapshot);
        if let Some(notifier) = &self.notifier {
            let delivered = notify_failures(&snapshot, notifier.as_ref()).await;
            debug!(delivered, "Failure notifications sent");
        }

        if let Some(e) = fatal {
            error!(error = %e, "Run aborted; staging index not committed");
            return Err(e);
        }

        let records_staged = indexer.staged_count();
        self.committer.commit().await?;

        info!(
            processed = snapshot.total_processed,
            failed = snapshot.failed,
            records = records_staged,
            elapsed = ?start_time.elapsed(),
            "Run completed"
        );

        Ok(RunReport {
            strategy: self.strategy.name(),
            stats: snapshot,
            records_staged,
            records_removed,
        })
    }
}

/// Dispatches requests until none are left in flight
///
/// Each URL is dispatched at most once per run. After a fatal outcome no new
/// request is spawned; tasks already running drain on their own.
async fn crawl(shared: Arc<Shared>, initial: Vec<CrawlRequest>) -> Option<ScraperError> {
    let mut tasks = JoinSet::new();
    let mut seen = HashSet::new();
    let mut fatal: Option<ScraperError> = None;

    let mut spawn = |tasks: &mut JoinSet<TaskOutcome>, request: CrawlRequest| {
        if seen.insert(url_key(&request.url)) {
            tasks.spawn(shared.clone().process(request));
        }
    };

    for request in initial {
        spawn(&mut tasks, request);
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Request task failed");
                continue;
            }
        };

        if let Some(e) = outcome.fatal {
            if fatal.is_none() {
                warn!(error = %e, "Halting crawl");
                fatal = Some(e);
            }
        }
        if fatal.is_some() {
            continue;
        }

        for request in outcome.follow_ups {
            spawn(&mut tasks, request);
        }
    }

    fatal
}

/// Runs a crawl with the default extractor
///
/// # Example
///
/// ```no_run
/// use docsearch_scraper::config::load_config;
/// use docsearch_scraper::crawler::{run_crawl, HttpFetcher};
/// use docsearch_scraper::index::SqliteIndexStore;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let fetcher = HttpFetcher::new(&config.fetch, None)?;
/// let store = SqliteIndexStore::open(Path::new("index.db"))?;
/// run_crawl(Arc::new(config), Arc::new(store), Arc::new(fetcher), None).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Arc<CrawlConfig>,
    store: Arc<dyn IndexStore>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<RunReport, ScraperError> {
    let mut coordinator = Coordinator::new(config, store, fetcher)?;
    if let Some(notifier) = notifier {
        coordinator = coordinator.with_notifier(notifier);
    }
    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::fetcher::FetchFailure;
    use crate::index::SqliteIndexStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned responses and counts requests per URL
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, Result<(String, String), u16>>,
        delays: HashMap<String, Duration>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl StubFetcher {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), Ok((url.to_string(), body.to_string())));
            self
        }

        fn redirect(mut self, url: &str, target: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), Ok((target.to_string(), body.to_string())));
            self
        }

        fn status(mut self, url: &str, code: u16) -> Self {
            self.pages.insert(url.to_string(), Err(code));
            self
        }

        fn delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            match self.pages.get(url) {
                Some(Ok((final_url, body))) => Ok(FetchedPage {
                    status: 200,
                    final_url: final_url.clone(),
                    body: body.clone(),
                }),
                Some(Err(code)) => Err(FetchFailure::HttpStatus { code: *code }),
                None => Err(FetchFailure::Transport("connection refused".to_string())),
            }
        }
    }

    fn create_test_config(extra: &str) -> Arc<CrawlConfig> {
        Arc::new(
            parse_config(&format!(
                "index-name = \"docs\"\nstart-urls = [\"https://docs.example.com/\"]\n{}\n\
                 [fetch]\nretry-delay-ms = 0\nmax-retries = 1\n",
                extra
            ))
            .unwrap(),
        )
    }

    fn html(body: &str) -> String {
        format!(
            "<html lang=\"en\"><body><h1>Title</h1><p>Text</p>{}</body></html>",
            body
        )
    }

    async fn run(
        config: Arc<CrawlConfig>,
        fetcher: Arc<StubFetcher>,
    ) -> (Arc<SqliteIndexStore>, Result<RunReport, ScraperError>) {
        let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());
        let result = Coordinator::new(config, store.clone(), fetcher)
            .unwrap()
            .run()
            .await;
        (store, result)
    }

    fn indexed_urls(store: &SqliteIndexStore) -> HashSet<String> {
        store
            .all_objects("docs")
            .unwrap()
            .iter()
            .map(|r| r["url_without_anchor"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_full_crawl_follows_in_scope_links() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .page(
                    "https://docs.example.com/",
                    &html(r#"<a href="/a">A</a><a href="https://other.com/x">X</a>"#),
                )
                .page("https://docs.example.com/a", &html(r#"<a href="/">home</a>"#)),
        );

        let (store, result) = run(create_test_config(""), fetcher.clone()).await;
        let report = result.unwrap();

        assert_eq!(report.strategy, "full-crawl");
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(fetcher.calls("https://docs.example.com/"), 1);
        assert_eq!(fetcher.calls("https://other.com/x"), 0);
        assert_eq!(
            indexed_urls(&store),
            HashSet::from([
                "https://docs.example.com/".to_string(),
                "https://docs.example.com/a".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_start_page_not_indexed_without_scrape_start_urls() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .page("https://docs.example.com/", &html(r#"<a href="/a">A</a>"#))
                .page("https://docs.example.com/a", &html("")),
        );

        let (store, result) = run(
            create_test_config("scrape-start-urls = false"),
            fetcher,
        )
        .await;
        result.unwrap();

        assert_eq!(
            indexed_urls(&store),
            HashSet::from(["https://docs.example.com/a".to_string()])
        );
    }

    #[tokio::test]
    async fn test_failed_request_tries_alternative_scheme() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .page("https://docs.example.com/", &html(r#"<a href="/broken">B</a>"#))
                .status("https://docs.example.com/broken", 500)
                .status("http://docs.example.com/broken", 500),
        );

        let (_, result) = run(create_test_config(""), fetcher.clone()).await;
        let report = result.unwrap();

        // one retry per URL
        assert_eq!(fetcher.calls("https://docs.example.com/broken"), 2);
        assert_eq!(fetcher.calls("http://docs.example.com/broken"), 2);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.failed_500, 1);
        assert_eq!(report.stats.urls_500.len(), 2);
        assert_eq!(
            report.stats.total_processed,
            report.stats.succeeded + report.stats.failed
        );
    }

    #[tokio::test]
    async fn test_lenient_redirect_attributes_request_url() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .page("https://docs.example.com/", &html(r#"<a href="/moved">M</a>"#))
                .redirect(
                    "https://docs.example.com/moved",
                    "https://cdn.example.net/moved",
                    &html(""),
                ),
        );

        let (store, result) = run(
            create_test_config("strict-redirect = false"),
            fetcher.clone(),
        )
        .await;
        result.unwrap();
        assert!(indexed_urls(&store).contains("https://docs.example.com/moved"));

        let (store, result) = run(create_test_config(""), fetcher).await;
        result.unwrap();
        assert!(!indexed_urls(&store).contains("https://docs.example.com/moved"));
        assert!(!indexed_urls(&store).contains("https://cdn.example.net/moved"));
    }

    #[tokio::test]
    async fn test_circuit_breaker_prevents_commit() {
        let fetcher = Arc::new(
            StubFetcher::default().page("https://docs.example.com/", &html("<p>a</p><p>b</p>")),
        );

        let (store, result) = run(create_test_config("nb-hits-max = 2"), fetcher).await;

        assert!(result.unwrap_err().is_circuit_breaker());
        assert!(store.index_exists("docs_tmp").unwrap());
        assert_eq!(store.count_objects("docs").unwrap(), 0);
    }

    fn limited_config(nb_hits_max: usize, max_concurrent_requests: usize) -> Arc<CrawlConfig> {
        Arc::new(
            parse_config(&format!(
                "index-name = \"docs\"\nstart-urls = [\"https://docs.example.com/\"]\n\
                 nb-hits-max = {}\n\
                 [fetch]\nretry-delay-ms = 0\nmax-retries = 1\nmax-concurrent-requests = {}\n",
                nb_hits_max, max_concurrent_requests
            ))
            .unwrap(),
        )
    }

    fn many_paragraphs(n: usize) -> String {
        html(&(0..n).map(|i| format!("<p>Paragraph {}</p>", i)).collect::<String>())
    }

    fn staged_urls(store: &SqliteIndexStore) -> HashSet<String> {
        store
            .all_objects("docs_tmp")
            .unwrap()
            .iter()
            .map(|r| r["url_without_anchor"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_halt_drops_requests_waiting_for_a_slot() {
        let links: String = (0..20)
            .map(|i| format!(r#"<a href="/page{}">{}</a>"#, i, i))
            .collect();
        let mut fetcher = StubFetcher::default().page("https://docs.example.com/", &html(&links));
        for i in 0..20 {
            let url = format!("https://docs.example.com/page{}", i);
            fetcher = fetcher
                .page(&url, &many_paragraphs(6))
                .delay(&url, Duration::from_millis(5));
        }
        let fetcher = Arc::new(fetcher);

        let (store, result) = run(limited_config(5, 1), fetcher.clone()).await;

        assert!(result.unwrap_err().is_circuit_breaker());
        let fetched: usize = (0..20)
            .map(|i| fetcher.calls(&format!("https://docs.example.com/page{}", i)))
            .sum();
        assert_eq!(fetched, 1);
        assert_eq!(
            staged_urls(&store),
            HashSet::from(["https://docs.example.com/".to_string()])
        );
        assert_eq!(store.count_objects("docs").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_response_not_staged_after_halt() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .page(
                    "https://docs.example.com/",
                    &html(r#"<a href="/big">big</a><a href="/small">small</a>"#),
                )
                .page("https://docs.example.com/big", &many_paragraphs(6))
                .delay("https://docs.example.com/big", Duration::from_millis(1))
                .page("https://docs.example.com/small", &html(""))
                .delay("https://docs.example.com/small", Duration::from_millis(50)),
        );

        let (store, result) = run(limited_config(5, 2), fetcher.clone()).await;

        assert!(result.unwrap_err().is_circuit_breaker());
        assert_eq!(fetcher.calls("https://docs.example.com/small"), 1);
        assert_eq!(
            staged_urls(&store),
            HashSet::from(["https://docs.example.com/".to_string()])
        );
    }

    #[tokio::test]
    async fn test_invalid_request_url_is_dropped_not_fatal() {
        // validation would reject this; deserialize directly
        let config: CrawlConfig = toml::from_str(
            "index-name = \"docs\"\nstart-urls = [\"https://docs.example.com/\"]\n\
             sitemap-urls = [\"ftp://docs.example.com/sitemap.xml\"]",
        )
        .unwrap();
        let config = Arc::new(config);

        let (_, result) = run(config, Arc::new(StubFetcher::default())).await;
        let report = result.unwrap();
        assert_eq!(report.strategy, "sitemap");
        assert_eq!(report.stats.total_processed, 0);
    }
}
