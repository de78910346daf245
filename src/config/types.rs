use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for a scraper run
///
/// Immutable for the duration of the run; shared as `Arc<CrawlConfig>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Name of the production index
    pub index_name: String,

    /// URLs the crawl starts from
    #[serde(default)]
    pub start_urls: Vec<StartUrl>,

    /// Patterns for URLs that must never be indexed
    #[serde(default)]
    pub stop_urls: Vec<String>,

    /// Domains the crawl may visit (subdomains included)
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Sitemap documents to crawl from
    #[serde(default)]
    pub sitemap_urls: Vec<String>,

    /// Only sitemap entries matching one of these regexes are crawled
    #[serde(default)]
    pub sitemap_urls_regexs: Vec<String>,

    /// Whether start URLs are themselves indexed
    #[serde(default = "default_true")]
    pub scrape_start_urls: bool,

    /// Require both the request URL and the redirect target to satisfy every rule
    #[serde(default = "default_true")]
    pub strict_redirect: bool,

    /// Request JavaScript rendering (unsupported by the HTTP fetcher)
    #[serde(default)]
    pub js_render: bool,

    /// Strip query strings from discovered links
    #[serde(default)]
    pub remove_get_params: bool,

    /// Index sitemap entries even when they break the link rules
    #[serde(default)]
    pub force_sitemap_urls_crawling: bool,

    /// Maximum number of staged records (0 = unlimited)
    #[serde(default)]
    pub nb_hits_max: usize,

    /// Start the staging index empty instead of mirroring production
    #[serde(default)]
    pub clear_index: bool,

    /// Run in file-diff mode
    #[serde(default)]
    pub is_file_update: bool,

    /// Comma-separated repository paths of added files
    #[serde(default)]
    pub added_files: Option<String>,

    /// Comma-separated repository paths of removed files
    #[serde(default)]
    pub removed_files: Option<String>,

    /// Comma-separated repository paths of updated files
    #[serde(default)]
    pub updated_files: Option<String>,

    /// Index settings applied to a cleared staging index
    #[serde(default)]
    pub custom_settings: Option<serde_json::Value>,

    /// Query rules saved to a cleared staging index
    #[serde(default)]
    pub query_rules: Vec<serde_json::Value>,

    /// Named synonym entries
    #[serde(default)]
    pub synonyms: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub selectors: SelectorsConfig,

    #[serde(default)]
    pub algolia: AlgoliaConfig,

    #[serde(default)]
    pub notification: NotificationConfig,
}

impl CrawlConfig {
    /// Returns the literal start URL strings, in configuration order
    pub fn start_url_strings(&self) -> Vec<String> {
        self.start_urls.iter().map(|s| s.url().to_string()).collect()
    }
}

/// A start URL, given either as a plain string or as a `{ url = "..." }` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StartUrl {
    Plain(String),
    Detailed { url: String },
}

impl StartUrl {
    pub fn url(&self) -> &str {
        match self {
            Self::Plain(url) => url,
            Self::Detailed { url } => url,
        }
    }
}

/// Fetch and retry behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Maximum number of requests in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries per URL before moving to an alternative link
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retries (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// CSS selectors used by the default record extractor
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorsConfig {
    #[serde(default = "default_lvl0")]
    pub lvl0: String,
    #[serde(default = "default_lvl1")]
    pub lvl1: String,
    #[serde(default = "default_lvl2")]
    pub lvl2: String,
    #[serde(default = "default_lvl3")]
    pub lvl3: String,
    #[serde(default = "default_lvl4")]
    pub lvl4: String,
    #[serde(default = "default_lvl5")]
    pub lvl5: String,
    #[serde(default)]
    pub lvl6: Option<String>,
    #[serde(default = "default_text")]
    pub text: String,
}

impl SelectorsConfig {
    /// Heading selectors in level order, skipping unset levels
    pub fn levels(&self) -> Vec<&str> {
        let mut levels = vec![
            self.lvl0.as_str(),
            self.lvl1.as_str(),
            self.lvl2.as_str(),
            self.lvl3.as_str(),
            self.lvl4.as_str(),
            self.lvl5.as_str(),
        ];
        if let Some(lvl6) = &self.lvl6 {
            levels.push(lvl6);
        }
        levels
    }
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            lvl0: default_lvl0(),
            lvl1: default_lvl1(),
            lvl2: default_lvl2(),
            lvl3: default_lvl3(),
            lvl4: default_lvl4(),
            lvl5: default_lvl5(),
            lvl6: None,
            text: default_text(),
        }
    }
}

/// Algolia credentials; missing values fall back to the environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlgoliaConfig {
    pub app_id: Option<String>,
    pub api_key: Option<String>,
}

/// Webhook that receives per-URL outcome notifications
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_requests() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    format!("DocSearchScraper/{}", env!("CARGO_PKG_VERSION"))
}

fn default_lvl0() -> String {
    "h1".to_string()
}

fn default_lvl1() -> String {
    "h2".to_string()
}

fn default_lvl2() -> String {
    "h3".to_string()
}

fn default_lvl3() -> String {
    "h4".to_string()
}

fn default_lvl4() -> String {
    "h5".to_string()
}

fn default_lvl5() -> String {
    "h6".to_string()
}

fn default_text() -> String {
    "p, li".to_string()
}
