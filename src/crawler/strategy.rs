//! Crawl strategy selection
//!
//! Exactly one strategy is active per run:
//!
//! - **File diff** (`is-file-update`): crawl the pages synthesized from a list
//!   of changed source files, after removing the records of deleted files
//! - **Sitemap** (`sitemap-urls`): crawl the pages listed in sitemap documents
//! - **Full crawl** (fallback): start from the start URLs and follow links

use crate::config::CrawlConfig;
use crate::index::{BrowseFilter, IndexCommitter};
use std::fmt;
use tracing::{info, warn};

/// Source file extensions that map to documentation pages
const DOC_EXTENSIONS: &[&str] = &["md", "mdx"];

/// Document types served under the `docs/` path segment
const NESTED_DOC_TYPES: &[&str] = &["tutorials", "tracks"];

/// A documentation source file, described by its repository path
///
/// Paths look like `<root>/<language>/<type>/<name>.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocDescriptor {
    pub file_path: String,
    pub filename: String,
    pub language: String,
    pub doc_type: String,
}

impl DocDescriptor {
    /// Parses a repository-relative path
    ///
    /// Returns `None` for paths that are not `.md`/`.mdx` files or that lack
    /// the language and type segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsearch_scraper::crawler::DocDescriptor;
    ///
    /// let doc = DocDescriptor::parse("guides/en/articles/foo.md").unwrap();
    /// assert_eq!(doc.filename, "foo");
    /// assert_eq!(doc.language, "en");
    /// assert_eq!(doc.doc_type, "articles");
    ///
    /// assert!(DocDescriptor::parse("guides/en/articles/logo.png").is_none());
    /// ```
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        let mut dot_parts = path.split('.');
        let stem = dot_parts.next()?;
        let extension = dot_parts.next()?;
        if !DOC_EXTENSIONS.contains(&extension) {
            return None;
        }

        let filename = stem.rsplit('/').next()?.to_string();
        let mut segments = path.split('/').skip(1);
        let language = segments.next()?.to_string();
        let doc_type = segments.next()?.to_string();

        Some(Self {
            file_path: path.to_string(),
            filename,
            language,
            doc_type,
        })
    }

    /// Parses a comma-separated list of paths, dropping invalid entries
    pub fn parse_file_list(list: &str) -> Vec<Self> {
        list.split(',').filter_map(Self::parse).collect()
    }

    /// Path segment for the document type on the live site
    pub fn type_segment(&self) -> String {
        if NESTED_DOC_TYPES.contains(&self.doc_type.as_str()) {
            format!("docs/{}", self.doc_type)
        } else {
            self.doc_type.clone()
        }
    }
}

/// Builds the live URL of a documentation file from the site's start URL
///
/// # Examples
///
/// ```
/// use docsearch_scraper::crawler::{synthesize_url, DocDescriptor};
///
/// let doc = DocDescriptor::parse("guides/en/tutorials/bar.mdx").unwrap();
/// assert_eq!(
///     synthesize_url("https://docs.example.com", &doc),
///     "https://docs.example.com/en/docs/tutorials/bar"
/// );
/// ```
pub fn synthesize_url(start_url: &str, doc: &DocDescriptor) -> String {
    let mut url = start_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    if !doc.language.is_empty() {
        url.push_str(&doc.language);
        url.push('/');
    }
    url.push_str(&doc.type_segment());
    url.push('/');
    url.push_str(&doc.filename);
    url
}

/// Why a request was issued, which decides how its response is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Page synthesized from a changed source file
    Document { file_path: String },
    /// Sitemap or sitemap index document
    Sitemap,
    /// Page listed in a sitemap
    SitemapPage,
    /// Configured start URL
    StartPage,
    /// Link found on a crawled page
    Discovered,
}

/// A request to be dispatched by the crawl driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub url: String,
    pub kind: RequestKind,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>, kind: RequestKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Source file path, for requests synthesized in file-diff mode
    pub fn file_path(&self) -> Option<&str> {
        match &self.kind {
            RequestKind::Document { file_path } => Some(file_path),
            _ => None,
        }
    }
}

/// The run mode, with the inputs it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStrategy {
    FileDiff {
        start_url: String,
        docs_to_add: Vec<DocDescriptor>,
        docs_to_remove: Vec<DocDescriptor>,
    },
    Sitemap {
        sitemap_urls: Vec<String>,
    },
    FullCrawl {
        start_urls: Vec<String>,
    },
}

impl CrawlStrategy {
    /// Chooses the strategy for a configuration
    ///
    /// Updated files are added to both the add and the remove set, so their
    /// old records are removed before the page is crawled again.
    pub fn select(config: &CrawlConfig) -> Self {
        if config.is_file_update {
            let mut docs_to_add = Vec::new();
            let mut docs_to_remove = Vec::new();

            if let Some(added) = &config.added_files {
                docs_to_add.extend(DocDescriptor::parse_file_list(added));
            }
            if let Some(removed) = &config.removed_files {
                docs_to_remove.extend(DocDescriptor::parse_file_list(removed));
            }
            if let Some(updated) = &config.updated_files {
                for doc in DocDescriptor::parse_file_list(updated) {
                    docs_to_add.push(doc.clone());
                    docs_to_remove.push(doc);
                }
            }

            return Self::FileDiff {
                start_url: config
                    .start_urls
                    .first()
                    .map(|s| s.url().to_string())
                    .unwrap_or_default(),
                docs_to_add,
                docs_to_remove,
            };
        }

        if !config.sitemap_urls.is_empty() {
            return Self::Sitemap {
                sitemap_urls: config.sitemap_urls.clone(),
            };
        }

        Self::FullCrawl {
            start_urls: config.start_url_strings(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FileDiff { .. } => "file-diff",
            Self::Sitemap { .. } => "sitemap",
            Self::FullCrawl { .. } => "full-crawl",
        }
    }

    /// Requests dispatched when the crawl starts
    pub fn initial_requests(&self) -> Vec<CrawlRequest> {
        match self {
            Self::FileDiff {
                start_url,
                docs_to_add,
                ..
            } => docs_to_add
                .iter()
                .map(|doc| {
                    CrawlRequest::new(
                        synthesize_url(start_url, doc),
                        RequestKind::Document {
                            file_path: doc.file_path.clone(),
                        },
                    )
                })
                .collect(),
            Self::Sitemap { sitemap_urls } => sitemap_urls
                .iter()
                .map(|url| CrawlRequest::new(url.clone(), RequestKind::Sitemap))
                .collect(),
            Self::FullCrawl { start_urls } => start_urls
                .iter()
                .map(|url| CrawlRequest::new(url.clone(), RequestKind::StartPage))
                .collect(),
        }
    }

    /// Documents whose records are removed before crawling
    pub fn docs_to_remove(&self) -> &[DocDescriptor] {
        match self {
            Self::FileDiff { docs_to_remove, .. } => docs_to_remove,
            _ => &[],
        }
    }
}

impl fmt::Display for CrawlStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Removes the records of deleted and updated files from the staging index
///
/// Matching records are looked up in production by `slug` and `language` and
/// deleted from staging, which starts as a mirror of production. Failures are
/// logged and never abort the run.
///
/// # Returns
///
/// The number of record IDs deleted
pub async fn run_removal_pass(committer: &IndexCommitter, docs: &[DocDescriptor]) -> usize {
    let pair = committer.pair();
    let store = committer.store();
    let mut removed = 0;

    for doc in docs {
        let filter = BrowseFilter::new()
            .where_eq("slug", doc.filename.as_str())
            .where_eq("language", doc.language.as_str());

        let ids = match store.browse_objects(&pair.production_name, &filter).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(file = %doc.file_path, error = %e, "Failed to look up records to remove");
                continue;
            }
        };

        if ids.is_empty() {
            continue;
        }

        match store.delete_objects(&pair.staging_name, &ids).await {
            Ok(()) => {
                info!(file = %doc.file_path, records = ids.len(), "Removed records");
                removed += ids.len();
            }
            Err(e) => {
                warn!(file = %doc.file_path, error = %e, "Failed to remove records");
            }
        }
    }

    removed
}
