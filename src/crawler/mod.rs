//! Crawler module for page fetching and processing
//!
//! This module contains the crawl orchestration core, including:
//! - Strategy selection (file diff, sitemap, full crawl)
//! - HTTP fetching behind the [`Fetcher`] collaborator
//! - Per-request retry and alternative-link failover
//! - Rule compliance filtering under redirects
//! - Link discovery, sitemap parsing and record extraction
//! - Overall run coordination

mod compliance;
mod coordinator;
mod extractor;
mod failover;
mod fetcher;
mod parser;
mod sitemap;
mod strategy;

pub use compliance::{is_compliant, Compliance, ComplianceFilter};
pub use coordinator::{run_crawl, Coordinator, RunReport};
pub use extractor::{ContentExtractor, SelectorExtractor, HIERARCHY_LEVELS};
pub use failover::{
    ExhaustedUrl, FailoverController, FailoverDecision, FailureClass, RequestContext,
};
pub use fetcher::{
    build_http_client, BasicAuth, FetchFailure, FetchedPage, Fetcher, HttpFetcher,
    BASIC_AUTH_PASSWORD_ENV, BASIC_AUTH_USERNAME_ENV,
};
pub use parser::{parse_html, ParsedPage};
pub use sitemap::{parse_sitemap, SitemapEntries};
pub use strategy::{
    run_removal_pass, synthesize_url, CrawlRequest, CrawlStrategy, DocDescriptor, RequestKind,
};
