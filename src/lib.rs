//! DocSearch scraper: crawls a documentation site and publishes it to a search index
//!
//! This crate crawls documentation pages (from start URLs, sitemaps, or a list of
//! changed source files), extracts search records from each page, and stages them
//! into a temporary index that is atomically swapped into production at the end
//! of the run.

pub mod config;
pub mod crawler;
pub mod index;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for scraper operations
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Too many records: {staged} staged records exceed the limit of {limit}")]
    CircuitBreakerTripped { staged: usize, limit: usize },

    #[error("Invalid request transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RequestState,
        to: state::RequestState,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScraperError {
    /// Returns true if this error is the hit-count circuit breaker
    pub fn is_circuit_breaker(&self) -> bool {
        matches!(self, Self::CircuitBreakerTripped { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("URL has no recognizable http(s) scheme: {0}")]
    InvalidScheme(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for scraper operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Process exit code used when the hit-count circuit breaker aborts a run
pub const EXIT_CODE_EXCEEDED_RECORDS: i32 = 4;

// Re-export commonly used types
pub use config::CrawlConfig;
pub use crawler::{run_crawl, Coordinator, RunReport};
pub use state::RequestState;
pub use url::{alternate_schemes, to_scheme_agnostic, SchemeSet};
