//! Configuration module for the scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docsearch_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Publishing to index: {}", config.index_name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AlgoliaConfig, CrawlConfig, FetchConfig, NotificationConfig, SelectorsConfig, StartUrl,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
