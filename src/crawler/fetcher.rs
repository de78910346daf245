//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Optional HTTP basic auth for protected documentation sites
//! - Classifying responses into pages and failures
//!
//! Retries are not performed here; the failover controller owns them.

use crate::config::FetchConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the basic auth user name
pub const BASIC_AUTH_USERNAME_ENV: &str = "DOCSEARCH_BASICAUTH_USERNAME";

/// Environment variable holding the basic auth password
pub const BASIC_AUTH_PASSWORD_ENV: &str = "DOCSEARCH_BASICAUTH_PASSWORD";

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Final URL after redirects
    pub final_url: String,
    /// Page body
    pub body: String,
}

/// A failed fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchFailure {
    /// No response at all (connection refused, DNS failure, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// A response with a non-2xx status
    #[error("HTTP status {code}")]
    HttpStatus { code: u16 },
}

impl FetchFailure {
    /// The HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(_) => None,
            Self::HttpStatus { code } => Some(*code),
        }
    }
}

/// Fetch collaborator used by the crawl driver
///
/// Implementations resolve each call exactly once, with either a page or a
/// failure. They must not retry on their own.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure>;
}

/// HTTP basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    /// Reads credentials from the environment, if both variables are set
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(BASIC_AUTH_USERNAME_ENV).ok()?;
        let password = std::env::var(BASIC_AUTH_PASSWORD_ENV).ok()?;
        Some(Self { username, password })
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher
///
/// Redirects are followed by the client; the final URL is reported on the
/// page so the compliance filter can compare it with the request URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    auth: Option<BasicAuth>,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig, auth: Option<BasicAuth>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            auth,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        let mut request = self.client.get(url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(classify_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus {
                code: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        Ok(FetchedPage {
            status: status.as_u16(),
            final_url,
            body,
        })
    }
}

fn classify_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("redirect error: {}", error)
    } else {
        error.to_string()
    }
}
