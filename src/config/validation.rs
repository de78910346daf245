use crate::config::types::{CrawlConfig, FetchConfig};
use crate::url::{compile_patterns, RuleSet, SchemeSet};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_index_name(&config.index_name)?;
    validate_start_urls(config)?;
    validate_patterns(config)?;
    validate_fetch_config(&config.fetch)?;
    validate_webhook(config.notification.webhook_url.as_deref())?;
    Ok(())
}

fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "index-name cannot be empty".to_string(),
        ));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "index-name cannot contain whitespace, got '{}'",
            name
        )));
    }

    Ok(())
}

/// Validates start URLs against the selected run mode
fn validate_start_urls(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.is_file_update && config.start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "file update mode requires at least one start URL".to_string(),
        ));
    }

    if config.start_urls.is_empty() && config.sitemap_urls.is_empty() {
        return Err(ConfigError::Validation(
            "at least one start URL or sitemap URL is required".to_string(),
        ));
    }

    for start in &config.start_urls {
        validate_http_url(start.url(), "start URL")?;
    }

    for sitemap in &config.sitemap_urls {
        validate_http_url(sitemap, "sitemap URL")?;
    }

    Ok(())
}

fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, raw
        )));
    }

    Ok(())
}

/// Compiles every configured and derived pattern once up front
fn validate_patterns(config: &CrawlConfig) -> Result<(), ConfigError> {
    compile_patterns(config.sitemap_urls_regexs.iter().cloned())?;
    RuleSet::from_config(config, &SchemeSet::default())?;
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_webhook(webhook: Option<&str>) -> Result<(), ConfigError> {
    if let Some(raw) = webhook {
        validate_http_url(raw, "webhook URL")?;
    }
    Ok(())
}
