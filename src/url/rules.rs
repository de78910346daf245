use crate::config::CrawlConfig;
use crate::url::matcher::matches_allowed_domain;
use crate::url::scheme::SchemeSet;
use crate::{ConfigError, ConfigResult};
use regex::Regex;
use url::Url;

/// A single link rule evaluated against a URL
///
/// The set of variants is closed; every rule is checked the same way by
/// [`LinkRule::allows`].
#[derive(Debug, Clone)]
pub enum LinkRule {
    /// URL must match at least one pattern
    Allow(Vec<Regex>),
    /// URL must match none of the patterns
    Deny(Vec<Regex>),
    /// URL host must belong to one of the domains
    Domains(Vec<String>),
}

impl LinkRule {
    /// Returns true if `url` satisfies this rule
    pub fn allows(&self, url: &str) -> bool {
        match self {
            Self::Allow(patterns) => patterns.iter().any(|p| p.is_match(url)),
            Self::Deny(patterns) => !patterns.iter().any(|p| p.is_match(url)),
            Self::Domains(domains) => match Url::parse(url) {
                Ok(parsed) => parsed
                    .host_str()
                    .map(|host| domains.iter().any(|d| matches_allowed_domain(d, host)))
                    .unwrap_or(false),
                Err(_) => false,
            },
        }
    }

    /// Short description used in rejection messages
    pub fn describe(&self) -> String {
        match self {
            Self::Allow(patterns) => format!("allow({} patterns)", patterns.len()),
            Self::Deny(patterns) => format!("deny({} patterns)", patterns.len()),
            Self::Domains(domains) => format!("domains({})", domains.join(", ")),
        }
    }
}

/// The ANDed set of link rules for a run
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<LinkRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<LinkRule>) -> Self {
        Self { rules }
    }

    /// Builds the rules implied by a configuration
    ///
    /// - Start URLs become a scheme-agnostic allow rule, except in sitemap
    ///   mode where sitemap entries may live anywhere on the allowed domains.
    /// - Stop URLs become a scheme-agnostic deny rule.
    /// - Allowed domains become a domain rule.
    ///
    /// Empty rules are omitted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if a derived pattern does not
    /// compile.
    pub fn from_config(config: &CrawlConfig, schemes: &SchemeSet) -> ConfigResult<Self> {
        let mut rules = Vec::new();

        let sitemap_mode = !config.is_file_update && !config.sitemap_urls.is_empty();
        if !sitemap_mode && !config.start_urls.is_empty() {
            let patterns = compile_patterns(
                config
                    .start_urls
                    .iter()
                    .map(|s| schemes.to_scheme_agnostic(s.url())),
            )?;
            rules.push(LinkRule::Allow(patterns));
        }

        if !config.stop_urls.is_empty() {
            let patterns = compile_patterns(
                config
                    .stop_urls
                    .iter()
                    .map(|s| schemes.to_scheme_agnostic(s)),
            )?;
            rules.push(LinkRule::Deny(patterns));
        }

        if !config.allowed_domains.is_empty() {
            rules.push(LinkRule::Domains(config.allowed_domains.clone()));
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[LinkRule] {
        &self.rules
    }

    /// Returns true if `url` satisfies every rule
    pub fn allows(&self, url: &str) -> bool {
        self.rules.iter().all(|rule| rule.allows(url))
    }
}

/// Compiles each pattern, reporting the first one that fails
pub fn compile_patterns<I>(patterns: I) -> ConfigResult<Vec<Regex>>
where
    I: IntoIterator<Item = String>,
{
    patterns
        .into_iter()
        .map(|pattern| {
            Regex::new(&pattern)
                .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
        })
        .collect()
}
