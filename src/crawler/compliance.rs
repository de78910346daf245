//! Rule compliance filtering for fetched pages
//!
//! A response is in scope when every configured link rule accepts it. Because
//! redirects change the effective URL after a link was nominally allowed, each
//! rule is checked against both the final response URL and the request URL:
//!
//! - Strict redirect mode: both URLs must satisfy the rule
//! - Lenient mode: either URL may satisfy the rule
//!
//! Start URLs are rejected outright when `scrape_start_urls` is off.

use crate::url::{same_url, LinkRule, RuleSet};

/// Outcome of a compliance check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compliance {
    /// The page is in scope; records are attributed to `effective_url`
    Compliant { effective_url: String },
    /// The page is out of scope and must be skipped (not a failure)
    Rejected(String),
}

impl Compliance {
    pub fn is_compliant(&self) -> bool {
        matches!(self, Self::Compliant { .. })
    }
}

/// Decides whether fetched pages are in scope
#[derive(Debug, Clone)]
pub struct ComplianceFilter {
    rules: RuleSet,
    strict_redirect: bool,
    scrape_start_urls: bool,
    start_urls: Vec<String>,
}

impl ComplianceFilter {
    pub fn new(
        rules: RuleSet,
        strict_redirect: bool,
        scrape_start_urls: bool,
        start_urls: Vec<String>,
    ) -> Self {
        Self {
            rules,
            strict_redirect,
            scrape_start_urls,
            start_urls,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns true if `url` is one of the configured start URLs
    pub fn is_start_url(&self, url: &str) -> bool {
        self.start_urls.iter().any(|start| same_url(start, url))
    }

    /// Checks a response against the start-URL policy and every rule
    ///
    /// In lenient mode, when a rule only accepts the request URL, the request
    /// URL becomes the effective URL of the page.
    pub fn check(&self, final_url: &str, request_url: &str) -> Compliance {
        if !self.scrape_start_urls
            && (self.is_start_url(final_url) || self.is_start_url(request_url))
        {
            return Compliance::Rejected(format!("{} is a start URL", request_url));
        }

        let mut effective_url = final_url;
        for rule in self.rules.rules() {
            let final_ok = rule.allows(final_url);
            let request_ok = rule.allows(request_url);

            if self.strict_redirect {
                if !(final_ok && request_ok) {
                    return Compliance::Rejected(rejection(rule, final_url, request_url));
                }
            } else if !final_ok && !request_ok {
                return Compliance::Rejected(rejection(rule, final_url, request_url));
            } else if !final_ok {
                effective_url = request_url;
            }
        }

        Compliance::Compliant {
            effective_url: effective_url.to_string(),
        }
    }
}

fn rejection(rule: &LinkRule, final_url: &str, request_url: &str) -> String {
    if same_url(final_url, request_url) {
        format!("{} rejected by {}", final_url, rule.describe())
    } else {
        format!(
            "{} (requested as {}) rejected by {}",
            final_url,
            request_url,
            rule.describe()
        )
    }
}

/// Returns true if the response passes [`ComplianceFilter::check`]
pub fn is_compliant(
    final_url: &str,
    request_url: &str,
    rules: &RuleSet,
    strict_redirect: bool,
    scrape_start_urls: bool,
    start_urls: &[String],
) -> bool {
    ComplianceFilter::new(
        rules.clone(),
        strict_redirect,
        scrape_start_urls,
        start_urls.to_vec(),
    )
    .check(final_url, request_url)
    .is_compliant()
}
