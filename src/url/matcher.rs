/// Checks if a host belongs to an allowed domain
///
/// An allowed domain matches itself and every subdomain beneath it. A leading
/// `*.` or `.` on the allowed domain is accepted and means the same thing.
/// Comparison is case-insensitive.
///
/// # Examples
///
/// ```
/// use docsearch_scraper::url::matches_allowed_domain;
///
/// assert!(matches_allowed_domain("example.com", "example.com"));
/// assert!(matches_allowed_domain("example.com", "docs.example.com"));
/// assert!(matches_allowed_domain("*.example.com", "api.v2.example.com"));
/// assert!(!matches_allowed_domain("example.com", "notexample.com"));
/// ```
pub fn matches_allowed_domain(allowed: &str, host: &str) -> bool {
    let base = allowed
        .strip_prefix("*.")
        .or_else(|| allowed.strip_prefix('.'))
        .unwrap_or(allowed)
        .to_lowercase();
    let host = host.to_lowercase();

    if base.is_empty() {
        return false;
    }

    host == base || host.ends_with(&format!(".{}", base))
}
