use url::Url;

/// Canonicalizes a discovered link before it is queued
///
/// The fragment is always dropped; the query string is dropped when
/// `remove_get_params` is set.
///
/// # Examples
///
/// ```
/// use docsearch_scraper::url::canonicalize_link;
/// use url::Url;
///
/// let url = Url::parse("https://docs.example.com/page?v=2#intro").unwrap();
/// assert_eq!(canonicalize_link(&url, false).as_str(), "https://docs.example.com/page?v=2");
/// assert_eq!(canonicalize_link(&url, true).as_str(), "https://docs.example.com/page");
/// ```
pub fn canonicalize_link(url: &Url, remove_get_params: bool) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    if remove_get_params {
        url.set_query(None);
    }
    url
}

/// Returns a scheme-independent key for deduplicating requests
///
/// `http://host/a` and `https://host/a` share a key, since the failover path
/// already tries the sibling scheme of every request.
pub fn url_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => {
            let host = parsed.host_str().unwrap_or_default().to_lowercase();
            let port = parsed
                .port()
                .map(|p| format!(":{}", p))
                .unwrap_or_default();
            let query = parsed
                .query()
                .map(|q| format!("?{}", q))
                .unwrap_or_default();
            format!("{}{}{}{}", host, port, parsed.path(), query)
        }
        _ => url.to_string(),
    }
}

/// Compares two URL strings after parsing, falling back to string equality
///
/// `https://example.com` and `https://example.com/` compare equal.
pub fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Returns the last non-empty path segment of a URL
///
/// This is the page slug used to match records back to source files.
pub fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}
