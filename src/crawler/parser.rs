//! HTML parser for link discovery
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from `<a>` tags), canonicalized and deduplicated
//! - Page title and declared language

use crate::url::canonicalize_link;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// File extensions that never lead to documentation pages
const IGNORED_EXTENSIONS: &[&str] = &[
    "7z", "avi", "css", "csv", "doc", "docx", "exe", "gif", "gz", "ico", "jpeg", "jpg", "js",
    "json", "mov", "mp3", "mp4", "pdf", "png", "ppt", "pptx", "rar", "svg", "tar", "tgz", "webm",
    "webp", "xls", "xlsx", "xml", "zip",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from `<title>`)
    pub title: Option<String>,

    /// The page language (from `<html lang>`)
    pub language: Option<String>,

    /// Links to follow, absolute and canonicalized, in document order
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Links to binary assets (images, archives, documents)
///
/// Fragments are always stripped. Query strings are stripped when
/// `remove_get_params` is set.
///
/// # Example
///
/// ```
/// use docsearch_scraper::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html lang="en"><head><title>Test</title></head><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, false);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.language, Some("en".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url, remove_get_params: bool) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        language: extract_language(&document),
        links: extract_links(&document, base_url, remove_get_params),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts the `lang` attribute of the root element
pub(crate) fn extract_language(document: &Html) -> Option<String> {
    let html_selector = Selector::parse("html[lang]").ok()?;

    document
        .select(&html_selector)
        .next()
        .and_then(|element| element.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url, remove_get_params: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(url) = resolve_link(href, base_url) {
            let link = canonicalize_link(&url, remove_get_params).to_string();
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
/// - Links to ignored file extensions
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }

    if has_ignored_extension(&absolute_url) {
        return None;
    }

    Some(absolute_url)
}

fn has_ignored_extension(url: &Url) -> bool {
    let Some(last) = url.path_segments().and_then(|mut segments| segments.next_back()) else {
        return false;
    };

    match last.rsplit_once('.') {
        Some((_, ext)) => IGNORED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        parse_html(html, &base_url(), false).links
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        let parsed = parse_html(html, &base_url(), false);
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_extract_language() {
        let parsed = parse_html(r#"<html lang="fr"><body></body></html>"#, &base_url(), false);
        assert_eq!(parsed.language, Some("fr".to_string()));

        let parsed = parse_html("<html><body></body></html>", &base_url(), false);
        assert_eq!(parsed.language, None);
    }

    #[test]
    fn test_extract_relative_links() {
        let html = r#"<html><body><a href="/other">A</a><a href="sibling">B</a></body></html>"#;
        assert_eq!(
            links(html),
            vec![
                "https://example.com/other".to_string(),
                "https://example.com/sibling".to_string()
            ]
        );
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r#"
            <html><body>
                <a href="javascript:void(0)">js</a>
                <a href="mailto:test@example.com">mail</a>
                <a href="tel:+1234567890">tel</a>
                <a href="data:text/html,hi">data</a>
                <a href="ftp://example.com/file">ftp</a>
                <a href="/valid">Valid</a>
            </body></html>
        "#;
        assert_eq!(links(html), vec!["https://example.com/valid".to_string()]);
    }

    #[test]
    fn test_skip_download_and_fragment_links() {
        let html = r##"<html><body><a href="/file" download>D</a><a href="#section">S</a></body></html>"##;
        assert!(links(html).is_empty());
    }

    #[test]
    fn test_skip_binary_assets() {
        let html = r#"<html><body><a href="/logo.PNG">img</a><a href="/guide.pdf">pdf</a><a href="/v1.2/intro">ok</a></body></html>"#;
        assert_eq!(links(html), vec!["https://example.com/v1.2/intro".to_string()]);
    }

    #[test]
    fn test_fragments_stripped_and_deduplicated() {
        let html = r#"<html><body><a href="/a#one">1</a><a href="/a#two">2</a><a href="/a">3</a></body></html>"#;
        assert_eq!(links(html), vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn test_remove_get_params() {
        let html = r#"<html><body><a href="/a?x=1">1</a><a href="/a?x=2">2</a></body></html>"#;

        assert_eq!(links(html).len(), 2);
        assert_eq!(
            parse_html(html, &base_url(), true).links,
            vec!["https://example.com/a".to_string()]
        );
    }
}
