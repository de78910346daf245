//! Sitemap document parsing
//!
//! Handles both `<urlset>` sitemaps and `<sitemapindex>` documents that point
//! at further sitemaps.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use tracing::warn;

/// Entries found in a sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapEntries {
    /// Child sitemaps (from a sitemap index)
    pub sitemaps: Vec<String>,
    /// Page URLs
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Sitemap,
    Page,
}

/// Parses a sitemap or sitemap index document
///
/// Page URLs are kept only if they match one of `page_filters`; an empty
/// filter list keeps every page. A malformed document yields the entries
/// read before the error.
///
/// # Example
///
/// ```
/// use docsearch_scraper::crawler::parse_sitemap;
///
/// let xml = r#"<urlset><url><loc>https://docs.example.com/a</loc></url></urlset>"#;
/// let entries = parse_sitemap(xml, &[]);
/// assert_eq!(entries.pages, vec!["https://docs.example.com/a".to_string()]);
/// ```
pub fn parse_sitemap(xml: &str, page_filters: &[Regex]) -> SitemapEntries {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = SitemapEntries::default();
    let mut current: Option<Entry> = None;
    let mut in_loc = false;
    let mut loc = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"sitemap" => current = Some(Entry::Sitemap),
                b"url" => current = Some(Entry::Page),
                b"loc" if current.is_some() => {
                    in_loc = true;
                    loc.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_loc => {
                if let Ok(text) = e.unescape() {
                    loc.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) if in_loc => {
                loc.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"loc" if in_loc => {
                    in_loc = false;
                    let url = loc.trim();
                    if url.is_empty() {
                        continue;
                    }
                    match current {
                        Some(Entry::Sitemap) => entries.sitemaps.push(url.to_string()),
                        Some(Entry::Page) => {
                            if page_filters.is_empty()
                                || page_filters.iter().any(|re| re.is_match(url))
                            {
                                entries.pages.push(url.to_string());
                            }
                        }
                        None => {}
                    }
                }
                b"sitemap" | b"url" => current = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Malformed sitemap document"
                );
                break;
            }
            Ok(_) => {}
        }
    }

    entries
}
