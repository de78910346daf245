//! Record extraction from fetched pages
//!
//! The crawl driver hands every in-scope page to a [`ContentExtractor`]. The
//! default [`SelectorExtractor`] walks the document in order and emits one
//! record per heading and per text block, carrying the heading hierarchy the
//! block sits under.

use crate::config::SelectorsConfig;
use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::extract_language;
use crate::index::Record;
use crate::url::last_path_segment;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use url::Url;

/// Number of hierarchy levels carried on every record (`lvl0`..`lvl6`)
pub const HIERARCHY_LEVELS: usize = 7;

/// Turns a fetched page into index records
pub trait ContentExtractor: Send + Sync {
    /// Extracts the records of `page`, attributed to `url`
    fn extract_records(&self, page: &FetchedPage, url: &str) -> Vec<Record>;
}

/// CSS-selector driven extractor
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    levels: Vec<Selector>,
    text: Selector,
}

impl SelectorExtractor {
    /// Compiles the configured selectors
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for a selector that does not parse.
    pub fn new(config: &SelectorsConfig) -> ConfigResult<Self> {
        let levels = config
            .levels()
            .into_iter()
            .take(HIERARCHY_LEVELS)
            .map(parse_selector)
            .collect::<ConfigResult<Vec<_>>>()?;
        let text = parse_selector(&config.text)?;

        Ok(Self { levels, text })
    }

    /// Extracts records from raw HTML
    pub fn extract_html(&self, html: &str, url: &str) -> Vec<Record> {
        let document = Html::parse_document(html);
        let page = PageMeta::new(&document, url);

        let mut hierarchy: Vec<Option<String>> = vec![None; HIERARCHY_LEVELS];
        let mut heading_anchor: Option<String> = None;
        let mut records = Vec::new();

        for node in document.root_element().descendants() {
            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };

            if let Some(level) = self.levels.iter().position(|s| s.matches(&element)) {
                let text = element_text(&element);
                if text.is_empty() {
                    continue;
                }

                hierarchy[level] = Some(text);
                for deeper in hierarchy.iter_mut().skip(level + 1) {
                    *deeper = None;
                }
                heading_anchor = element.value().id().map(str::to_string);

                let position = records.len();
                records.push(page.record(
                    &format!("lvl{}", level),
                    None,
                    &hierarchy,
                    heading_anchor.as_deref(),
                    level,
                    position,
                ));
            } else if self.text.matches(&element) {
                let text = element_text(&element);
                if text.is_empty() {
                    continue;
                }

                let anchor = element
                    .value()
                    .id()
                    .map(str::to_string)
                    .or_else(|| heading_anchor.clone());
                let level = hierarchy.iter().rposition(Option::is_some).unwrap_or(0);

                let position = records.len();
                records.push(page.record(
                    "content",
                    Some(&text),
                    &hierarchy,
                    anchor.as_deref(),
                    level,
                    position,
                ));
            }
        }

        records
    }
}

impl ContentExtractor for SelectorExtractor {
    fn extract_records(&self, page: &FetchedPage, url: &str) -> Vec<Record> {
        self.extract_html(&page.body, url)
    }
}

fn parse_selector(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidPattern(format!("selector '{}': {:?}", selector, e)))
}

/// Whitespace-collapsed text content of an element
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Page-level attributes shared by every record of a page
struct PageMeta {
    url_without_anchor: String,
    language: Option<String>,
    slug: Option<String>,
}

impl PageMeta {
    fn new(document: &Html, url: &str) -> Self {
        let parsed = Url::parse(url).ok().map(|mut u| {
            u.set_fragment(None);
            u
        });

        Self {
            url_without_anchor: parsed
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_else(|| url.to_string()),
            language: extract_language(document),
            slug: parsed.as_ref().and_then(last_path_segment),
        }
    }

    fn record(
        &self,
        record_type: &str,
        content: Option<&str>,
        hierarchy: &[Option<String>],
        anchor: Option<&str>,
        level: usize,
        position: usize,
    ) -> Record {
        let mut levels = Map::new();
        for (i, value) in hierarchy.iter().enumerate() {
            levels.insert(
                format!("lvl{}", i),
                value.as_ref().map_or(Value::Null, |v| Value::String(v.clone())),
            );
        }

        let url = match anchor {
            Some(anchor) => format!("{}#{}", self.url_without_anchor, anchor),
            None => self.url_without_anchor.clone(),
        };

        json!({
            "objectID": self.object_id(position, record_type, content, hierarchy),
            "type": record_type,
            "hierarchy": Value::Object(levels),
            "content": content,
            "anchor": anchor,
            "url": url,
            "url_without_anchor": self.url_without_anchor,
            "language": self.language,
            "slug": self.slug,
            "weight": { "level": level, "position": position },
        })
    }

    /// Stable ID, so re-crawling a page replaces its records
    fn object_id(
        &self,
        position: usize,
        record_type: &str,
        content: Option<&str>,
        hierarchy: &[Option<String>],
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url_without_anchor.as_bytes());
        hasher.update(position.to_le_bytes());
        hasher.update(record_type.as_bytes());
        for level in hierarchy.iter().flatten() {
            hasher.update(level.as_bytes());
        }
        if let Some(content) = content {
            hasher.update(content.as_bytes());
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..12])
    }
}
