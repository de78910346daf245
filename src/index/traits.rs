//! Index storage traits and error types
//!
//! This module defines the trait interface for search-index backends and
//! associated error types. Records are opaque JSON objects.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A record destined for the search index
pub type Record = Value;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Index API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Index not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timed out waiting for task {0}")]
    TaskTimeout(i64),
}

impl From<rusqlite::Error> for IndexError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Options for [`IndexStore::save_rules`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveRulesOptions {
    /// Apply the rules to the index replicas as well
    pub forward_to_replicas: bool,
    /// Delete existing rules before saving
    pub clear_existing: bool,
}

/// Attribute equality filter for [`IndexStore::browse_objects`]
///
/// All conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseFilter {
    conditions: Vec<(String, String)>,
}

impl BrowseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an `attribute == value` condition
    pub fn where_eq(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((attribute.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    /// Returns true if `record` satisfies every condition
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(attribute, value)| match record.get(attribute) {
                Some(Value::String(s)) => s == value,
                Some(other) if !other.is_null() => other.to_string() == *value,
                _ => false,
            })
    }

    /// Renders the filter as an index query filter expression
    ///
    /// `slug:"foo" AND language:"en"`
    pub fn to_filter_expression(&self) -> String {
        self.conditions
            .iter()
            .map(|(attribute, value)| {
                format!("{}:\"{}\"", attribute, value.replace('"', "\\\""))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Trait for search-index backends
///
/// Every operation may fail. Callers decide which failures are fatal.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Creates an empty index if it does not exist
    async fn create_index(&self, name: &str) -> IndexResult<()>;

    /// Replaces `dst` with a full copy of `src` (records, settings, rules, synonyms)
    async fn copy_index(&self, src: &str, dst: &str) -> IndexResult<()>;

    /// Copies only the query rules of `src` into `dst`
    async fn copy_rules(&self, src: &str, dst: &str) -> IndexResult<()>;

    async fn set_settings(&self, index: &str, settings: &Value) -> IndexResult<()>;

    async fn save_rules(
        &self,
        index: &str,
        rules: &[Value],
        options: SaveRulesOptions,
    ) -> IndexResult<()>;

    /// Adds or replaces records
    async fn save_objects(&self, index: &str, batch: &[Record]) -> IndexResult<()>;

    async fn save_synonyms(&self, index: &str, synonyms: &[Value]) -> IndexResult<()>;

    /// Deletes every record while keeping settings, rules and synonyms
    async fn clear_objects(&self, index: &str) -> IndexResult<()>;

    /// Renames `src` to `dst`, replacing `dst` entirely
    async fn move_index(&self, src: &str, dst: &str) -> IndexResult<()>;

    /// Returns the object IDs of every record matching `filter`
    async fn browse_objects(&self, index: &str, filter: &BrowseFilter) -> IndexResult<Vec<String>>;

    async fn delete_objects(&self, index: &str, ids: &[String]) -> IndexResult<()>;
}
