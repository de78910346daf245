//! Search index backends and the staging/commit protocol
//!
//! - `traits`: the [`IndexStore`] contract every backend implements
//! - `algolia`: Algolia REST backend
//! - `sqlite`: local SQLite backend for dry runs and tests
//! - `committer`: staging index lifecycle and the final swap
//! - `indexer`: record staging with the hit-count circuit breaker

mod algolia;
mod committer;
mod indexer;
mod schema;
mod sqlite;
mod traits;

pub use algolia::{AlgoliaClient, API_KEY_ENV, APP_ID_ENV};
pub use committer::{IndexCommitter, IndexPair, STAGING_SUFFIX};
pub use indexer::{RecordIndexer, BATCH_SIZE};
pub use sqlite::SqliteIndexStore;
pub use traits::{
    BrowseFilter, IndexError, IndexResult, IndexStore, Record, SaveRulesOptions,
};
