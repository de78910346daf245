//! Staging/production index pair and the commit protocol
//!
//! All crawl-time writes go to the staging index. Production is only touched
//! by [`IndexCommitter::commit`], which optionally clears it and then moves
//! staging over it in one operation.

use crate::index::traits::{IndexResult, IndexStore, Record, SaveRulesOptions};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Suffix of the staging index name
pub const STAGING_SUFFIX: &str = "_tmp";

/// Names of the production index and its staging copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPair {
    pub production_name: String,
    pub staging_name: String,
}

impl IndexPair {
    pub fn new(production_name: &str) -> Self {
        Self {
            production_name: production_name.to_string(),
            staging_name: format!("{}{}", production_name, STAGING_SUFFIX),
        }
    }
}

/// Owns the index pair for one run
pub struct IndexCommitter {
    store: Arc<dyn IndexStore>,
    pair: IndexPair,
    clear_index: bool,
    committed: AtomicBool,
}

impl IndexCommitter {
    pub fn new(store: Arc<dyn IndexStore>, index_name: &str, clear_index: bool) -> Self {
        Self {
            store,
            pair: IndexPair::new(index_name),
            clear_index,
            committed: AtomicBool::new(false),
        }
    }

    pub fn pair(&self) -> &IndexPair {
        &self.pair
    }

    pub fn store(&self) -> &dyn IndexStore {
        self.store.as_ref()
    }

    pub fn clears_index(&self) -> bool {
        self.clear_index
    }

    /// Prepares the staging index
    ///
    /// - With `clear_index`: staging gets production's query rules, then the
    ///   given settings and rules, and no records.
    /// - Otherwise staging becomes a full copy of production, so records of
    ///   pages not crawled this run survive the swap.
    ///
    /// # Arguments
    ///
    /// * `settings` - Index settings applied to a cleared staging index
    /// * `rules` - Query rules saved to a cleared staging index
    pub async fn initialize(&self, settings: Option<&Value>, rules: &[Value]) -> IndexResult<()> {
        let IndexPair {
            production_name,
            staging_name,
        } = &self.pair;

        if self.clear_index {
            info!(index = %staging_name, "Initializing empty staging index");
            self.store.copy_rules(production_name, staging_name).await?;

            let empty = json!({});
            self.store
                .set_settings(staging_name, settings.unwrap_or(&empty))
                .await?;

            if !rules.is_empty() {
                self.store
                    .save_rules(
                        staging_name,
                        rules,
                        SaveRulesOptions {
                            forward_to_replicas: true,
                            clear_existing: true,
                        },
                    )
                    .await?;
            }
        } else {
            info!(
                from = %production_name,
                to = %staging_name,
                "Initializing staging index as a copy of production"
            );
            self.store.copy_index(production_name, staging_name).await?;
        }

        Ok(())
    }

    /// Writes one batch of records to staging
    pub async fn save_objects(&self, batch: &[Record]) -> IndexResult<()> {
        self.store.save_objects(&self.pair.staging_name, batch).await
    }

    /// Writes synonyms to staging
    pub async fn save_synonyms(&self, synonyms: &[Value]) -> IndexResult<()> {
        self.store
            .save_synonyms(&self.pair.staging_name, synonyms)
            .await
    }

    /// Makes staging the new production index
    ///
    /// With `clear_index`, production records are cleared first; a failure
    /// there is logged and the move still happens, since the move replaces
    /// production entirely. A second call is a no-op.
    pub async fn commit(&self) -> IndexResult<()> {
        if self.committed.load(Ordering::SeqCst) {
            info!(index = %self.pair.production_name, "Index already committed");
            return Ok(());
        }

        if self.clear_index {
            info!(index = %self.pair.production_name, "Clearing production index");
            if let Err(e) = self.store.clear_objects(&self.pair.production_name).await {
                warn!(
                    index = %self.pair.production_name,
                    error = %e,
                    "Couldn't clear production index records"
                );
            }
        }

        self.store
            .move_index(&self.pair.staging_name, &self.pair.production_name)
            .await?;
        self.committed.store(true, Ordering::SeqCst);

        info!(
            from = %self.pair.staging_name,
            to = %self.pair.production_name,
            "Staging index committed"
        );
        Ok(())
    }
}
