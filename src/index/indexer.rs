//! Record staging with the hit-count circuit breaker

use crate::index::committer::IndexCommitter;
use crate::index::traits::Record;
use crate::ScraperError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Records written to the staging index per call
pub const BATCH_SIZE: usize = 50;

#[derive(Debug, Default)]
struct BreakerState {
    staged: usize,
    tripped: bool,
}

/// Stages extracted records into the staging index
///
/// Shared by every in-flight request of a run. The staged-record counter and
/// the breaker check live under one lock, so concurrent batches cannot both
/// cross the limit and trip twice.
pub struct RecordIndexer {
    committer: Arc<IndexCommitter>,
    nb_hits_max: usize,
    state: Mutex<BreakerState>,
}

impl RecordIndexer {
    /// # Arguments
    ///
    /// * `committer` - Owner of the staging index
    /// * `nb_hits_max` - Staged-record limit, 0 for unlimited
    pub fn new(committer: Arc<IndexCommitter>, nb_hits_max: usize) -> Self {
        Self {
            committer,
            nb_hits_max,
            state: Mutex::new(BreakerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records staged so far
    pub fn staged_count(&self) -> usize {
        self.lock().staged
    }

    /// Returns true once the circuit breaker has tripped
    pub fn is_halted(&self) -> bool {
        self.lock().tripped
    }

    /// Reserves room for `size` records, tripping the breaker if the limit is crossed
    fn reserve(&self, size: usize) -> Result<(), ScraperError> {
        let mut state = self.lock();
        if state.tripped {
            return Err(ScraperError::CircuitBreakerTripped {
                staged: state.staged,
                limit: self.nb_hits_max,
            });
        }

        state.staged += size;
        if self.nb_hits_max > 0 && state.staged > self.nb_hits_max {
            let staged = state.staged;
            state.staged = 0;
            state.tripped = true;
            return Err(ScraperError::CircuitBreakerTripped {
                staged,
                limit: self.nb_hits_max,
            });
        }

        Ok(())
    }

    /// Stages the records of one page in batches of [`BATCH_SIZE`]
    ///
    /// # Errors
    ///
    /// - `ScraperError::CircuitBreakerTripped` if the staged-record limit is
    ///   exceeded; the offending batch is not staged and the run must stop
    /// - `ScraperError::Index` if the staging write fails
    pub async fn add_records(
        &self,
        records: &[Record],
        url: &str,
        from_sitemap: bool,
    ) -> Result<(), ScraperError> {
        for batch in records.chunks(BATCH_SIZE) {
            if let Err(e) = self.reserve(batch.len()) {
                warn!(url, error = %e, "Circuit breaker tripped");
                return Err(e);
            }
            self.committer.save_objects(batch).await?;
        }

        info!(url, records = records.len(), from_sitemap, "> DocSearch: staged records");
        Ok(())
    }

    /// Stages the values of a name-keyed synonym map in one call
    pub async fn add_synonyms(
        &self,
        synonyms: &BTreeMap<String, Value>,
    ) -> Result<(), ScraperError> {
        let list: Vec<Value> = synonyms.values().cloned().collect();
        self.committer.save_synonyms(&list).await?;
        info!(synonyms = list.len(), "> DocSearch: staged synonyms");
        Ok(())
    }
}
