use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{DataSource, SourceQuery};
use report_model::{PipelineError, Table};

/// Cumulative fetch-cache counters, for observability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<SourceQuery, Arc<Table>>,
    stats: FetchStats,
}

/// Session fetch cache over any [`DataSource`].
///
/// At most one underlying fetch runs per distinct [`SourceQuery`] for the
/// lifetime of the cache; repeated fetches share one `Arc<Table>`. The memo
/// is unbounded on purpose, since eviction would break that contract, and
/// invalidation only ever happens explicitly (a new reporting period is the
/// caller's call, never the cache's). Failed fetches are not cached.
///
/// The state lock is held across a miss, so concurrent fetches of the same
/// key cannot stampede the underlying source.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    state: Mutex<CacheState>,
}

impl<S: DataSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Fetches through the cache, sharing the table with other callers.
    pub fn fetch_shared(&self, query: &SourceQuery) -> Result<Arc<Table>, PipelineError> {
        let mut state = self.state.lock().expect("fetch cache poisoned");
        if let Some(hit) = state.entries.get(query).map(Arc::clone) {
            state.stats.hits += 1;
            return Ok(hit);
        }

        state.stats.misses += 1;
        let table = Arc::new(self.inner.fetch(query)?);
        state.entries.insert(query.clone(), Arc::clone(&table));
        Ok(table)
    }

    /// Drops the cached table for `query`. Returns whether an entry existed.
    pub fn invalidate(&self, query: &SourceQuery) -> bool {
        let mut state = self.state.lock().expect("fetch cache poisoned");
        let removed = state.entries.remove(query).is_some();
        if !removed {
            log::warn!(
                "fetch cache: invalidate of {} matched no cached entry",
                query.source_id
            );
        }
        removed
    }

    /// Drops every cached table (e.g. a full refresh button).
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock().expect("fetch cache poisoned");
        state.entries.clear();
    }

    pub fn stats(&self) -> FetchStats {
        self.state.lock().expect("fetch cache poisoned").stats
    }
}

impl<S: DataSource> DataSource for CachedSource<S> {
    fn fetch(&self, query: &SourceQuery) -> Result<Table, PipelineError> {
        self.fetch_shared(query).map(|table| (*table).clone())
    }
}
