//! Cached table loader: fetch → decode → parse, memoized per location.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use tracing::{debug, info};

use crate::decode::read_csv_table;
use crate::{Fetch, FetchError, SourceFetcher, TableCache};

/// Loads CSV sources as Arrow tables, one fetch per location per cache entry.
pub struct TableLoader<F = SourceFetcher> {
    fetcher: F,
    cache: TableCache,
}

impl<F: Fetch> TableLoader<F> {
    pub fn new(fetcher: F, cache: TableCache) -> Self {
        Self { fetcher, cache }
    }

    /// Load the table at `location`, serving it from the cache when possible.
    ///
    /// A single attempt is made; failures are not cached.
    pub async fn load(&self, location: &str) -> Result<Arc<RecordBatch>, FetchError> {
        if let Some(table) = self.cache.get(location) {
            debug!(location, "cache hit");
            return Ok(table);
        }

        let bytes = self.fetcher.fetch(location).await?;
        let table = Arc::new(read_csv_table(location, &bytes)?);
        info!(
            location,
            rows = table.num_rows(),
            columns = table.num_columns(),
            "loaded table"
        );
        self.cache.insert(location, Arc::clone(&table));
        Ok(table)
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }
}
