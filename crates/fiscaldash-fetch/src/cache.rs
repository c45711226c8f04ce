//! Process-wide memo of loaded tables, keyed by source location.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use tracing::debug;

struct CacheEntry {
    table: Arc<RecordBatch>,
    stored_at: Instant,
}

/// Location → immutable table, with optional expiry and manual invalidation.
///
/// Stored tables are never modified, so a poisoned lock still guards a
/// consistent map and is recovered rather than propagated.
pub struct TableCache {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TableCache {
    /// Create a cache. `None` keeps entries until invalidated.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cached table for `location`, unless missing or expired.
    pub fn get(&self, location: &str) -> Option<Arc<RecordBatch>> {
        self.get_at(location, Instant::now())
    }

    fn get_at(&self, location: &str, now: Instant) -> Option<Arc<RecordBatch>> {
        let mut entries = self.lock();
        let entry = entries.get(location)?;
        if let Some(ttl) = self.ttl
            && now.saturating_duration_since(entry.stored_at) >= ttl
        {
            debug!(location, "cache entry expired");
            entries.remove(location);
            return None;
        }
        Some(Arc::clone(&entry.table))
    }

    pub fn insert(&self, location: &str, table: Arc<RecordBatch>) {
        self.lock().insert(
            location.to_string(),
            CacheEntry {
                table,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, location: &str) -> bool {
        self.lock().remove(location).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
