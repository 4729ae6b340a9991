use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    value: Value,
}

/// Memoized results of client operations, keyed by operation name and arguments
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<&'static str, HashMap<String, CacheEntry>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<&'static str, HashMap<String, CacheEntry>>> {
        // A panic while holding the lock can't leave an entry half written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the stored value unless it is older than `refresh_interval`
    pub fn lookup(
        &self,
        operation: &'static str,
        key: &str,
        refresh_interval: Option<Duration>,
    ) -> Option<Value> {
        let entries = self.entries();

        let entry = entries.get(operation)?.get(key)?;

        match refresh_interval {
            Some(interval) if entry.stored_at.elapsed() > interval => {
                log::debug!("Cached '{operation}' result for '{key}' is stale");
                None
            }
            _ => Some(entry.value.clone()),
        }
    }

    pub fn store(&self, operation: &'static str, key: String, value: Value) {
        self.entries().entry(operation).or_default().insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    /// When the entry was (last) stored
    pub fn stored_at(&self, operation: &'static str, key: &str) -> Option<Instant> {
        self.entries()
            .get(operation)
            .and_then(|entries| entries.get(key))
            .map(|entry| entry.stored_at)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// The number of memoized results across all operations
    pub fn len(&self) -> usize {
        self.entries().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
