// src/cache.rs
//! Single-slot, time-expiring cache for the last aggregation result.
//! Process-lifetime only; a restart starts cold.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::ingest::types::Article;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry {
    fetched_at: Instant,
    data: Arc<Vec<Article>>,
}

/// Absolute TTL, no sliding refresh. Concurrent callers racing an expired
/// slot may each run their own aggregation pass; each result is
/// independently consistent, so the last writer simply wins.
pub struct NewsCache {
    ttl: Duration,
    slot: Mutex<Option<Entry>>,
}

impl NewsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached articles only while the entry is fresh.
    pub fn get(&self) -> Option<Arc<Vec<Article>>> {
        let guard = self.slot.lock().expect("cache mutex poisoned");
        guard
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.data))
    }

    /// Replaces the slot with a fresh result and returns it shared.
    pub fn put(&self, data: Vec<Article>) -> Arc<Vec<Article>> {
        let data = Arc::new(data);
        let mut guard = self.slot.lock().expect("cache mutex poisoned");
        *guard = Some(Entry {
            fetched_at: Instant::now(),
            data: Arc::clone(&data),
        });
        data
    }
}
