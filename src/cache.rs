//! Per-source freshness cache.
//!
//! Entries are checked lazily on read; nothing evicts them in the background,
//! so a stale payload stays in memory until the next `get` or `put`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKey {
    Fires,
    Modis,
    Viirs,
}

impl SourceKey {
    pub const ALL: [SourceKey; 3] = [SourceKey::Fires, SourceKey::Modis, SourceKey::Viirs];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::Fires => "fires",
            SourceKey::Modis => "modis",
            SourceKey::Viirs => "viirs",
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Empty,
    Fresh,
    Stale,
}

struct CacheEntry<V> {
    payload: Option<Arc<V>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    fn empty() -> Self {
        Self {
            payload: None,
            fetched_at: None,
        }
    }
}

/// Payloads are handed out as shared `Arc`s; callers must treat them as read-only.
pub struct FreshnessCache<V> {
    entries: Mutex<HashMap<SourceKey, CacheEntry<V>>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<V> FreshnessCache<V> {
    pub fn new(ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        let entries = SourceKey::ALL
            .iter()
            .map(|key| (*key, CacheEntry::empty()))
            .collect();

        Self {
            entries: Mutex::new(entries),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SourceKey, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hit only when a payload exists and `now - fetched_at < ttl`.
    pub fn get(&self, key: SourceKey) -> Option<Arc<V>> {
        let now = self.clock.now();
        let entries = self.lock();
        let entry = entries.get(&key)?;

        match (&entry.payload, entry.fetched_at) {
            (Some(payload), Some(fetched_at)) if now - fetched_at < self.ttl => {
                Some(Arc::clone(payload))
            }
            _ => None,
        }
    }

    pub fn put(&self, key: SourceKey, payload: V) -> Arc<V> {
        let payload = Arc::new(payload);
        let now = self.clock.now();

        self.lock().insert(
            key,
            CacheEntry {
                payload: Some(Arc::clone(&payload)),
                fetched_at: Some(now),
            },
        );

        payload
    }

    pub fn invalidate(&self, key: SourceKey) {
        self.lock().insert(key, CacheEntry::empty());
    }

    pub fn status(&self, key: SourceKey) -> CacheStatus {
        let now = self.clock.now();
        let entries = self.lock();

        match entries.get(&key).map(|entry| (&entry.payload, entry.fetched_at)) {
            Some((Some(_), Some(fetched_at))) if now - fetched_at < self.ttl => CacheStatus::Fresh,
            Some((Some(_), Some(_))) => CacheStatus::Stale,
            _ => CacheStatus::Empty,
        }
    }

    pub fn fetched_at(&self, key: SourceKey) -> Option<DateTime<Utc>> {
        self.lock().get(&key).and_then(|entry| entry.fetched_at)
    }
}
