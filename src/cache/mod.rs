//! Response cache keyed by `(symbol, data kind)`.
//!
//! Deduplicates identical fetches within a TTL chosen by the *source tier* of
//! the data kind. Source tiers describe how fast a data source changes and are
//! unrelated to [`crate::budget::TickerPriority`].
//!
//! Entries are only replaced on `put` or ignored once expired; there is no LRU.
//! Memory is bounded by the size of the tracked universe.

use crate::config::CacheConfig;
use crate::provider::{DataKind, Payload};
use crate::schedule::Clock;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Refresh cadence class of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Quotes and live flow
    Realtime,
    /// Aggregates recomputed a few times an hour
    Intraday,
    /// End-of-day and reference data
    Daily,
}

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub kind: DataKind,
}

impl CacheKey {
    pub fn new(symbol: &str, kind: DataKind) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Payload,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < self.ttl
    }
}

/// Thread-safe TTL cache shared by all scan tasks.
pub struct TtlCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Entries are replaced whole, a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Payload if it is younger than its TTL.
    pub fn get(&self, key: &CacheKey) -> Option<Payload> {
        let now = self.clock.now();
        let entries = self.entries();
        let entry = entries.get(key)?;
        if entry.is_valid(now) {
            trace!(symbol = %key.symbol, kind = ?key.kind, "Cache hit");
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store a payload with an explicit TTL, overwriting any previous entry.
    pub fn put(&self, key: CacheKey, payload: Payload, ttl_minutes: i64) {
        let entry = CacheEntry {
            payload,
            fetched_at: self.clock.now(),
            ttl: Duration::minutes(ttl_minutes),
        };
        self.entries().insert(key, entry);
    }

    /// Store a payload with the TTL of its data kind's source tier.
    pub fn put_for(&self, key: CacheKey, payload: Payload) {
        let ttl = self.config.ttl_minutes(key.kind.source_tier());
        self.put(key, payload, ttl);
    }

    /// Drop expired entries. Housekeeping only; reads already ignore them.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
