use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;

use crate::result::QueryResult;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CacheMeta {
    /// Unix seconds of the request that stored the entry.
    pub refreshed_at: i64,
    /// Unix seconds of the computation of the result.
    pub last_computed_at: i64,
    /// Named range the window was derived from, e.g. "30MIN".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dashboard_id: u64,
    pub unit_id: u64,
    pub from: i64,
    pub to: i64,
    pub timezone: String,
}

impl CacheKey {
    pub fn new(dashboard_id: u64, unit_id: u64, from: i64, to: i64, timezone: &str) -> Self {
        Self {
            dashboard_id,
            unit_id,
            from,
            to,
            timezone: timezone.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CachedResult {
    pub result: QueryResult,
    pub meta: CacheMeta,
}

/// Dashboard unit results keyed by the exact `(dashboard, unit, from, to, timezone)`.
///
/// Writes replace the whole entry, the last writer wins.
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CachedResult>>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached result and its meta, None on a miss.
    pub fn get(
        &self,
        dashboard_id: u64,
        unit_id: u64,
        from: i64,
        to: i64,
        timezone: &str,
    ) -> Option<CachedResult> {
        let key = CacheKey::new(dashboard_id, unit_id, from, to, timezone);
        self.entries.lock().get(&key).cloned()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &self,
        result: QueryResult,
        dashboard_id: u64,
        unit_id: u64,
        from: i64,
        to: i64,
        timezone: &str,
        meta: CacheMeta,
    ) {
        let key = CacheKey::new(dashboard_id, unit_id, from, to, timezone);
        self.entries.lock().put(key, CachedResult { result, meta });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
