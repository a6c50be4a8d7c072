//! Query Cache
//!
//! Per-query in-memory cache keyed by operation name and arguments.
//! Entries expire lazily: freshness is checked on read and stale entries are
//! dropped there.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashboard_core::{DashboardError, DashboardResult};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// Build the cache key for one call: the JSON encoding of `[name, args]`.
///
/// Arguments must serialize deterministically; tuples, structs and
/// primitives all do.
pub fn cache_key<A: Serialize>(name: &str, args: &A) -> DashboardResult<String> {
    serde_json::to_string(&(name, args))
        .map_err(|e| DashboardError::validation(format!("Unserializable query arguments: {}", e)))
}

/// Cached value with metadata
#[derive(Debug, Clone)]
struct CachedValue<T> {
    data: T,
    stored_at: Instant,
    updated_at: DateTime<Utc>,
}

impl<T> CachedValue<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// A fresh cache hit
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub data: T,
    /// When the value was originally fetched
    pub updated_at: DateTime<Utc>,
}

pub struct QueryCache<T> {
    entries: Mutex<HashMap<String, CachedValue<T>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value younger than `ttl`
    pub fn get(&self, key: &str, ttl: Duration) -> Option<CacheHit<T>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(ttl) => Some(CacheHit {
                data: entry.data.clone(),
                updated_at: entry.updated_at,
            }),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value, replacing any previous entry; returns its timestamp
    pub fn insert(&self, key: String, data: T) -> DateTime<Utc> {
        let updated_at = Utc::now();
        self.entries.lock().insert(
            key,
            CachedValue {
                data,
                stored_at: Instant::now(),
                updated_at,
            },
        );
        updated_at
    }

    /// Drop every entry older than `ttl`; returns how many remain
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_fresh(ttl));
        entries.len()
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_includes_name_and_args() {
        assert_eq!(
            cache_key("getPriceData", &("TCS.NS",)).unwrap(),
            r#"["getPriceData",["TCS.NS"]]"#
        );
        assert_ne!(
            cache_key("getPriceData", &"TCS.NS").unwrap(),
            cache_key("getTechnicalAnalysis", &"TCS.NS").unwrap()
        );
        assert_eq!(cache_key("getPerformance", &()).unwrap(), r#"["getPerformance",null]"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = QueryCache::new();
        let ttl = Duration::from_secs(60);
        cache.insert("k".to_string(), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k", ttl).map(|hit| hit.data), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k", ttl).is_none());
        // Stale entry was dropped on read
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_drops_only_stale_entries() {
        let cache = QueryCache::new();
        let ttl = Duration::from_secs(60);
        cache.insert("old".to_string(), 1);
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("new".to_string(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.purge_expired(ttl), 1);
        assert_eq!(cache.get("new", ttl).map(|hit| hit.data), Some(2));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.purge_expired(ttl), 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = QueryCache::new();
        cache.insert("a".to_string(), "x");
        cache.insert("b".to_string(), "y");

        cache.invalidate("a");
        assert!(cache.get("a", Duration::from_secs(1)).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
