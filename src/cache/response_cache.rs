//! In-process response cache with TTL expiry and LRU eviction.
//!
//! Memoizes the two expensive call results in the chat pipeline: vector-search
//! result sets and generated chat replies. Entries expire after a per-entry
//! TTL (lazy on read, or swept periodically) and are evicted least-recently-
//! used when the store is full. One shared instance serves all in-flight
//! request handlers; the interior `Mutex` covers every compound
//! read-modify-write and no I/O happens under it.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::key::CacheKey;
use crate::chat::types::{ChatReply, SearchHit};
use crate::config::CacheConfig;
use crate::error::{FolioError, Result};

/// Namespace for memoized chat replies.
pub const NS_CHAT_RESPONSE: &str = "chat_response";
/// Namespace for memoized vector-search result sets.
pub const NS_VECTOR_SEARCH: &str = "vector_search";

/// The payload types the cache actually stores, as a tagged union so callers
/// get back the concrete type their namespace holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedValue {
    SearchResults(Vec<SearchHit>),
    ChatReply(ChatReply),
}

/// One memoized result.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Original namespace, retained so namespace-scoped invalidation can
    /// filter entries (the hashed key alone cannot be reversed).
    namespace: String,
    value: CachedValue,
    created_at: u64,
    expires_at: u64,
    hit_count: u64,
    last_accessed_at: u64,
}

#[derive(Debug)]
struct CacheInner {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub max_size: usize,
    pub default_ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    /// Hit rate as a percentage, rounded to two decimals; 0 before any request.
    pub hit_rate: f64,
    pub evictions: u64,
    pub expired: u64,
    pub total_requests: u64,
}

/// Introspection data for a single entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub expired: bool,
    pub created_at: u64,
    pub expires_at: u64,
    pub hit_count: u64,
    pub last_accessed_at: u64,
    /// Seconds until expiry; negative once past it.
    pub ttl_remaining_secs: i64,
}

/// Bounded TTL + LRU key-value store keyed by `(namespace, identifier)`.
pub struct ResponseCache {
    enabled: bool,
    max_size: usize,
    default_ttl_secs: u64,
    inner: Mutex<CacheInner>,
}

impl ResponseCache {
    /// Build a cache from config. Fails on nonsensical bounds.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.max_size)
            .ok_or_else(|| FolioError::Config("cache.max_size must be greater than 0".into()))?;
        if config.default_ttl_secs == 0 {
            return Err(FolioError::Config(
                "cache.default_ttl_secs must be greater than 0".into(),
            ));
        }

        info!(
            max_size = config.max_size,
            default_ttl_secs = config.default_ttl_secs,
            enabled = config.enabled,
            "Response cache initialized"
        );

        Ok(Self {
            enabled: config.enabled,
            max_size: config.max_size,
            default_ttl_secs: config.default_ttl_secs,
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expired: 0,
            }),
        })
    }

    /// Look up a value. Returns `None` if the cache is disabled, the key is
    /// absent, or the entry has expired (lazy expiry removes it).
    ///
    /// On a hit the entry becomes most-recently-used and its bookkeeping
    /// fields are updated.
    pub fn get(&self, namespace: &str, identifier: &str) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::encode(namespace, identifier);
        let now = now_secs();
        let mut inner = self.lock();

        let live = {
            // get_mut repositions the entry as MRU; if it turns out to be
            // expired we pop it right after, so the reordering is moot.
            let Some(entry) = inner.entries.get_mut(&key) else {
                inner.misses += 1;
                return None;
            };
            if now > entry.expires_at {
                None
            } else {
                entry.hit_count += 1;
                entry.last_accessed_at = now;
                Some(entry.value.clone())
            }
        };

        match live {
            Some(value) => {
                inner.hits += 1;
                debug!(namespace, key = key.short(), "Cache hit");
                Some(value)
            }
            None => {
                inner.entries.pop(&key);
                inner.expired += 1;
                inner.misses += 1;
                debug!(namespace, key = key.short(), "Cache entry expired");
                None
            }
        }
    }

    /// Store a value with the default TTL. No-op when disabled.
    pub fn set(&self, namespace: &str, identifier: &str, value: CachedValue) {
        self.set_with_ttl(namespace, identifier, value, self.default_ttl_secs);
    }

    /// Store a value with an explicit TTL in seconds. No-op when disabled.
    ///
    /// Overwriting an existing key repositions it as most-recently-used and
    /// does not count as an eviction. Inserting a new key into a full cache
    /// evicts the least-recently-used entry first.
    pub fn set_with_ttl(
        &self,
        namespace: &str,
        identifier: &str,
        value: CachedValue,
        ttl_secs: u64,
    ) {
        if !self.enabled {
            return;
        }

        let key = CacheKey::encode(namespace, identifier);
        let now = now_secs();
        // expires_at must strictly exceed created_at.
        let ttl_secs = ttl_secs.max(1);
        let mut inner = self.lock();

        if !inner.entries.contains(&key) && inner.entries.len() >= self.max_size {
            if let Some((evicted, _)) = inner.entries.pop_lru() {
                inner.evictions += 1;
                debug!(
                    key = evicted.short(),
                    max_size = self.max_size,
                    "Cache eviction: max size reached"
                );
            }
        }

        inner.entries.put(
            key.clone(),
            CacheEntry {
                namespace: namespace.to_string(),
                value,
                created_at: now,
                expires_at: now + ttl_secs,
                hit_count: 0,
                last_accessed_at: now,
            },
        );
        debug!(namespace, key = key.short(), ttl_secs, "Cache set");
    }

    /// Remove a single entry. Returns whether anything was removed.
    pub fn invalidate(&self, namespace: &str, identifier: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let key = CacheKey::encode(namespace, identifier);
        let removed = self.lock().entries.pop(&key).is_some();
        if removed {
            debug!(namespace, key = key.short(), "Cache invalidated");
        }
        removed
    }

    /// Remove every entry belonging to a namespace. Returns the removed count.
    pub fn invalidate_namespace(&self, namespace: &str) -> usize {
        if !self.enabled {
            return 0;
        }
        let mut inner = self.lock();
        let doomed: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.namespace == namespace)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.entries.pop(key);
        }
        debug!(namespace, count = doomed.len(), "Namespace invalidated");
        doomed.len()
    }

    /// Remove all entries unconditionally.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        info!(count, "Cache cleared");
    }

    /// Remove every expired entry, independent of lazy expiry on `get`.
    /// Intended for periodic background invocation. Returns the removed count.
    pub fn sweep_expired(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let now = now_secs();
        let mut inner = self.lock();
        let doomed: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| now > entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.entries.pop(key);
        }
        inner.expired += doomed.len() as u64;
        if !doomed.is_empty() {
            debug!(count = doomed.len(), "Swept expired cache entries");
        }
        doomed.len()
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let total_requests = inner.hits + inner.misses;
        let hit_rate = if total_requests > 0 {
            let pct = (inner.hits as f64 / total_requests as f64) * 100.0;
            (pct * 100.0).round() / 100.0
        } else {
            0.0
        };
        CacheStats {
            enabled: self.enabled,
            size: inner.entries.len(),
            max_size: self.max_size,
            default_ttl_secs: self.default_ttl_secs,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            evictions: inner.evictions,
            expired: inner.expired,
            total_requests,
        }
    }

    /// Introspect one entry without touching recency order or statistics.
    pub fn entry_info(&self, namespace: &str, identifier: &str) -> Option<EntryInfo> {
        if !self.enabled {
            return None;
        }
        let key = CacheKey::encode(namespace, identifier);
        let now = now_secs();
        let inner = self.lock();
        inner.entries.peek(&key).map(|entry| EntryInfo {
            expired: now > entry.expires_at,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            hit_count: entry.hit_count,
            last_accessed_at: entry.last_accessed_at,
            ttl_remaining_secs: entry.expires_at as i64 - now as i64,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A poisoned lock means a panic mid-mutation; every mutation here
        // leaves the maps consistent, so recover the guard.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache(max_size: usize) -> ResponseCache {
        ResponseCache::new(&CacheConfig {
            enabled: true,
            max_size,
            default_ttl_secs: 3600,
        })
        .unwrap()
    }

    fn reply(text: &str) -> CachedValue {
        CachedValue::ChatReply(ChatReply {
            response: text.to_string(),
            context_sources: vec![],
            tokens_used: 10,
            cost: 0.001,
            from_cache: false,
        })
    }

    /// Backdate an entry's timestamps so it reads as expired.
    fn force_expire(cache: &ResponseCache, namespace: &str, identifier: &str) {
        let key = CacheKey::encode(namespace, identifier);
        let mut inner = cache.inner.lock().unwrap();
        let entry = inner.entries.get_mut(&key).unwrap();
        entry.created_at -= 120;
        entry.expires_at = entry.created_at + 60;
    }

    #[test]
    fn test_hit_after_set() {
        let cache = test_cache(10);
        cache.set("chat_response", "p1:hello", reply("hi"));
        assert_eq!(cache.get("chat_response", "p1:hello"), Some(reply("hi")));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = test_cache(10);
        assert!(cache.get("chat_response", "never-set").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_ttl_expiry_counts_once() {
        let cache = test_cache(10);
        cache.set_with_ttl("chat_response", "q", reply("a"), 60);
        force_expire(&cache, "chat_response", "q");

        assert!(cache.get("chat_response", "q").is_none());
        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0, "lazy expiry removes the entry");
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = test_cache(3);
        cache.set("ns", "k1", reply("1"));
        cache.set("ns", "k2", reply("2"));
        cache.set("ns", "k3", reply("3"));
        // k1 is LRU; inserting k4 must evict exactly k1.
        cache.set("ns", "k4", reply("4"));

        assert!(cache.get("ns", "k1").is_none());
        assert!(cache.get("ns", "k2").is_some());
        assert!(cache.get("ns", "k3").is_some());
        assert!(cache.get("ns", "k4").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_repositions_as_mru() {
        // max_size=2: touch "a" via get, then inserting "c" evicts "b".
        let cache = test_cache(2);
        cache.set("ns", "a", reply("1"));
        cache.set("ns", "b", reply("2"));
        assert_eq!(cache.get("ns", "a"), Some(reply("1")));
        cache.set("ns", "c", reply("3"));

        assert!(cache.get("ns", "b").is_none());
        assert_eq!(cache.get("ns", "a"), Some(reply("1")));
        assert_eq!(cache.get("ns", "c"), Some(reply("3")));
    }

    #[test]
    fn test_overwrite_is_not_an_eviction() {
        let cache = test_cache(2);
        cache.set("ns", "a", reply("1"));
        cache.set("ns", "b", reply("2"));
        cache.set("ns", "a", reply("1-updated"));

        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.size, 2);
        assert_eq!(cache.get("ns", "a"), Some(reply("1-updated")));
        // The overwrite made "a" MRU, so a new insert evicts "b".
        cache.set("ns", "c", reply("3"));
        assert!(cache.get("ns", "b").is_none());
        assert!(cache.get("ns", "a").is_some());
    }

    #[test]
    fn test_stats_accuracy_and_hit_rate() {
        let cache = test_cache(10);
        cache.set("ns", "k", reply("v"));
        let _ = cache.get("ns", "k"); // hit
        let _ = cache.get("ns", "k"); // hit
        let _ = cache.get("ns", "missing"); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hit_rate, 66.67);
    }

    #[test]
    fn test_hit_rate_zero_before_any_request() {
        let cache = test_cache(10);
        assert_eq!(cache.stats().hit_rate, 0.0);
        assert_eq!(cache.stats().total_requests, 0);
    }

    #[test]
    fn test_disabled_cache_is_noop() {
        let cache = ResponseCache::new(&CacheConfig {
            enabled: false,
            max_size: 10,
            default_ttl_secs: 3600,
        })
        .unwrap();

        cache.set("ns", "k", reply("v"));
        assert!(cache.get("ns", "k").is_none());
        assert!(!cache.invalidate("ns", "k"));
        assert_eq!(cache.invalidate_namespace("ns"), 0);
        assert_eq!(cache.sweep_expired(), 0);

        let stats = cache.stats();
        assert!(!stats.enabled);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.total_requests, 0, "disabled get is side-effect-free");
    }

    #[test]
    fn test_invalidate() {
        let cache = test_cache(10);
        cache.set("ns", "k", reply("v"));
        assert!(cache.invalidate("ns", "k"));
        assert!(!cache.invalidate("ns", "k"));
        assert!(cache.get("ns", "k").is_none());
    }

    #[test]
    fn test_invalidate_namespace_only_removes_matching() {
        let cache = test_cache(10);
        cache.set("chat_response", "q1", reply("a"));
        cache.set("chat_response", "q2", reply("b"));
        cache.set("vector_search", "q1", reply("c"));

        assert_eq!(cache.invalidate_namespace("chat_response"), 2);
        assert!(cache.get("chat_response", "q1").is_none());
        assert!(cache.get("chat_response", "q2").is_none());
        assert!(cache.get("vector_search", "q1").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = test_cache(10);
        cache.set("ns", "k1", reply("1"));
        cache.set("ns", "k2", reply("2"));
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_sweep_expired() {
        let cache = test_cache(10);
        cache.set("ns", "live", reply("1"));
        cache.set("ns", "dead1", reply("2"));
        cache.set("ns", "dead2", reply("3"));
        force_expire(&cache, "ns", "dead1");
        force_expire(&cache, "ns", "dead2");

        assert_eq!(cache.sweep_expired(), 2);
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.expired, 2);
        assert!(cache.get("ns", "live").is_some());
    }

    #[test]
    fn test_hit_count_and_last_accessed_updated() {
        let cache = test_cache(10);
        cache.set("ns", "k", reply("v"));
        let _ = cache.get("ns", "k");
        let _ = cache.get("ns", "k");

        let info = cache.entry_info("ns", "k").unwrap();
        assert_eq!(info.hit_count, 2);
        assert!(!info.expired);
        assert!(info.ttl_remaining_secs > 0);
        assert!(info.expires_at > info.created_at);
    }

    #[test]
    fn test_entry_info_absent_key() {
        let cache = test_cache(10);
        assert!(cache.entry_info("ns", "nothing").is_none());
    }

    #[test]
    fn test_zero_max_size_rejected_at_construction() {
        let result = ResponseCache::new(&CacheConfig {
            enabled: true,
            max_size: 0,
            default_ttl_secs: 3600,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_search_results_variant_roundtrip() {
        let cache = test_cache(10);
        let hits = CachedValue::SearchResults(vec![SearchHit {
            content_id: "c1".to_string(),
            title: "Project A".to_string(),
            content_type: "project".to_string(),
            description: "A Rust service".to_string(),
            url: "/projects/a".to_string(),
            tech_stack: vec!["Rust".to_string(), "Tokio".to_string()],
            score: 0.83,
        }]);
        cache.set("vector_search", "p1:rust", hits.clone());
        assert_eq!(cache.get("vector_search", "p1:rust"), Some(hits));
    }
}
