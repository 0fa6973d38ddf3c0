//! Cache API: named request/response stores, versioned by name.
//!
//! A [`CacheStorage`] holds [`Cache`]s keyed by name; each cache maps a
//! request path to a stored [`CacheEntry`]. Versioning works by naming
//! convention alone: a new shell version opens a new cache name, and
//! activation deletes every cache whose name differs from the current one.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, Method, StatusCode};

use crate::{FetchRequest, FetchResponse};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// HTTP status at store time.
    pub status: StatusCode,
    /// Response headers at store time.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// Store timestamp, ms since the Unix epoch.
    pub stored_at: u64,
}

impl CacheEntry {
    /// Snapshot a response into an entry.
    pub fn from_response(response: &FetchResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: now_ms(),
        }
    }

    /// Rebuild a response from this entry, marked as cache-origin.
    pub fn to_response(&self) -> FetchResponse {
        FetchResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            from_cache: true,
        }
    }
}

/// A single named cache.
#[derive(Debug, Clone)]
pub struct Cache {
    name: String,
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create an empty cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// The cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a request. Only GET requests ever match.
    pub fn match_request(&self, request: &FetchRequest) -> Option<&CacheEntry> {
        if request.method != Method::GET {
            return None;
        }
        self.entries.get(&request.path)
    }

    /// Store an entry under a path, replacing any previous one.
    pub fn put(&mut self, path: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(path.into(), entry);
    }

    /// Remove an entry. Returns true if one was present.
    pub fn delete(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Paths currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hit/miss counters across all caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in [0, 1]. Zero lookups count as 0.0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// All named caches visible to one worker host.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    // Cache names in creation order; lookups check oldest first.
    order: Vec<String>,
    stats: CacheStats,
}

impl CacheStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache by name, creating it if absent.
    pub fn open(&mut self, name: &str) -> &mut Cache {
        if !self.caches.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Whether a cache with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache and everything in it. Returns true if it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        if self.caches.remove(name).is_some() {
            self.order.retain(|existing| existing.as_str() != name);
            true
        } else {
            false
        }
    }

    /// Names of all caches, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Look up a request across every cache, counting the hit or miss.
    ///
    /// Caches are checked oldest first, so while two generations coexist
    /// the older one answers for paths present in both.
    pub fn match_request(&mut self, request: &FetchRequest) -> Option<FetchResponse> {
        for name in &self.order {
            let entry = self
                .caches
                .get(name)
                .and_then(|cache| cache.match_request(request));
            if let Some(entry) = entry {
                let response = entry.to_response();
                self.stats.hits += 1;
                return Some(response);
            }
        }
        self.stats.misses += 1;
        None
    }

    /// Counters so far.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(body: &'static str) -> CacheEntry {
        CacheEntry::from_response(&FetchResponse::new(StatusCode::OK, body))
    }

    #[test]
    fn test_cache_put_and_match() {
        let mut cache = Cache::new("shell-v1");
        assert_eq!(cache.name(), "shell-v1");
        cache.put("/", entry("<html>"));

        let hit = cache.match_request(&FetchRequest::get("/"));
        assert!(hit.is_some());
        assert_eq!(hit.map(|e| e.body.clone()), Some(Bytes::from("<html>")));
        assert!(cache.match_request(&FetchRequest::get("/missing")).is_none());
    }

    #[test]
    fn test_cache_ignores_non_get() {
        let mut cache = Cache::new("shell-v1");
        cache.put("/", entry("<html>"));

        let post = FetchRequest::new(Method::POST, "/");
        assert!(cache.match_request(&post).is_none());
    }

    #[test]
    fn test_cache_delete() {
        let mut cache = Cache::new("shell-v1");
        cache.put("/login", entry(""));
        assert_eq!(cache.keys(), vec!["/login".to_string()]);

        assert!(cache.delete("/login"));
        assert!(!cache.delete("/login"));
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn test_entry_round_trip_marks_cache_origin() {
        let original = FetchResponse::new(StatusCode::OK, "body");
        let rebuilt = CacheEntry::from_response(&original).to_response();

        assert_eq!(rebuilt.status, original.status);
        assert_eq!(rebuilt.body, original.body);
        assert!(rebuilt.from_cache);
    }

    #[test]
    fn test_storage_open_and_delete() {
        let mut storage = CacheStorage::new();
        storage.open("shell-v1").put("/", entry(""));

        assert!(storage.has("shell-v1"));
        assert!(!storage.has("shell-v2"));
        assert!(storage.delete("shell-v1"));
        assert!(!storage.has("shell-v1"));
        assert!(!storage.delete("shell-v1"));
    }

    #[test]
    fn test_storage_match_searches_all_caches() {
        let mut storage = CacheStorage::new();
        storage.open("shell-v1").put("/old", entry("old"));
        storage.open("shell-v2").put("/new", entry("new"));

        assert!(storage.match_request(&FetchRequest::get("/old")).is_some());
        assert!(storage.match_request(&FetchRequest::get("/new")).is_some());
        assert!(storage.match_request(&FetchRequest::get("/gone")).is_none());
    }

    #[test]
    fn test_storage_match_checks_oldest_cache_first() {
        let mut storage = CacheStorage::new();
        storage.open("shell-v1").put("/", entry("old"));
        storage.open("shell-v2").put("/", entry("new"));

        let hit = storage.match_request(&FetchRequest::get("/")).unwrap();
        assert_eq!(hit.body, Bytes::from("old"));

        storage.delete("shell-v1");
        let hit = storage.match_request(&FetchRequest::get("/")).unwrap();
        assert_eq!(hit.body, Bytes::from("new"));
    }

    #[test]
    fn test_storage_keys_in_creation_order() {
        let mut storage = CacheStorage::new();
        storage.open("shell-v1");
        storage.open("shell-v2");
        storage.open("shell-v1");

        assert_eq!(
            storage.keys(),
            vec!["shell-v1".to_string(), "shell-v2".to_string()]
        );

        storage.delete("shell-v1");
        assert_eq!(storage.keys(), vec!["shell-v2".to_string()]);
    }

    #[test]
    fn test_storage_stats() {
        let mut storage = CacheStorage::new();
        storage.open("shell-v1").put("/", entry(""));

        storage.match_request(&FetchRequest::get("/"));
        storage.match_request(&FetchRequest::get("/"));
        storage.match_request(&FetchRequest::get("/missing"));

        let stats = storage.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }
}
