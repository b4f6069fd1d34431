//! Content-addressed result cache with least-recently-used eviction.
//!
//! Keys combine the file content fingerprint, the rule id and the rule's
//! option fingerprint, so an entry can only be hit while both the content
//! and the options are unchanged. Nothing expires by time.
//!
//! Storage is a `moka` cache on its LRU policy. A side index maps each path
//! to the keys written for it so [`ResultCache::invalidate`] can drop them.

use crate::fingerprint::Fingerprint;
use crate::types::Violation;

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::debug;

/// Default number of entries kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 16_384;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Fingerprint of the file content.
    pub content: Fingerprint,
    /// Rule id.
    pub rule: String,
    /// Fingerprint of the rule's resolved options.
    pub options: Fingerprint,
}

impl CacheKey {
    /// Creates a key.
    #[must_use]
    pub fn new(content: Fingerprint, rule: impl Into<String>, options: Fingerprint) -> Self {
        Self {
            content,
            rule: rule.into(),
            options,
        }
    }
}

/// A cached result returned by [`ResultCache::get`].
#[derive(Debug, Clone)]
pub struct CachedResult {
    /// Violations produced for this input when it was computed.
    pub violations: Arc<[Violation]>,
    /// When the entry was written.
    pub recorded_at: SystemTime,
}

/// Counters describing cache activity since creation or the last clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Entries dropped by [`ResultCache::invalidate`].
    pub invalidations: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Which paths each key was written for, and the reverse.
#[derive(Default)]
struct PathIndex {
    by_path: HashMap<PathBuf, HashSet<CacheKey>>,
    by_key: HashMap<CacheKey, HashSet<PathBuf>>,
}

impl PathIndex {
    fn link(&mut self, path: &Path, key: &CacheKey) {
        self.by_path
            .entry(path.to_path_buf())
            .or_default()
            .insert(key.clone());
        self.by_key
            .entry(key.clone())
            .or_default()
            .insert(path.to_path_buf());
    }

    fn unlink(&mut self, key: &CacheKey) {
        let Some(paths) = self.by_key.remove(key) else {
            return;
        };
        for path in paths {
            if let Some(keys) = self.by_path.get_mut(&path) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_path.remove(&path);
                }
            }
        }
    }

    /// Removes and returns every key linked to `path`, unlinking each from
    /// its other paths as well.
    fn take(&mut self, path: &Path) -> Vec<CacheKey> {
        let keys: Vec<CacheKey> = self
            .by_path
            .remove(path)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default();
        for key in &keys {
            self.unlink(key);
        }
        keys
    }

    fn clear(&mut self) {
        self.by_path.clear();
        self.by_key.clear();
    }
}

// A panic while the index is held cannot leave a half-applied link, since
// every method finishes its map updates before returning.
fn lock(index: &Mutex<PathIndex>) -> MutexGuard<'_, PathIndex> {
    index.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded, thread-safe map from [`CacheKey`] to prior violations.
///
/// Two writers for the same key compute the same value, so the last one
/// wins. The path index is never held while calling into the store.
pub struct ResultCache {
    capacity: usize,
    store: Cache<CacheKey, CachedResult>,
    index: Arc<Mutex<PathIndex>>,
    counters: Arc<Counters>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResultCache {
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let index = Arc::new(Mutex::new(PathIndex::default()));
        let counters = Arc::new(Counters::default());

        let listener_index = Arc::clone(&index);
        let listener_counters = Arc::clone(&counters);
        let store = Cache::builder()
            .max_capacity(capacity as u64)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |key: Arc<CacheKey>, _, cause| {
                if cause == RemovalCause::Size {
                    debug!(
                        "Evicting cache entry {} for rule {}",
                        key.content.short(),
                        key.rule
                    );
                    lock(&listener_index).unlink(&key);
                    listener_counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();

        Self {
            capacity,
            store,
            index,
            counters,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Looks up a prior result.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedResult> {
        let hit = self.store.get(key);
        let counter = if hit.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Inserts or replaces the result for `key`, associating it with `path`.
    ///
    /// Evicts the least recently used entry when the cache is full.
    pub fn put(&self, path: &Path, key: CacheKey, violations: Vec<Violation>) {
        self.store.insert(
            key.clone(),
            CachedResult {
                violations: violations.into(),
                recorded_at: SystemTime::now(),
            },
        );
        lock(&self.index).link(path, &key);
    }

    /// Removes every entry associated with `path`. Returns how many went.
    pub fn invalidate(&self, path: &Path) -> usize {
        let keys = lock(&self.index).take(path);
        let removed = keys
            .iter()
            .filter(|key| self.store.remove(*key).is_some())
            .count();
        if removed > 0 {
            debug!("Invalidated {removed} cache entr(ies) for {}", path.display());
        }
        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        self.store.invalidate_all();
        self.store.run_pending_tasks();
        lock(&self.index).clear();
        for counter in [
            &self.counters.hits,
            &self.counters.misses,
            &self.counters.evictions,
            &self.counters.invalidations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Number of entries currently held.
    ///
    /// Applies pending evictions first, so the count never exceeds
    /// [`ResultCache::capacity`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.run_pending_tasks();
        usize::try_from(self.store.entry_count()).unwrap_or(usize::MAX)
    }

    /// Returns true if the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is present, without touching recency.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains_key(key)
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, Severity};

    fn key(content: &str, rule: &str) -> CacheKey {
        CacheKey::new(
            Fingerprint::of_content(content),
            rule,
            Fingerprint::of_content("{}"),
        )
    }

    fn violation(path: &str) -> Violation {
        Violation::new(
            "r",
            Severity::Warning,
            path,
            Location::new(1, 1),
            "m",
        )
    }

    #[test]
    fn miss_then_hit() {
        let cache = ResultCache::new(4);
        let k = key("abc", "r");
        assert!(cache.get(&k).is_none());
        cache.put(Path::new("a.txt"), k.clone(), vec![violation("a.txt")]);
        let hit = cache.get(&k).unwrap();
        assert_eq!(hit.violations.len(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn changed_content_or_options_miss() {
        let cache = ResultCache::new(4);
        cache.put(Path::new("a.txt"), key("abc", "r"), Vec::new());
        assert!(cache.get(&key("abd", "r")).is_none());
        let other_options = CacheKey::new(
            Fingerprint::of_content("abc"),
            "r",
            Fingerprint::of_content("{\"max\":1}"),
        );
        assert!(cache.get(&other_options).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ResultCache::new(2);
        let (a, b, c) = (key("a", "r"), key("b", "r"), key("c", "r"));
        cache.put(Path::new("a"), a.clone(), Vec::new());
        cache.put(Path::new("b"), b.clone(), Vec::new());
        assert_eq!(cache.len(), 2);
        // Touch `a` so `b` becomes the oldest.
        assert!(cache.get(&a).is_some());
        cache.put(Path::new("c"), c.clone(), Vec::new());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn eviction_unlinks_the_path() {
        let cache = ResultCache::new(1);
        cache.put(Path::new("a"), key("a", "r"), Vec::new());
        assert_eq!(cache.len(), 1);
        cache.put(Path::new("b"), key("b", "r"), Vec::new());
        assert_eq!(cache.len(), 1);

        assert!(!lock(&cache.index).by_path.contains_key(Path::new("a")));
        assert_eq!(cache.invalidate(Path::new("a")), 0);
        assert_eq!(cache.invalidate(Path::new("b")), 1);
    }

    #[test]
    fn stays_within_capacity_at_scale() {
        let cache = ResultCache::new(32);
        for i in 0..1_000 {
            cache.put(Path::new("f"), key(&i.to_string(), "r"), Vec::new());
        }
        assert_eq!(cache.len(), 32);
        assert_eq!(cache.stats().evictions, 968);
        assert!(cache.contains(&key("999", "r")));
    }

    #[test]
    fn update_does_not_evict() {
        let cache = ResultCache::new(1);
        let a = key("a", "r");
        cache.put(Path::new("a"), a.clone(), Vec::new());
        cache.put(Path::new("a"), a.clone(), vec![violation("a")]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&a).unwrap().violations.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn invalidate_removes_entries_for_path() {
        let cache = ResultCache::new(8);
        cache.put(Path::new("a.txt"), key("x", "r1"), Vec::new());
        cache.put(Path::new("a.txt"), key("x", "r2"), Vec::new());
        cache.put(Path::new("b.txt"), key("y", "r1"), Vec::new());

        assert_eq!(cache.invalidate(Path::new("a.txt")), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key("y", "r1")));
        assert_eq!(cache.invalidate(Path::new("a.txt")), 0);
    }

    #[test]
    fn shared_entry_invalidated_through_either_path() {
        let cache = ResultCache::new(8);
        let shared = key("same", "r");
        cache.put(Path::new("a.txt"), shared.clone(), Vec::new());
        cache.put(Path::new("b.txt"), shared.clone(), Vec::new());
        assert_eq!(cache.invalidate(Path::new("b.txt")), 1);
        assert!(!cache.contains(&shared));
        assert_eq!(cache.invalidate(Path::new("a.txt")), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let cache = ResultCache::new(8);
        cache.put(Path::new("a"), key("a", "r"), Vec::new());
        let _ = cache.get(&key("a", "r"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn concurrent_writers_same_key() {
        let cache = Arc::new(ResultCache::new(64));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        cache.put(Path::new("a.txt"), key("same", "r"), vec![violation("a.txt")]);
                        let _ = cache.get(&key("same", "r"));
                        cache.put(Path::new("b.txt"), key(&i.to_string(), "r"), Vec::new());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.get(&key("same", "r")).unwrap().violations.len(), 1);
        assert_eq!(cache.len(), 9);
    }
}
