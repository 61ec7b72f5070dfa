use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Fingerprint, Fingerprinter, SharedClock, SystemClock};

pub const DEFAULT_CACHE_MAX_SIZE: usize = 50;
pub const DEFAULT_CACHE_MAX_AGE_MS: u64 = 60_000;

fn default_max_size() -> usize {
    DEFAULT_CACHE_MAX_SIZE
}

fn default_max_age_ms() -> u64 {
    DEFAULT_CACHE_MAX_AGE_MS
}

/// Capacity and age limits for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Live entry count that triggers low-frequency eviction. `0` disables storage.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Entries strictly older than this are dropped.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_MAX_SIZE,
            max_age_ms: DEFAULT_CACHE_MAX_AGE_MS,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn max_age(self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }

    /// Number of entries dropped per capacity eviction: a fifth of
    /// `max_size`, never less than one.
    #[must_use]
    pub fn eviction_batch(self) -> usize {
        if self.max_size == 0 {
            0
        } else {
            (self.max_size / 5).max(1)
        }
    }
}

/// Runtime counters exposed by a bounded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub expirations: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at_ms: u64,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, now_ms: u64) -> Self {
        Self {
            value,
            created_at_ms: now_ms,
            access_count: 1,
        }
    }

    fn is_expired(&self, now_ms: u64, max_age_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > max_age_ms
    }
}

/// Memoizing store with age-based expiry and least-frequently-used eviction.
///
/// Keys are derived from caller inputs by the cache's fingerprinter `F`.
/// Operations never fail: a miss (or an input that cannot be fingerprinted)
/// returns `None` and the caller recomputes.
///
/// When the live entry count reaches `max_size`, `set` drops the
/// [`CacheConfig::eviction_batch`] entries with the lowest access count. Ties
/// go to the entry inserted first.
///
/// The cache is not synchronized; hosts sharing one instance across threads
/// must wrap it in a lock.
pub struct BoundedCache<V, F> {
    config: CacheConfig,
    fingerprinter: F,
    clock: SharedClock,
    entries: IndexMap<Fingerprint, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    expirations: u64,
    evictions: u64,
}

impl<V, F> BoundedCache<V, F> {
    #[must_use]
    pub fn new(config: CacheConfig, fingerprinter: F) -> Self {
        Self::with_clock(config, fingerprinter, SystemClock::shared())
    }

    #[must_use]
    pub fn with_clock(config: CacheConfig, fingerprinter: F, clock: SharedClock) -> Self {
        Self {
            config,
            fingerprinter,
            clock,
            entries: IndexMap::new(),
            hits: 0,
            misses: 0,
            expirations: 0,
            evictions: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    #[must_use]
    pub fn fingerprinter(&self) -> &F {
        &self.fingerprinter
    }

    /// Stored entry count, including entries that expired but were not purged yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            expirations: self.expirations,
            evictions: self.evictions,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn fingerprint_of<I: ?Sized>(&self, input: &I) -> Option<Fingerprint>
    where
        F: Fingerprinter<I>,
    {
        self.fingerprinter.fingerprint(input)
    }

    pub fn get<I: ?Sized>(&mut self, input: &I) -> Option<&V>
    where
        F: Fingerprinter<I>,
    {
        let Some(key) = self.fingerprinter.fingerprint(input) else {
            self.misses = self.misses.saturating_add(1);
            return None;
        };
        self.get_by_fingerprint(&key)
    }

    /// Same as `get(..).is_some()`; a hit counts as an access.
    pub fn has<I: ?Sized>(&mut self, input: &I) -> bool
    where
        F: Fingerprinter<I>,
    {
        self.get(input).is_some()
    }

    pub fn set<I: ?Sized>(&mut self, input: &I, value: V)
    where
        F: Fingerprinter<I>,
    {
        if let Some(key) = self.fingerprinter.fingerprint(input) {
            self.set_by_fingerprint(key, value);
        }
    }

    pub fn get_or_insert_with<I: ?Sized>(&mut self, input: &I, build: impl FnOnce() -> V) -> V
    where
        F: Fingerprinter<I>,
        V: Clone,
    {
        let Some(key) = self.fingerprinter.fingerprint(input) else {
            self.misses = self.misses.saturating_add(1);
            return build();
        };
        if let Some(value) = self.get_by_fingerprint(&key) {
            return value.clone();
        }
        let value = build();
        self.set_by_fingerprint(key, value.clone());
        value
    }

    pub fn get_by_fingerprint(&mut self, key: &Fingerprint) -> Option<&V> {
        let now_ms = self.clock.now_millis();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now_ms, self.config.max_age_ms),
            None => {
                self.misses = self.misses.saturating_add(1);
                return None;
            }
        };

        if expired {
            self.entries.shift_remove(key);
            self.expirations = self.expirations.saturating_add(1);
            self.misses = self.misses.saturating_add(1);
            trace!(key = %key, "cache entry expired on access");
            return None;
        }

        self.hits = self.hits.saturating_add(1);
        let entry = self.entries.get_mut(key)?;
        entry.access_count = entry.access_count.saturating_add(1);
        Some(&entry.value)
    }

    pub fn set_by_fingerprint(&mut self, key: Fingerprint, value: V) {
        if self.config.max_size == 0 {
            return;
        }

        let now_ms = self.clock.now_millis();
        self.purge_expired(now_ms);
        if self.entries.len() >= self.config.max_size {
            self.evict_least_frequent();
        }

        trace!(key = %key, size = self.entries.len(), "cache insert");
        self.entries.insert(key, CacheEntry::new(value, now_ms));
    }

    fn purge_expired(&mut self, now_ms: u64) {
        let max_age_ms = self.config.max_age_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(now_ms, max_age_ms));
        let purged = before - self.entries.len();
        if purged > 0 {
            self.expirations = self.expirations.saturating_add(purged as u64);
            trace!(purged, "purged expired cache entries");
        }
    }

    fn evict_least_frequent(&mut self) {
        let batch = self.config.eviction_batch().min(self.entries.len());
        let mut ranked: Vec<(u64, usize)> = self
            .entries
            .values()
            .enumerate()
            .map(|(index, entry)| (entry.access_count, index))
            .collect();
        ranked.sort_unstable();

        let mut victims: Vec<usize> = ranked.into_iter().take(batch).map(|(_, i)| i).collect();
        victims.sort_unstable_by(|a, b| b.cmp(a));
        for index in victims {
            self.entries.shift_remove_index(index);
        }

        self.evictions = self.evictions.saturating_add(batch as u64);
        debug!(
            evicted = batch,
            remaining = self.entries.len(),
            max_size = self.config.max_size,
            "cache capacity eviction"
        );
    }
}

impl<V, F> fmt::Debug for BoundedCache<V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{BoundedCache, CacheConfig};
    use crate::cache::{FnFingerprint, Fingerprint, ManualClock, SerializedFingerprint};

    fn cache(max_size: usize, clock: &ManualClock) -> BoundedCache<u32, SerializedFingerprint> {
        let config = CacheConfig::default()
            .with_max_size(max_size)
            .with_max_age(Duration::from_millis(1_000));
        BoundedCache::with_clock(config, SerializedFingerprint, clock.shared())
    }

    #[test]
    fn eviction_batch_is_a_fifth_with_floor_of_one() {
        assert_eq!(CacheConfig::default().eviction_batch(), 10);
        assert_eq!(CacheConfig::default().with_max_size(3).eviction_batch(), 1);
        assert_eq!(CacheConfig::default().with_max_size(0).eviction_batch(), 0);
    }

    #[test]
    fn entry_at_exact_max_age_is_still_live() {
        let clock = ManualClock::new(0);
        let mut cache = cache(4, &clock);
        cache.set("k", 7);

        clock.advance_millis(1_000);
        assert_eq!(cache.get("k"), Some(&7));

        clock.advance_millis(1);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn ties_evict_oldest_insertion_first() {
        let clock = ManualClock::new(0);
        let mut cache = cache(3, &clock);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        cache.set("d", 4);

        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.has("d"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let clock = ManualClock::new(0);
        let mut cache = cache(0, &clock);
        cache.set("k", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn unfingerprintable_input_is_a_miss() {
        let mut cache: BoundedCache<u32, _> = BoundedCache::new(
            CacheConfig::default(),
            FnFingerprint(|_: &u8| -> Option<Fingerprint> { None }),
        );
        cache.set(&1u8, 10);
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_insert_with(&1u8, || 11), 11);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn get_or_insert_with_builds_once() {
        let clock = ManualClock::new(0);
        let mut cache = cache(4, &clock);
        let mut builds = 0;

        for _ in 0..3 {
            let value = cache.get_or_insert_with("k", || {
                builds += 1;
                42
            });
            assert_eq!(value, 42);
        }
        assert_eq!(builds, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn overwrite_at_capacity_still_evicts_least_frequent() {
        let clock = ManualClock::new(0);
        let mut cache = cache(2, &clock);
        cache.set_by_fingerprint(Fingerprint::from("a"), 1);
        cache.set_by_fingerprint(Fingerprint::from("b"), 2);
        for _ in 0..5 {
            let _ = cache.get_by_fingerprint(&Fingerprint::from("a"));
        }
        let _ = cache.get_by_fingerprint(&Fingerprint::from("b"));

        cache.set_by_fingerprint(Fingerprint::from("a"), 10);
        assert_eq!(cache.get_by_fingerprint(&Fingerprint::from("a")), Some(&10));
        assert!(cache.get_by_fingerprint(&Fingerprint::from("b")).is_none());
    }
}
