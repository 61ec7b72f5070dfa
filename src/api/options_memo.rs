use std::sync::Arc;

use tracing::debug;

use crate::cache::{
    BoundedCache, CacheConfig, CacheStats, Fingerprint, Fingerprinter, SerializedFingerprint,
};
use crate::core::ChartConfiguration;

use super::SyncConfig;

/// Memoizes configuration builders so equal requests yield the same `Arc`.
///
/// Identity stability is what lets [`super::ChartSync`] skip reconciliation:
/// an unchanged request hands back the previous pointer and the next sync pass
/// sees no options change at all.
///
/// With storage disabled (`max_size == 0`) the memo still remembers the most
/// recent request, so back-to-back equal requests keep one identity.
pub struct OptionsMemo<F = SerializedFingerprint> {
    cache: BoundedCache<Arc<ChartConfiguration>, F>,
    last: Option<(Fingerprint, Arc<ChartConfiguration>)>,
}

impl OptionsMemo {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_cache(BoundedCache::new(config, SerializedFingerprint))
    }

    /// Memo sized by the host's `options_cache` settings.
    #[must_use]
    pub fn from_sync_config(sync_config: &SyncConfig) -> Self {
        Self::new(sync_config.options_cache)
    }
}

impl Default for OptionsMemo {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<F> OptionsMemo<F> {
    #[must_use]
    pub fn with_cache(cache: BoundedCache<Arc<ChartConfiguration>, F>) -> Self {
        Self { cache, last: None }
    }

    /// Returns the configuration for `request`, building it at most once per
    /// live cache entry.
    ///
    /// Every lookup goes through the cache, so expiry and access counts apply
    /// to repeated requests too. Requests the fingerprinter rejects are built
    /// fresh every time.
    pub fn get_or_build<R: ?Sized>(
        &mut self,
        request: &R,
        build: impl FnOnce(&R) -> ChartConfiguration,
    ) -> Arc<ChartConfiguration>
    where
        F: Fingerprinter<R>,
    {
        let Some(key) = self.cache.fingerprint_of(request) else {
            debug!("options request has no fingerprint; building uncached");
            self.last = None;
            return Arc::new(build(request));
        };

        if let Some(cached) = self.cache.get_by_fingerprint(&key) {
            debug!(key = %key, "serving cached chart options");
            return Arc::clone(cached);
        }

        if self.cache.config().max_size > 0 {
            let built = Arc::new(build(request));
            self.cache.set_by_fingerprint(key, Arc::clone(&built));
            return built;
        }

        match &self.last {
            Some((last_key, last_config)) if *last_key == key => Arc::clone(last_config),
            _ => {
                let built = Arc::new(build(request));
                self.last = Some((key, Arc::clone(&built)));
                built
            }
        }
    }

    /// Forgets every memoized configuration.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.last = None;
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
