use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cache::CacheStats;
use crate::core::{AlignedDataset, ChartConfiguration, ChartSize};
use crate::engine::{ChartFactory, ChartHandle};
use crate::error::{ChartError, ChartResult};
use crate::extensions::{ChartObserver, LifecycleContext, LifecycleEvent};

use super::{
    DataMatchOptions, ReconciliationVerdict, SharedDataMatchCache, SyncConfig, classify,
    data_match_shared,
};

/// What one `sync` pass did to the live chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Options verdict, when the configuration changed identity.
    pub verdict: Option<ReconciliationVerdict>,
    pub resized: bool,
    pub data_swapped: bool,
    pub rebuilt: bool,
    pub creation_failed: bool,
}

impl SyncReport {
    #[must_use]
    pub fn is_noop(self) -> bool {
        !(self.resized || self.data_swapped || self.rebuilt || self.creation_failed)
    }
}

/// Keeps one live chart handle in sync with host-owned configuration and data.
///
/// Snapshots are compared by `Arc` identity first; only a changed identity
/// triggers reconciliation. Per pass the driver performs the cheapest set of
/// engine calls: nothing, a resize, a data swap (possibly together with a
/// resize), or one full rebuild. A failed creation is recorded in
/// [`ChartSync::last_error`] and retried on the next pass that carries a change.
///
/// Data verdicts are cached by snapshot identity, so a host flipping between a
/// handful of retained snapshots compares each pair once.
pub struct ChartSync<F: ChartFactory> {
    factory: F,
    handle: Option<F::Handle>,
    config: Arc<ChartConfiguration>,
    data: Arc<AlignedDataset>,
    target: F::Target,
    data_match: DataMatchOptions,
    data_cache: SharedDataMatchCache,
    observers: IndexMap<String, Box<dyn ChartObserver>>,
    last_error: Option<ChartError>,
    generation: u64,
}

impl<F: ChartFactory> ChartSync<F> {
    #[must_use]
    pub fn new(
        factory: F,
        config: Arc<ChartConfiguration>,
        data: Arc<AlignedDataset>,
        target: F::Target,
    ) -> Self {
        Self::with_config(factory, config, data, target, SyncConfig::default())
    }

    #[must_use]
    pub fn with_config(
        factory: F,
        config: Arc<ChartConfiguration>,
        data: Arc<AlignedDataset>,
        target: F::Target,
        sync_config: SyncConfig,
    ) -> Self {
        Self {
            factory,
            handle: None,
            config,
            data,
            target,
            data_match: sync_config.data_match,
            data_cache: SharedDataMatchCache::with_config(sync_config.data_match_cache),
            observers: IndexMap::new(),
            last_error: None,
            generation: 0,
        }
    }

    /// Adds a lifecycle observer. Observers are notified in registration order.
    pub fn register_observer(&mut self, observer: Box<dyn ChartObserver>) -> ChartResult<()> {
        if observer.id().is_empty() {
            return Err(ChartError::InvalidConfiguration(
                "lifecycle observer needs a non-empty id".to_owned(),
            ));
        }
        match self.observers.entry(observer.id().to_owned()) {
            Entry::Occupied(entry) => Err(ChartError::InvalidConfiguration(format!(
                "lifecycle observer `{}` is already attached to this chart",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                debug!(observer = entry.key().as_str(), "lifecycle observer attached");
                entry.insert(observer);
                Ok(())
            }
        }
    }

    /// Detaches the observer registered under `observer_id`, keeping the
    /// notification order of the rest. Returns the detached observer.
    pub fn unregister_observer(&mut self, observer_id: &str) -> Option<Box<dyn ChartObserver>> {
        self.observers.shift_remove(observer_id)
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Creates the first handle. Returns `false` when creation failed.
    pub fn mount(&mut self) -> bool {
        if self.handle.is_some() {
            return true;
        }
        self.rebuild(None)
    }

    /// Destroys the live handle, if any.
    pub fn unmount(&mut self) {
        self.destroy_handle(None);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn handle(&self) -> Option<&F::Handle> {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut F::Handle> {
        self.handle.as_mut()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&ChartError> {
        self.last_error.as_ref()
    }

    /// Number of handles created so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn config(&self) -> &Arc<ChartConfiguration> {
        &self.config
    }

    #[must_use]
    pub fn data(&self) -> &Arc<AlignedDataset> {
        &self.data
    }

    #[must_use]
    pub fn target(&self) -> &F::Target {
        &self.target
    }

    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    #[must_use]
    pub fn data_cache_stats(&self) -> CacheStats {
        self.data_cache.stats()
    }

    fn rebuild(&mut self, verdict: Option<ReconciliationVerdict>) -> bool {
        self.destroy_handle(verdict);
        match self.factory.create(&self.config, &self.data, &self.target) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.generation += 1;
                self.last_error = None;
                debug!(generation = self.generation, target = ?self.target, "chart created");
                self.emit(LifecycleEvent::Created, verdict);
                true
            }
            Err(err) => {
                warn!(error = %err, target = ?self.target, "chart creation failed; keeping fallback state");
                self.last_error = Some(err);
                self.emit(LifecycleEvent::CreationFailed, verdict);
                false
            }
        }
    }

    fn destroy_handle(&mut self, verdict: Option<ReconciliationVerdict>) {
        if let Some(handle) = self.handle.take() {
            handle.destroy();
            debug!(generation = self.generation, "chart destroyed");
            self.emit(LifecycleEvent::Destroyed, verdict);
        }
    }

    fn emit(&mut self, event: LifecycleEvent, verdict: Option<ReconciliationVerdict>) {
        let context = LifecycleContext {
            generation: self.generation,
            verdict,
            series_count: self.data.series_count(),
            point_count: self.data.point_count(),
        };
        for observer in self.observers.values_mut() {
            observer.on_event(event, context);
        }
    }

    /// Brings the live chart in line with the next host snapshot.
    pub fn sync(
        &mut self,
        config: Arc<ChartConfiguration>,
        data: Arc<AlignedDataset>,
        target: F::Target,
    ) -> SyncReport {
        let options_changed = !Arc::ptr_eq(&self.config, &config);
        let data_changed = !Arc::ptr_eq(&self.data, &data);
        let target_changed = self.target != target;

        let mut report = SyncReport::default();
        let mut resized_to: Option<ChartSize> = None;
        let mut rebuild =
            target_changed || (self.handle.is_none() && (options_changed || data_changed));

        if options_changed {
            let verdict = classify(&self.config, &config);
            report.verdict = Some(verdict);
            if verdict.requires_rebuild() {
                rebuild = true;
            } else if verdict == ReconciliationVerdict::Update && !rebuild {
                match (config.size(), self.handle.as_mut()) {
                    (Some(size), Some(handle)) => match handle.set_size(size) {
                        Ok(()) => resized_to = Some(size),
                        Err(err) => {
                            warn!(error = %err, "resize rejected; rebuilding chart");
                            rebuild = true;
                        }
                    },
                    _ => rebuild = true,
                }
            }
        }

        if data_changed && !rebuild {
            if let Some(handle) = self.handle.as_mut() {
                if !data_match_shared(&self.data, &data, self.data_match, &mut self.data_cache) {
                    match handle.set_data(&data) {
                        Ok(()) => report.data_swapped = true,
                        Err(err) => {
                            warn!(error = %err, "data swap rejected; rebuilding chart");
                            rebuild = true;
                        }
                    }
                }
            }
        }

        self.config = config;
        self.data = data;
        self.target = target;

        if rebuild {
            if self.rebuild(report.verdict) {
                report.rebuilt = true;
            } else {
                report.creation_failed = true;
            }
        } else {
            if let Some(size) = resized_to {
                report.resized = true;
                self.emit(LifecycleEvent::Resized { size }, report.verdict);
            }
            if report.data_swapped {
                self.emit(LifecycleEvent::DataSwapped, report.verdict);
            }
        }

        trace!(?report, "sync pass complete");
        report
    }
}

impl<F: ChartFactory> Drop for ChartSync<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.destroy();
        }
    }
}
