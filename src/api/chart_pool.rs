use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cache::{SharedClock, SystemClock};
use crate::core::{AlignedDataset, ChartConfiguration};
use crate::engine::{ChartFactory, ChartHandle};
use crate::error::{ChartError, ChartResult};

use super::SyncConfig;

pub const DEFAULT_POOL_MAX_SIZE: usize = 5;
pub const DEFAULT_POOL_MAX_IDLE_MS: u64 = 30_000;

fn default_max_pool_size() -> usize {
    DEFAULT_POOL_MAX_SIZE
}

fn default_max_idle_ms() -> u64 {
    DEFAULT_POOL_MAX_IDLE_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
    /// Released handles idle for strictly longer than this are destroyed.
    #[serde(default = "default_max_idle_ms")]
    pub max_idle_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: DEFAULT_POOL_MAX_SIZE,
            max_idle_ms: DEFAULT_POOL_MAX_IDLE_MS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    #[must_use]
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle_ms = u64::try_from(max_idle.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PooledChartId(u64);

impl PooledChartId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Result of [`ChartPool::acquire`].
///
/// A full pool still hands out a working chart, but the caller owns it and is
/// responsible for destroying it.
#[derive(Debug)]
pub enum PoolLease<H> {
    Pooled(PooledChartId),
    Unpooled(H),
}

impl<H> PoolLease<H> {
    #[must_use]
    pub fn pooled_id(&self) -> Option<PooledChartId> {
        match self {
            Self::Pooled(id) => Some(*id),
            Self::Unpooled(_) => None,
        }
    }
}

struct PoolSlot<H> {
    handle: H,
    in_use: bool,
    last_used_ms: u64,
}

/// Small pool of chart handles recycled between short-lived hosts.
pub struct ChartPool<F: ChartFactory> {
    factory: F,
    config: PoolConfig,
    clock: SharedClock,
    slots: IndexMap<PooledChartId, PoolSlot<F::Handle>>,
    next_id: u64,
}

impl<F: ChartFactory> ChartPool<F> {
    #[must_use]
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self::with_clock(factory, config, SystemClock::shared())
    }

    /// Pool limited by the host's `pool` settings.
    #[must_use]
    pub fn with_sync_config(factory: F, sync_config: &SyncConfig) -> Self {
        Self::new(factory, sync_config.pool)
    }

    #[must_use]
    pub fn with_clock(factory: F, config: PoolConfig, clock: SharedClock) -> Self {
        Self {
            factory,
            config,
            clock,
            slots: IndexMap::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Number of pooled handles, busy or idle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.slots.values().filter(|slot| !slot.in_use).count()
    }

    /// Hands out a chart showing `config` and `data`.
    ///
    /// Expired idle handles are destroyed first. The oldest idle handle is
    /// then resized and refilled; if the engine rejects either call that
    /// handle is dropped from the pool and a fresh one is created. Reuse does
    /// not look at `target` or structural fields.
    pub fn acquire(
        &mut self,
        config: &ChartConfiguration,
        data: &AlignedDataset,
        target: &F::Target,
    ) -> ChartResult<PoolLease<F::Handle>> {
        let now_ms = self.clock.now_millis();
        self.cleanup(now_ms);

        let idle = self
            .slots
            .iter()
            .find(|(_, slot)| !slot.in_use)
            .map(|(id, _)| *id);
        if let Some(id) = idle {
            match self.reuse(id, config, data, now_ms) {
                Ok(()) => {
                    debug!(id = id.get(), "reusing pooled chart");
                    return Ok(PoolLease::Pooled(id));
                }
                Err(err) => {
                    warn!(id = id.get(), error = %err, "pooled chart rejected reuse; replacing");
                    self.remove(id);
                }
            }
        }

        let handle = self.factory.create(config, data, target)?;
        if self.slots.len() >= self.config.max_pool_size {
            debug!(pooled = self.slots.len(), "chart pool full; handing out unpooled chart");
            return Ok(PoolLease::Unpooled(handle));
        }

        let id = PooledChartId(self.next_id);
        self.next_id += 1;
        self.slots.insert(
            id,
            PoolSlot {
                handle,
                in_use: true,
                last_used_ms: now_ms,
            },
        );
        trace!(id = id.get(), pooled = self.slots.len(), "pooled new chart");
        Ok(PoolLease::Pooled(id))
    }

    /// Marks a pooled chart idle. Returns `false` for unknown ids.
    pub fn release(&mut self, id: PooledChartId) -> bool {
        let now_ms = self.clock.now_millis();
        match self.slots.get_mut(&id) {
            Some(slot) => {
                slot.in_use = false;
                slot.last_used_ms = now_ms;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn handle(&self, id: PooledChartId) -> Option<&F::Handle> {
        self.slots.get(&id).map(|slot| &slot.handle)
    }

    pub fn handle_mut(&mut self, id: PooledChartId) -> Option<&mut F::Handle> {
        self.slots.get_mut(&id).map(|slot| &mut slot.handle)
    }

    /// Destroys every pooled handle, busy ones included.
    pub fn destroy_all(&mut self) {
        let destroyed = self.slots.len();
        for (_, slot) in self.slots.drain(..) {
            slot.handle.destroy();
        }
        if destroyed > 0 {
            debug!(destroyed, "chart pool drained");
        }
    }

    fn reuse(
        &mut self,
        id: PooledChartId,
        config: &ChartConfiguration,
        data: &AlignedDataset,
        now_ms: u64,
    ) -> ChartResult<()> {
        let slot = self.slots.get_mut(&id).ok_or_else(|| {
            ChartError::InvalidData(format!("unknown pooled chart {}", id.get()))
        })?;
        slot.in_use = true;
        slot.last_used_ms = now_ms;
        if let Some(size) = config.size() {
            slot.handle.set_size(size)?;
        }
        slot.handle.set_data(data)
    }

    fn remove(&mut self, id: PooledChartId) {
        if let Some(slot) = self.slots.shift_remove(&id) {
            slot.handle.destroy();
        }
    }

    fn cleanup(&mut self, now_ms: u64) {
        let max_idle_ms = self.config.max_idle_ms;
        let expired: Vec<PooledChartId> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                !slot.in_use && now_ms.saturating_sub(slot.last_used_ms) > max_idle_ms
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.remove(*id);
        }
        if !expired.is_empty() {
            debug!(expired = expired.len(), "destroyed idle pooled charts");
        }
    }
}

impl<F: ChartFactory> fmt::Debug for ChartPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartPool")
            .field("config", &self.config)
            .field("len", &self.slots.len())
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl<F: ChartFactory> Drop for ChartPool<F> {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartPool, PoolConfig, PoolLease};
    use crate::api::SyncConfig;
    use crate::cache::ManualClock;
    use crate::core::{AlignedDataset, ChartConfiguration, ChartSize};
    use crate::engine::{ChartCall, ChartJournal, NullChartFactory};

    fn pool(config: PoolConfig) -> (ChartPool<NullChartFactory>, ChartJournal, ManualClock) {
        let journal = ChartJournal::default();
        let clock = ManualClock::new(0);
        let pool = ChartPool::with_clock(
            NullChartFactory::new(journal.clone()),
            config,
            clock.shared(),
        );
        (pool, journal, clock)
    }

    #[test]
    fn released_chart_is_resized_and_refilled_on_reuse() {
        let (mut pool, journal, _clock) = pool(PoolConfig::default());
        let config = ChartConfiguration::new().with_size(600.0, 300.0);
        let data = AlignedDataset::from_dense(vec![vec![0.0, 1.0]]);
        let target = "root".to_owned();

        let first = pool.acquire(&config, &data, &target).expect("acquire");
        let id = first.pooled_id().expect("pooled");
        assert!(pool.release(id));
        journal.take();

        let next = ChartConfiguration::new().with_size(800.0, 300.0);
        let second = pool.acquire(&next, &data, &target).expect("reacquire");
        assert_eq!(second.pooled_id(), Some(id));
        assert_eq!(
            journal.take(),
            vec![
                ChartCall::SetSize {
                    handle_id: 1,
                    size: ChartSize::new(800.0, 300.0),
                },
                ChartCall::SetData {
                    handle_id: 1,
                    series_count: 1,
                    point_count: 2,
                },
            ]
        );
    }

    #[test]
    fn full_pool_hands_out_unpooled_charts() {
        let (mut pool, _journal, _clock) = pool(PoolConfig::default().with_max_pool_size(1));
        let config = ChartConfiguration::new();
        let data = AlignedDataset::default();
        let target = String::new();

        let first = pool.acquire(&config, &data, &target).expect("acquire");
        let second = pool.acquire(&config, &data, &target).expect("acquire");
        assert!(matches!(first, PoolLease::Pooled(_)));
        assert!(matches!(second, PoolLease::Unpooled(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn idle_charts_expire_strictly_after_max_idle() {
        let (mut pool, journal, clock) = pool(PoolConfig::default());
        let config = ChartConfiguration::new();
        let data = AlignedDataset::default();
        let target = String::new();

        let lease = pool.acquire(&config, &data, &target).expect("acquire");
        pool.release(lease.pooled_id().expect("pooled"));
        clock.advance_millis(30_000);
        pool.acquire(&config, &data, &target).expect("reuse at boundary");
        assert_eq!(pool.len(), 1);

        pool.destroy_all();
        journal.take();
        let lease = pool.acquire(&config, &data, &target).expect("acquire");
        pool.release(lease.pooled_id().expect("pooled"));
        clock.advance_millis(30_001);
        assert_eq!(pool.idle_count(), 1);
        pool.acquire(&config, &data, &target).expect("acquire after expiry");
        assert!(journal.calls().contains(&ChartCall::Destroy { handle_id: 2 }));
    }

    #[test]
    fn sync_config_limits_the_pool() {
        let settings = SyncConfig::from_json_compat_str(r#"{ "pool": { "max_pool_size": 1 } }"#)
            .expect("parse");
        let mut pool = ChartPool::with_sync_config(NullChartFactory::default(), &settings);
        assert_eq!(pool.config().max_pool_size, 1);
        assert_eq!(pool.config().max_idle_ms, 30_000);

        let config = ChartConfiguration::new();
        let data = AlignedDataset::default();
        let target = String::new();
        pool.acquire(&config, &data, &target).expect("acquire");
        let overflow = pool.acquire(&config, &data, &target).expect("acquire");
        assert!(matches!(overflow, PoolLease::Unpooled(_)));
    }
}
