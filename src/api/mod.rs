//! Host-facing reconciliation API.
//!
//! Hosts memoize their configuration with [`OptionsMemo`], hand snapshots to
//! [`ChartSync`] and let it translate changes into the cheapest chart-engine
//! calls. [`classify`] and [`data_match`] are usable on their own.

mod chart_pool;
mod chart_sync;
mod data_match;
mod options_memo;
mod options_reconciler;
mod sync_config;

pub use chart_pool::{
    ChartPool, DEFAULT_POOL_MAX_IDLE_MS, DEFAULT_POOL_MAX_SIZE, PoolConfig, PoolLease,
    PooledChartId,
};
pub use chart_sync::{ChartSync, SyncReport};
pub use data_match::{
    ContentFingerprint, DataMatchCache, DataMatchOptions, DataMatchQuery, IdentityFingerprint,
    PairVerdict, ShapeFingerprint, SharedDataMatchCache, SharedDatasetPair, data_match,
    data_match_cached, data_match_shared,
};
pub use options_memo::OptionsMemo;
pub use options_reconciler::{ReconciliationVerdict, classify};
pub use sync_config::{SYNC_CONFIG_JSON_SCHEMA_V1, SyncConfig, SyncConfigJsonContractV1};
