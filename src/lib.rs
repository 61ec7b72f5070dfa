//! chart-sync: change reconciliation between host state and a live chart.
//!
//! Given the previous and next chart configuration, [`api::classify`] decides
//! whether the chart can be kept, resized in place, or must be rebuilt.
//! [`api::data_match`] decides whether a new dataset needs to be pushed. Both
//! verdicts can be memoized in bounded, age-limited caches from [`cache`].
//! The chart engine itself stays behind the traits in [`engine`].

pub mod api;
pub mod cache;
pub mod core;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod telemetry;

pub use api::{ChartSync, ReconciliationVerdict, SyncConfig, classify, data_match};
pub use error::{ChartError, ChartResult};
