//! Bounded memoization for derived chart values.
//!
//! Two instances are expected in a host: one for derived configuration objects
//! (see [`crate::api::OptionsMemo`]) and one for dataset-equality verdicts
//! (see [`crate::api::SharedDataMatchCache`]). Each is constructed by the host and
//! passed to its call sites; there is no process-wide cache.

mod bounded;
mod clock;
mod fingerprint;

pub use bounded::{
    BoundedCache, CacheConfig, CacheStats, DEFAULT_CACHE_MAX_AGE_MS, DEFAULT_CACHE_MAX_SIZE,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use fingerprint::{
    FnFingerprint, Fingerprint, Fingerprinter, PreviewFingerprint, SerializedFingerprint,
};
