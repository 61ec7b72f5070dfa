use std::ptr;
use std::sync::{Arc, Weak};

#[cfg(feature = "parallel-match")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{trace, warn};

use crate::cache::{BoundedCache, CacheConfig, Fingerprint, Fingerprinter};
use crate::core::{AlignedDataset, canonical_zero};

/// Strictness knobs for dataset comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataMatchOptions {
    /// Compare each series by its serialized form instead of element by element.
    #[serde(default)]
    pub strict: bool,
    /// Do not short-circuit two zero-series datasets to equal.
    #[serde(default)]
    pub skip_empty_check: bool,
}

impl DataMatchOptions {
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_skip_empty_check(mut self, skip_empty_check: bool) -> Self {
        self.skip_empty_check = skip_empty_check;
        self
    }
}

/// Input addressed by a data-match cache.
#[derive(Debug, Clone, Copy)]
pub struct DataMatchQuery<'a> {
    pub lhs: &'a AlignedDataset,
    pub rhs: &'a AlignedDataset,
    pub options: DataMatchOptions,
}

/// `{lhs_series}_{rhs_series}_{strict}`.
///
/// Ignores values entirely: two different datasets with the same series count
/// and mode share one cached verdict. Only sound for hosts where shape and mode
/// determine equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeFingerprint;

impl<'a> Fingerprinter<DataMatchQuery<'a>> for ShapeFingerprint {
    fn fingerprint(&self, input: &DataMatchQuery<'a>) -> Option<Fingerprint> {
        Some(Fingerprint::new(shape_key(input)))
    }
}

/// Shape key plus a SHA-256 digest of both datasets' values.
///
/// Hashing reads every sample, so a hit saves no work over a fresh
/// comparison. Useful when verdicts are shared between callers that only hold
/// borrowed datasets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentFingerprint;

impl<'a> Fingerprinter<DataMatchQuery<'a>> for ContentFingerprint {
    fn fingerprint(&self, input: &DataMatchQuery<'a>) -> Option<Fingerprint> {
        let mut hasher = Sha256::new();
        digest_dataset(&mut hasher, input.lhs);
        digest_dataset(&mut hasher, input.rhs);
        Some(Fingerprint::new(format!(
            "{}_{:x}",
            shape_key(input),
            hasher.finalize()
        )))
    }
}

pub type DataMatchCache<F = ContentFingerprint> = BoundedCache<bool, F>;

impl DataMatchCache {
    #[must_use]
    pub fn with_config(config: CacheConfig) -> Self {
        BoundedCache::new(config, ContentFingerprint)
    }
}

fn shape_key(input: &DataMatchQuery<'_>) -> String {
    format!(
        "{}_{}_{}",
        input.lhs.series_count(),
        input.rhs.series_count(),
        input.options.strict
    )
}

fn digest_dataset(hasher: &mut Sha256, data: &AlignedDataset) {
    hasher.update((data.series_count() as u64).to_le_bytes());
    for series in data.series() {
        hasher.update((series.len() as u64).to_le_bytes());
        for value in series {
            match value {
                Some(value) => {
                    hasher.update([1_u8]);
                    hasher.update(value.to_bits().to_le_bytes());
                }
                None => hasher.update([0_u8]),
            }
        }
    }
}

/// Two `Arc`-shared snapshots addressed by pointer identity.
#[derive(Debug, Clone, Copy)]
pub struct SharedDatasetPair<'a> {
    pub lhs: &'a Arc<AlignedDataset>,
    pub rhs: &'a Arc<AlignedDataset>,
    pub options: DataMatchOptions,
}

/// Keys a pair by the addresses of its two allocations.
///
/// The pair is unordered since the comparison is symmetric. Keys stay sound
/// only while both allocations are pinned, which [`PairVerdict`] does.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFingerprint;

impl<'a> Fingerprinter<SharedDatasetPair<'a>> for IdentityFingerprint {
    fn fingerprint(&self, input: &SharedDatasetPair<'a>) -> Option<Fingerprint> {
        let lhs = Arc::as_ptr(input.lhs) as usize;
        let rhs = Arc::as_ptr(input.rhs) as usize;
        let (low, high) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
        Some(Fingerprint::new(format!(
            "{low:x}_{high:x}_{}_{}",
            input.options.strict, input.options.skip_empty_check
        )))
    }
}

/// Cached verdict for a [`SharedDatasetPair`].
///
/// Holds weak references to both snapshots: the samples are freed with the
/// last strong owner, but the allocations (and so the addresses in the key)
/// cannot be reused while the entry lives.
#[derive(Debug, Clone)]
pub struct PairVerdict {
    matched: bool,
    _pins: [Weak<AlignedDataset>; 2],
}

impl PairVerdict {
    #[must_use]
    pub fn matched(&self) -> bool {
        self.matched
    }
}

pub type SharedDataMatchCache = BoundedCache<PairVerdict, IdentityFingerprint>;

impl SharedDataMatchCache {
    #[must_use]
    pub fn with_config(config: CacheConfig) -> Self {
        BoundedCache::new(config, IdentityFingerprint)
    }
}

/// Returns whether two aligned datasets hold the same values.
///
/// Identical references match without looking at values. The non-strict path
/// uses plain `==` per sample: `NaN` never matches and `None` matches `None`.
#[must_use]
pub fn data_match(lhs: &AlignedDataset, rhs: &AlignedDataset, options: DataMatchOptions) -> bool {
    if let Some(verdict) = quick_verdict(lhs, rhs, options) {
        return verdict;
    }
    compare_series(lhs, rhs, options.strict)
}

/// `data_match` memoized through `cache`.
///
/// The cached verdict is returned as-is on a hit, so the cache's fingerprinter
/// decides how trustworthy a hit is (see [`ShapeFingerprint`]).
pub fn data_match_cached<F>(
    lhs: &AlignedDataset,
    rhs: &AlignedDataset,
    options: DataMatchOptions,
    cache: &mut BoundedCache<bool, F>,
) -> bool
where
    F: for<'a> Fingerprinter<DataMatchQuery<'a>>,
{
    if let Some(verdict) = quick_verdict(lhs, rhs, options) {
        return verdict;
    }

    let query = DataMatchQuery { lhs, rhs, options };
    if let Some(&cached) = cache.get(&query) {
        trace!(cached, "data match served from cache");
        return cached;
    }

    let matched = compare_series(lhs, rhs, options.strict);
    cache.set(&query, matched);
    matched
}

/// `data_match` for `Arc`-shared snapshots, memoized by allocation identity.
///
/// Building a key costs two pointer reads, so a host that swaps between a few
/// long-lived snapshots gets its repeat comparisons for free.
pub fn data_match_shared(
    lhs: &Arc<AlignedDataset>,
    rhs: &Arc<AlignedDataset>,
    options: DataMatchOptions,
    cache: &mut SharedDataMatchCache,
) -> bool {
    if let Some(verdict) = quick_verdict(lhs, rhs, options) {
        return verdict;
    }

    let pair = SharedDatasetPair { lhs, rhs, options };
    if let Some(cached) = cache.get(&pair) {
        trace!(matched = cached.matched, "shared data match served from cache");
        return cached.matched;
    }

    let matched = compare_series(lhs, rhs, options.strict);
    cache.set(
        &pair,
        PairVerdict {
            matched,
            _pins: [Arc::downgrade(lhs), Arc::downgrade(rhs)],
        },
    );
    matched
}

fn quick_verdict(
    lhs: &AlignedDataset,
    rhs: &AlignedDataset,
    options: DataMatchOptions,
) -> Option<bool> {
    if ptr::eq(lhs, rhs) {
        return Some(true);
    }
    if lhs.series_count() != rhs.series_count() {
        return Some(false);
    }
    if !options.skip_empty_check && lhs.is_empty() && rhs.is_empty() {
        return Some(true);
    }
    None
}

#[cfg(feature = "parallel-match")]
fn compare_series(lhs: &AlignedDataset, rhs: &AlignedDataset, strict: bool) -> bool {
    lhs.series()
        .par_iter()
        .zip(rhs.series().par_iter())
        .all(|(lhs, rhs)| series_match(lhs, rhs, strict))
}

#[cfg(not(feature = "parallel-match"))]
fn compare_series(lhs: &AlignedDataset, rhs: &AlignedDataset, strict: bool) -> bool {
    lhs.series()
        .iter()
        .zip(rhs.series())
        .all(|(lhs, rhs)| series_match(lhs, rhs, strict))
}

fn series_match(lhs: &[Option<f64>], rhs: &[Option<f64>], strict: bool) -> bool {
    if lhs.len() != rhs.len() {
        return false;
    }
    if strict {
        return match (serialize_series(lhs), serialize_series(rhs)) {
            (Ok(lhs), Ok(rhs)) => lhs == rhs,
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "series serialization failed; treating as changed");
                false
            }
        };
    }
    lhs.iter().zip(rhs).all(|(lhs, rhs)| lhs == rhs)
}

fn serialize_series(series: &[Option<f64>]) -> serde_json::Result<String> {
    let normalized: Vec<Option<f64>> = series.iter().map(|v| v.map(canonical_zero)).collect();
    serde_json::to_string(&normalized)
}
