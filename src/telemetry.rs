//! Opt-in log output for hosts that do not install their own subscriber.
//!
//! Sync passes, cache evictions and chart lifecycle changes are `tracing`
//! events under the `chart_sync` target. [`init_default_tracing`] prints them
//! to stderr; hosts with a subscriber of their own only need a directive such
//! as `chart_sync=debug`.

/// Filter variable read before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "CHART_SYNC_LOG";

/// Directive used when neither variable is set.
pub const DEFAULT_LOG_DIRECTIVE: &str = "chart_sync=info";

/// Picks the filter directive: `CHART_SYNC_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_LOG_DIRECTIVE`]. Blank values count as unset.
#[must_use]
pub fn resolve_log_directive(crate_level: Option<String>, rust_log: Option<String>) -> String {
    [crate_level, rust_log]
        .into_iter()
        .flatten()
        .map(|directive| directive.trim().to_owned())
        .find(|directive| !directive.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_DIRECTIVE.to_owned())
}

/// Installs a compact stderr subscriber filtered by [`resolve_log_directive`].
///
/// Returns `false` without the `telemetry` feature, or when a global
/// subscriber is already installed.
#[cfg(feature = "telemetry")]
#[must_use]
pub fn init_default_tracing() -> bool {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let directive = resolve_log_directive(
        std::env::var(LOG_ENV_VAR).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(not(feature = "telemetry"))]
#[must_use]
pub fn init_default_tracing() -> bool {
    false
}
