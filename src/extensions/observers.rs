use serde::{Deserialize, Serialize};

use crate::api::ReconciliationVerdict;
use crate::core::ChartSize;

/// Read-only state snapshot passed to observer hooks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifecycleContext {
    /// Number of handles created so far by this host.
    pub generation: u64,
    /// Verdict of the sync pass that produced the event, when options changed.
    pub verdict: Option<ReconciliationVerdict>,
    pub series_count: usize,
    pub point_count: usize,
}

/// Chart lifecycle events emitted by the sync driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Created,
    Destroyed,
    Resized { size: ChartSize },
    DataSwapped,
    CreationFailed,
}

/// Hook interface for host-side reactions to chart lifecycle changes.
///
/// Observers see events after the engine call completed and cannot mutate the
/// live handle.
pub trait ChartObserver {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: LifecycleEvent, context: LifecycleContext);
}
