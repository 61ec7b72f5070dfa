mod null_chart;

use std::fmt::Debug;

pub use null_chart::{ChartCall, ChartJournal, NullChart, NullChartFactory};

use crate::core::{AlignedDataset, ChartConfiguration, ChartSize};
use crate::error::ChartResult;

/// Contract implemented by a live chart-engine instance.
///
/// Reconciliation verdicts map onto these calls: `Keep` makes none, `Update`
/// calls `set_size`, `Create` calls `destroy` and builds a new handle through
/// the [`ChartFactory`].
pub trait ChartHandle {
    fn set_size(&mut self, size: ChartSize) -> ChartResult<()>;
    fn set_data(&mut self, data: &AlignedDataset) -> ChartResult<()>;
    fn destroy(self);
}

/// Builds chart handles mounted on a host-defined target.
pub trait ChartFactory {
    type Handle: ChartHandle;
    type Target: Clone + PartialEq + Debug;

    fn create(
        &mut self,
        config: &ChartConfiguration,
        data: &AlignedDataset,
        target: &Self::Target,
    ) -> ChartResult<Self::Handle>;
}
