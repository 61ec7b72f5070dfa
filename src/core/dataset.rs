use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

/// Multiple numeric series sharing one implicit x-axis.
///
/// `series[0]` is conventionally the x values. Missing samples are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlignedDataset {
    series: Vec<Vec<Option<f64>>>,
}

impl AlignedDataset {
    #[must_use]
    pub fn new(series: Vec<Vec<Option<f64>>>) -> Self {
        Self { series }
    }

    /// Builds a dataset without missing samples.
    #[must_use]
    pub fn from_dense(series: Vec<Vec<f64>>) -> Self {
        Self {
            series: series
                .into_iter()
                .map(|values| values.into_iter().map(Some).collect())
                .collect(),
        }
    }

    #[must_use]
    pub fn series(&self) -> &[Vec<Option<f64>>] {
        &self.series
    }

    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Shared point count, taken from the first series.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.series.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn push_series(&mut self, values: Vec<Option<f64>>) {
        self.series.push(values);
    }

    /// Checks the alignment invariant before the dataset reaches a chart.
    ///
    /// Comparison code never calls this; hosts run it once per incoming dataset.
    pub fn validate(&self) -> ChartResult<()> {
        let Some(first) = self.series.first() else {
            return Err(ChartError::InvalidData("dataset has no series".to_owned()));
        };
        if first.is_empty() {
            return Err(ChartError::InvalidData(
                "dataset has no data points".to_owned(),
            ));
        }

        let expected = first.len();
        for (index, values) in self.series.iter().enumerate().skip(1) {
            if values.len() != expected {
                return Err(ChartError::InvalidData(format!(
                    "series {index} length mismatch: expected {expected}, got {}",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Vec<f64>>> for AlignedDataset {
    fn from(series: Vec<Vec<f64>>) -> Self {
        Self::from_dense(series)
    }
}
