use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{AlignedDataset, ChartConfiguration, ChartSize};
use crate::engine::{ChartFactory, ChartHandle};
use crate::error::{ChartError, ChartResult};

/// One call observed by the null chart engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartCall {
    Create {
        handle_id: u64,
        target: String,
        size: Option<ChartSize>,
        series_count: usize,
    },
    SetSize {
        handle_id: u64,
        size: ChartSize,
    },
    SetData {
        handle_id: u64,
        series_count: usize,
        point_count: usize,
    },
    Destroy {
        handle_id: u64,
    },
}

/// Shared, append-only log of engine calls.
#[derive(Debug, Clone, Default)]
pub struct ChartJournal {
    calls: Rc<RefCell<Vec<ChartCall>>>,
}

impl ChartJournal {
    #[must_use]
    pub fn calls(&self) -> Vec<ChartCall> {
        self.calls.borrow().clone()
    }

    /// Returns and forgets every call recorded so far.
    pub fn take(&self) -> Vec<ChartCall> {
        self.calls.borrow_mut().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    fn record(&self, call: ChartCall) {
        self.calls.borrow_mut().push(call);
    }
}

/// Headless chart engine used by tests and dry runs.
///
/// It still validates sizes so tests can catch invalid geometry before a real
/// engine is plugged in.
#[derive(Debug, Default)]
pub struct NullChartFactory {
    journal: ChartJournal,
    next_handle_id: u64,
    pending_failure: Option<String>,
    reject_updates: bool,
}

impl NullChartFactory {
    #[must_use]
    pub fn new(journal: ChartJournal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn journal(&self) -> ChartJournal {
        self.journal.clone()
    }

    /// Makes the next `create` fail with `reason`.
    pub fn fail_next_create(&mut self, reason: impl Into<String>) {
        self.pending_failure = Some(reason.into());
    }

    /// Handles created from now on reject `set_size`/`set_data`.
    pub fn reject_updates(&mut self, reject: bool) {
        self.reject_updates = reject;
    }
}

impl ChartFactory for NullChartFactory {
    type Handle = NullChart;
    type Target = String;

    fn create(
        &mut self,
        config: &ChartConfiguration,
        data: &AlignedDataset,
        target: &Self::Target,
    ) -> ChartResult<Self::Handle> {
        if let Some(reason) = self.pending_failure.take() {
            return Err(ChartError::ChartCreation { reason });
        }
        if let Some(size) = config.size() {
            validate_size(size)?;
        }

        self.next_handle_id += 1;
        let handle_id = self.next_handle_id;
        self.journal.record(ChartCall::Create {
            handle_id,
            target: target.clone(),
            size: config.size(),
            series_count: data.series_count(),
        });
        Ok(NullChart {
            handle_id,
            journal: self.journal.clone(),
            reject_updates: self.reject_updates,
        })
    }
}

#[derive(Debug)]
pub struct NullChart {
    handle_id: u64,
    journal: ChartJournal,
    reject_updates: bool,
}

impl NullChart {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.handle_id
    }
}

impl ChartHandle for NullChart {
    fn set_size(&mut self, size: ChartSize) -> ChartResult<()> {
        if self.reject_updates {
            return Err(ChartError::ChartHandle {
                operation: "set_size",
                reason: "handle rejects updates".to_owned(),
            });
        }
        validate_size(size)?;
        self.journal.record(ChartCall::SetSize {
            handle_id: self.handle_id,
            size,
        });
        Ok(())
    }

    fn set_data(&mut self, data: &AlignedDataset) -> ChartResult<()> {
        if self.reject_updates {
            return Err(ChartError::ChartHandle {
                operation: "set_data",
                reason: "handle rejects updates".to_owned(),
            });
        }
        self.journal.record(ChartCall::SetData {
            handle_id: self.handle_id,
            series_count: data.series_count(),
            point_count: data.point_count(),
        });
        Ok(())
    }

    fn destroy(self) {
        self.journal.record(ChartCall::Destroy {
            handle_id: self.handle_id,
        });
    }
}

fn validate_size(size: ChartSize) -> ChartResult<()> {
    let valid = |value: f64| value.is_finite() && value >= 0.0;
    if valid(size.width) && valid(size.height) {
        Ok(())
    } else {
        Err(ChartError::ChartHandle {
            operation: "set_size",
            reason: format!("invalid size {}x{}", size.width, size.height),
        })
    }
}
