//! Optional hook modules live here.
//!
//! Keep extensions observational and avoid coupling them into core paths.

pub mod observers;

pub use observers::{ChartObserver, LifecycleContext, LifecycleEvent};
