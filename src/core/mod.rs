pub mod config;
pub mod dataset;

pub use config::{
    CallbackToken, ChartConfiguration, ChartSize, ConfigValue, HEIGHT_KEY, RenderCallback,
    SERIES_KEY, WIDTH_KEY, canonical_zero,
};
pub use dataset::AlignedDataset;
