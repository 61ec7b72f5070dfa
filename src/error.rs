use thiserror::Error;

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("chart creation failed: {reason}")]
    ChartCreation { reason: String },

    #[error("chart handle rejected `{operation}`: {reason}")]
    ChartHandle {
        operation: &'static str,
        reason: String,
    },
}
