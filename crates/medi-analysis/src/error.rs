//! Analysis error types.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("window size must be at least 1")]
    InvalidWindow,

    #[error("input sequences differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("insufficient valid data points: need at least {needed}, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("input is constant, correlation is undefined")]
    ConstantInput,

    #[error("need at least 2 metrics for a correlation matrix, found {0}")]
    NotEnoughColumns(usize),

    #[error("metric not found: {0}")]
    UnknownColumn(String),

    #[error("unknown {kind}: {value}")]
    UnknownMethod { kind: &'static str, value: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
