//! Signal processing error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("signal is empty")]
    Empty,

    #[error("invalid sampling rate: {0}")]
    InvalidSamplingRate(f64),

    #[error("{what} must be at least {min}, got {got}")]
    InvalidSize {
        what: &'static str,
        min: usize,
        got: usize,
    },

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("unknown {kind}: {value}")]
    UnknownMethod { kind: &'static str, value: String },

    #[error("failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, SignalError>;

pub(crate) fn check_rate(sampling_rate: f64) -> Result<()> {
    if sampling_rate > 0.0 && sampling_rate.is_finite() {
        Ok(())
    } else {
        Err(SignalError::InvalidSamplingRate(sampling_rate))
    }
}
