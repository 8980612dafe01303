//! Ingestion error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file is empty: {path}")]
    Empty { path: PathBuf },

    #[error("malformed delimited text in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("could not determine amplitude column (available: {})", available.join(", "))]
    NoAmplitudeColumn { available: Vec<String> },

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("invalid sampling rate: {0}")]
    InvalidSamplingRate(f64),
}

impl IngestError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path };
        }
        Self::Io {
            operation,
            path,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
