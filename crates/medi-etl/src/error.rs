use std::path::PathBuf;

use thiserror::Error;

use medi_ingest::IngestError;
use medi_store::StoreError;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write csv: {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The header row has no column the importer understands.
    #[error("no recognised health-metric columns in {path}")]
    NoRecognisedColumns { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, EtlError>;
