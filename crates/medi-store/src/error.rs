//! Store error types.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or created.
    #[error("failed to open database: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("patient {0} not found")]
    PatientNotFound(i64),

    #[error("signal {0} not found")]
    SignalNotFound(i64),

    /// A metric already exists at this (patient, timestamp) key.
    #[error("metric for patient {patient_id} at {timestamp} already exists")]
    DuplicateMetric {
        patient_id: i64,
        timestamp: NaiveDateTime,
    },

    /// An insert referenced a row that does not exist.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// True when the underlying SQLite error is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::DuplicateMetric { .. } | Self::ForeignKey(_) => true,
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::ConstraintViolation)
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
