//! Configuration options for the import pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::enums::DuplicatePolicy;

/// Default number of rows per import transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options controlling how validated rows are written to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Rows per transaction. Values below 1 are treated as 1.
    pub batch_size: usize,
    /// Behaviour when (patient_id, timestamp) already exists.
    pub duplicates: DuplicatePolicy,
    /// Timestamp applied to rows without one.
    ///
    /// When `None` the importer uses the source file's modification time so
    /// that re-importing an unchanged file resolves to the same keys.
    pub observed_at: Option<NaiveDateTime>,
    /// Validate and resolve patients without writing anything.
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            duplicates: DuplicatePolicy::default(),
            observed_at: None,
            dry_run: false,
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn with_observed_at(mut self, observed_at: NaiveDateTime) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Batch size clamped to at least one row.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}
