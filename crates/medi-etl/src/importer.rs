//! Chunked import of validated rows into the store.
//!
//! Rows are written in chunks of `batch_size`, one transaction per chunk. A
//! chunk that hits a database error (or a duplicate under
//! [`DuplicatePolicy::Fail`]) is rolled back as a whole and recorded as a
//! [`ChunkFailure`]; later chunks still run. Counters from a rolled-back chunk
//! are discarded so the report always matches what was committed.
//!
//! A dry run wraps the whole import in one transaction with a savepoint per
//! chunk and rolls it back at the end, so its report matches a real run.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use medi_ingest::{CsvLoadOptions, file_info, load_csv};
use medi_model::{
    DuplicatePolicy, ImportOptions, MetricRecord, NewHealthMetric, RejectedRow, Violation,
};
use medi_store::{Store, StoreError, metrics, patients};
use medi_validate::{check_columns, validate_rows};

use crate::error::{EtlError, Result};

/// A chunk whose transaction was rolled back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    /// 0-based chunk number.
    pub index: usize,
    pub first_line: usize,
    pub last_line: usize,
    pub reason: String,
}

/// A valid row that could not be written, e.g. an unknown patient without
/// demographics. The rest of its chunk is unaffected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportCounts {
    pub patients_created: usize,
    pub patients_updated: usize,
    pub metrics_inserted: usize,
    pub metrics_updated: usize,
    pub metrics_skipped: usize,
}

impl ImportCounts {
    fn absorb(&mut self, other: &ImportCounts) {
        self.patients_created += other.patients_created;
        self.patients_updated += other.patients_updated;
        self.metrics_inserted += other.metrics_inserted;
        self.metrics_updated += other.metrics_updated;
        self.metrics_skipped += other.metrics_skipped;
    }
}

/// Everything that happened during one import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub source: Option<PathBuf>,
    pub dry_run: bool,
    pub duplicates: DuplicatePolicy,
    /// Timestamp used for rows without one.
    pub observed_at: Option<NaiveDateTime>,
    pub total_rows: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
    /// Header-level warnings (duplicate columns and the like).
    pub column_issues: Vec<Violation>,
    pub row_errors: Vec<RowError>,
    pub chunks: usize,
    pub chunk_failures: Vec<ChunkFailure>,
    #[serde(flatten)]
    pub counts: ImportCounts,
}

impl ImportReport {
    /// True when any row was rejected or failed, or any chunk rolled back.
    pub fn has_failures(&self) -> bool {
        !self.rejected.is_empty() || !self.row_errors.is_empty() || !self.chunk_failures.is_empty()
    }
}

/// Progress after each chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportProgress {
    pub processed: usize,
    pub total: usize,
    pub message: String,
}

type ProgressFn<'a> = Box<dyn FnMut(&ImportProgress) + 'a>;

pub struct Importer<'a> {
    store: &'a mut Store,
    options: ImportOptions,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a mut Store, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: impl FnMut(&ImportProgress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Load, validate and import one file.
    pub fn import_file(&mut self, path: &Path, load: &CsvLoadOptions) -> Result<ImportReport> {
        let span = info_span!("import", path = %path.display());
        let _guard = span.enter();

        let loaded = load_csv(path, load)?;
        let column_issues = check_columns(&loaded.headers);
        if loaded.known_fields().is_empty() {
            return Err(EtlError::NoRecognisedColumns {
                path: path.to_path_buf(),
            });
        }
        for issue in &column_issues {
            warn!(code = %issue.code, "{}", issue.message);
        }

        let observed_at = match self.options.observed_at {
            Some(ts) => ts,
            None => file_info(path)?.modified.unwrap_or_else(now),
        };

        let outcome = validate_rows(&loaded.rows);
        let mut report = self.import_records(outcome.accepted, observed_at)?;
        report.source = Some(path.to_path_buf());
        report.total_rows = loaded.rows.len();
        report.rejected = outcome.rejected;
        report.column_issues = column_issues;
        info!(
            total = report.total_rows,
            accepted = report.accepted,
            rejected = report.rejected.len(),
            inserted = report.counts.metrics_inserted,
            updated = report.counts.metrics_updated,
            skipped = report.counts.metrics_skipped,
            failed_chunks = report.chunk_failures.len(),
            "import complete"
        );
        Ok(report)
    }

    /// Import already-validated records. Rows without a timestamp get `observed_at`.
    pub fn import_records(
        &mut self,
        records: Vec<MetricRecord>,
        observed_at: NaiveDateTime,
    ) -> Result<ImportReport> {
        let batch_size = self.options.effective_batch_size();
        let total = records.len();
        let chunk_count = total.div_ceil(batch_size);
        let mut report = ImportReport {
            dry_run: self.options.dry_run,
            duplicates: self.options.duplicates,
            observed_at: Some(observed_at),
            total_rows: total,
            accepted: total,
            chunks: chunk_count,
            ..ImportReport::default()
        };

        let policy = self.options.duplicates;
        let progress = &mut self.progress;
        if self.options.dry_run {
            // Chunks see each other's writes; nothing survives the final rollback.
            let mut tx = self.store.transaction()?;
            run_chunks(&records, batch_size, &mut report, progress, |chunk| {
                let savepoint = tx.savepoint()?;
                let written = write_chunk(&savepoint, chunk, observed_at, policy)?;
                savepoint.commit()?;
                Ok(written)
            });
            tx.rollback().map_err(StoreError::from)?;
        } else {
            let store = &mut *self.store;
            run_chunks(&records, batch_size, &mut report, progress, |chunk| {
                let tx = store.transaction()?;
                let written = write_chunk(&tx, chunk, observed_at, policy)?;
                tx.commit()?;
                Ok(written)
            });
        }
        Ok(report)
    }
}

type ChunkResult = std::result::Result<(ImportCounts, Vec<RowError>), StoreError>;

fn run_chunks(
    records: &[MetricRecord],
    batch_size: usize,
    report: &mut ImportReport,
    progress: &mut Option<ProgressFn<'_>>,
    mut write: impl FnMut(&[MetricRecord]) -> ChunkResult,
) {
    let total = records.len();
    let chunk_count = report.chunks;
    let mut processed = 0;
    for (index, chunk) in records.chunks(batch_size).enumerate() {
        let first_line = chunk.first().map_or(0, |r| r.line);
        let last_line = chunk.last().map_or(0, |r| r.line);

        match write(chunk) {
            Ok((counts, row_errors)) => {
                report.counts.absorb(&counts);
                report.row_errors.extend(row_errors);
                debug!(chunk = index, rows = chunk.len(), "chunk committed");
            }
            Err(err) => {
                warn!(chunk = index, first_line, last_line, error = %err, "chunk rolled back");
                report.chunk_failures.push(ChunkFailure {
                    index,
                    first_line,
                    last_line,
                    reason: err.to_string(),
                });
            }
        }

        processed += chunk.len();
        if let Some(progress) = progress.as_mut() {
            progress(&ImportProgress {
                processed,
                total,
                message: format!("Processed chunk {}/{chunk_count}", index + 1),
            });
        }
    }
}

/// Write one chunk through `conn`; the caller owns commit or rollback.
fn write_chunk(
    conn: &Connection,
    chunk: &[MetricRecord],
    observed_at: NaiveDateTime,
    policy: DuplicatePolicy,
) -> ChunkResult {
    let mut counts = ImportCounts::default();
    let mut row_errors = Vec::new();
    for record in chunk {
        match write_record(conn, record, observed_at, policy, &mut counts)? {
            RowOutcome::Written => {}
            RowOutcome::Unresolved(reason) => row_errors.push(RowError {
                line: record.line,
                reason,
            }),
        }
    }
    Ok((counts, row_errors))
}

enum RowOutcome {
    Written,
    Unresolved(String),
}

fn write_record(
    conn: &Connection,
    record: &MetricRecord,
    observed_at: NaiveDateTime,
    policy: DuplicatePolicy,
    counts: &mut ImportCounts,
) -> std::result::Result<RowOutcome, StoreError> {
    let patient_id = match resolve_patient(conn, record, policy, counts)? {
        Ok(id) => id,
        Err(reason) => return Ok(RowOutcome::Unresolved(reason)),
    };
    let timestamp = record.timestamp.unwrap_or(observed_at);

    match metrics::find_id(conn, patient_id, &timestamp)? {
        Some(metric_id) => match policy {
            DuplicatePolicy::Skip => counts.metrics_skipped += 1,
            DuplicatePolicy::Update => {
                metrics::update_measurements(conn, metric_id, &record.measurements)?;
                counts.metrics_updated += 1;
            }
            DuplicatePolicy::Fail => {
                return Err(StoreError::DuplicateMetric {
                    patient_id,
                    timestamp,
                });
            }
        },
        None => {
            metrics::insert(
                conn,
                &NewHealthMetric {
                    patient_id,
                    timestamp,
                    measurements: record.measurements.clone(),
                },
            )?;
            counts.metrics_inserted += 1;
        }
    }
    Ok(RowOutcome::Written)
}

/// Find or create the patient a row belongs to.
///
/// The inner `Err` is a row-level problem (the row cannot be attributed to a
/// patient); the outer one is a database failure that aborts the chunk.
fn resolve_patient(
    conn: &Connection,
    record: &MetricRecord,
    policy: DuplicatePolicy,
    counts: &mut ImportCounts,
) -> std::result::Result<std::result::Result<i64, String>, StoreError> {
    let demographics = &record.demographics;
    if let Some(id) = record.patient_id {
        if let Some(existing) = patients::get(conn, id)? {
            if policy == DuplicatePolicy::Update
                && let Some(update) = demographics.to_new_patient(Some(id))
                && existing.demographics() != *demographics
            {
                patients::update(conn, id, &update)?;
                counts.patients_updated += 1;
            }
            return Ok(Ok(id));
        }
        return match demographics.to_new_patient(Some(id)) {
            Some(new) => {
                patients::insert(conn, &new)?;
                counts.patients_created += 1;
                Ok(Ok(id))
            }
            None => Ok(Err(format!(
                "patient {id} does not exist and the row lacks complete demographics"
            ))),
        };
    }

    if let Some(id) = patients::find_by_demographics(conn, demographics)? {
        return Ok(Ok(id));
    }
    match demographics.to_new_patient(None) {
        Some(new) => {
            let id = patients::insert(conn, &new)?;
            counts.patients_created += 1;
            Ok(Ok(id))
        }
        None => Ok(Err(
            "row has no patient id and incomplete demographics".to_string(),
        )),
    }
}

fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
