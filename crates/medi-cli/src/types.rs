use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;

use medi_analysis::{CorrelationMatrix, MetricCorrelation, SeriesReport};
use medi_ingest::{SignalMetadata, TextEncoding};
use medi_model::{RejectedRow, Violation, ViolationCode};
use medi_signal::SpectrumReport;

#[derive(Debug, Serialize)]
pub struct InitDbResult {
    pub database: PathBuf,
    pub tables: Vec<TableCount>,
}

#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub source: PathBuf,
    pub delimiter: String,
    pub encoding: TextEncoding,
    pub total_rows: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
    pub column_issues: Vec<Violation>,
    pub violation_counts: Vec<ViolationCount>,
}

impl ValidationReport {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct ViolationCount {
    pub code: ViolationCode,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedPatient {
    pub patient_id: i64,
    pub metrics: usize,
    pub images: usize,
    pub signals: usize,
}

#[derive(Debug, Serialize)]
pub struct CorrelateResult {
    #[serde(flatten)]
    pub correlation: MetricCorrelation,
    /// Stored record id when `--save` was given.
    pub correlation_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MatrixResult {
    pub rows: usize,
    pub matrix: CorrelationMatrix,
    pub min_abs: f64,
    pub strong_pairs: Vec<MetricCorrelation>,
}

#[derive(Debug, Serialize)]
pub struct TrendResult {
    #[serde(flatten)]
    pub report: SeriesReport,
    pub filter_steps: usize,
    pub resampled: Option<Vec<ResampledPoint>>,
    /// Percent change over `rate_period` points, aligned with the series.
    pub rate_of_change: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Serialize)]
pub struct ResampledPoint {
    pub bucket: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct SpectrumResult {
    pub source: PathBuf,
    pub signal_id: Option<i64>,
    pub method: &'static str,
    #[serde(flatten)]
    pub report: SpectrumReport,
    pub spectrum_file: Option<PathBuf>,
    pub analysis_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredSignal {
    pub signal_id: i64,
    pub signal_type: String,
    pub metadata: SignalMetadata,
}

#[derive(Debug, Serialize)]
pub struct GeneratedSignal {
    pub path: PathBuf,
    pub kind: &'static str,
    pub samples: usize,
    pub sampling_rate: f64,
    pub duration: f64,
}
