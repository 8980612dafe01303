//! CSV export of stored patients and metrics.
//!
//! The combined export uses the canonical column names the loader maps back
//! onto [`Field`]s, and floats are written in their shortest round-trip form,
//! so exporting and re-importing reproduces every stored value.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::{info, warn};

use medi_ingest::values::format_numeric;
use medi_model::{Field, HealthMetric, Measurements, Patient, TIMESTAMP_FORMAT};
use medi_store::{MetricFilter, PatientFilter, Store};

use crate::error::{EtlError, Result};

/// What an export wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
}

pub const PATIENT_HEADERS: [&str; 9] = [
    "patient_id",
    "name",
    "age",
    "gender",
    "height",
    "weight",
    "bmi",
    "created_at",
    "updated_at",
];

const MEASUREMENT_HEADERS: [Field; 11] = [
    Field::SystolicBp,
    Field::DiastolicBp,
    Field::HeartRate,
    Field::BodyTemperature,
    Field::OxygenSaturation,
    Field::Cholesterol,
    Field::Glucose,
    Field::Smoking,
    Field::AlcoholIntake,
    Field::PhysicalActivity,
    Field::CardiovascularDisease,
];

fn opt_int(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_float(value: Option<f64>) -> String {
    value.map(format_numeric).unwrap_or_default()
}

fn flag(value: bool) -> String {
    u8::from(value).to_string()
}

fn measurement_cells(m: &Measurements) -> Vec<String> {
    vec![
        opt_int(m.systolic_bp),
        opt_int(m.diastolic_bp),
        opt_int(m.heart_rate),
        opt_float(m.body_temperature),
        opt_float(m.oxygen_saturation),
        opt_int(m.cholesterol),
        opt_int(m.glucose),
        flag(m.smoking),
        flag(m.alcohol_intake),
        flag(m.physical_activity),
        m.cardiovascular_disease.map(flag).unwrap_or_default(),
    ]
}

fn patient_cells(patient: &Patient) -> Vec<String> {
    vec![
        patient.patient_id.to_string(),
        patient.name.clone().unwrap_or_default(),
        patient.age.to_string(),
        patient.gender.code().to_string(),
        format_numeric(patient.height),
        format_numeric(patient.weight),
    ]
}

struct CsvOut {
    path: PathBuf,
    writer: Writer<BufWriter<File>>,
}

impl CsvOut {
    fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| EtlError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| EtlError::Io {
            operation: "create",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Writer::from_writer(BufWriter::new(file)),
        })
    }

    fn row<I, S>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.writer
            .write_record(cells)
            .map_err(|source| EtlError::Csv {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(mut self, rows: usize) -> Result<ExportSummary> {
        self.writer.flush().map_err(|source| EtlError::Io {
            operation: "write",
            path: self.path.clone(),
            source,
        })?;
        if rows == 0 {
            warn!(path = %self.path.display(), "nothing matched, wrote header only");
        } else {
            info!(path = %self.path.display(), rows, "export written");
        }
        Ok(ExportSummary {
            path: self.path,
            rows,
        })
    }
}

/// Patients with their BMI.
pub fn export_patients(store: &Store, filter: &PatientFilter, path: &Path) -> Result<ExportSummary> {
    let patients = store.patients(filter)?;
    let mut out = CsvOut::create(path)?;
    out.row(PATIENT_HEADERS)?;
    for patient in &patients {
        let mut cells = patient_cells(patient);
        cells.push(format_numeric(patient.bmi()));
        cells.push(patient.created_at.format(TIMESTAMP_FORMAT).to_string());
        cells.push(patient.updated_at.format(TIMESTAMP_FORMAT).to_string());
        out.row(cells)?;
    }
    out.finish(patients.len())
}

/// Metric rows as stored, newest first.
pub fn export_metrics(store: &Store, filter: &MetricFilter, path: &Path) -> Result<ExportSummary> {
    let metrics = store.metrics(filter)?;
    let mut out = CsvOut::create(path)?;
    let mut headers = vec!["metric_id", "patient_id", "timestamp"];
    headers.extend(MEASUREMENT_HEADERS.iter().map(|f| f.name()));
    headers.push("created_at");
    out.row(headers)?;
    for metric in &metrics {
        let mut cells = vec![
            metric.metric_id.to_string(),
            metric.patient_id.to_string(),
            metric.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ];
        cells.extend(measurement_cells(&metric.measurements));
        cells.push(metric.created_at.format(TIMESTAMP_FORMAT).to_string());
        out.row(cells)?;
    }
    out.finish(metrics.len())
}

/// One row per metric carrying its patient's demographics, in importable form.
///
/// Patients are selected by `patients`, metrics by `metrics`; a metric is
/// written only when its patient is selected too. Rows are ordered by patient
/// then timestamp.
pub fn export_combined(
    store: &Store,
    patients: &PatientFilter,
    metrics: &MetricFilter,
    path: &Path,
) -> Result<ExportSummary> {
    let by_id: BTreeMap<i64, Patient> = store
        .patients(patients)?
        .into_iter()
        .map(|p| (p.patient_id, p))
        .collect();
    let mut rows: Vec<HealthMetric> = store
        .metrics(metrics)?
        .into_iter()
        .filter(|m| by_id.contains_key(&m.patient_id))
        .collect();
    rows.sort_by(|a, b| {
        (a.patient_id, a.timestamp, a.metric_id).cmp(&(b.patient_id, b.timestamp, b.metric_id))
    });

    let mut out = CsvOut::create(path)?;
    let mut headers: Vec<&str> = [
        Field::PatientId,
        Field::Name,
        Field::Age,
        Field::Gender,
        Field::Height,
        Field::Weight,
        Field::Timestamp,
    ]
    .iter()
    .map(|f| f.name())
    .collect();
    headers.extend(MEASUREMENT_HEADERS.iter().map(|f| f.name()));
    out.row(headers)?;

    let mut written = 0;
    for metric in &rows {
        let Some(patient) = by_id.get(&metric.patient_id) else {
            continue;
        };
        let mut cells = patient_cells(patient);
        cells.push(metric.timestamp.format(TIMESTAMP_FORMAT).to_string());
        cells.extend(measurement_cells(&metric.measurements));
        out.row(cells)?;
        written += 1;
    }
    out.finish(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_cells_leave_missing_values_blank() {
        let cells = measurement_cells(&Measurements {
            systolic_bp: Some(120),
            body_temperature: Some(36.6),
            smoking: true,
            ..Measurements::default()
        });
        assert_eq!(
            cells,
            vec!["120", "", "", "36.6", "", "", "", "1", "0", "0", ""]
        );
    }

    #[test]
    fn combined_headers_map_back_to_fields() {
        for field in MEASUREMENT_HEADERS {
            assert_eq!(Field::from_header(field.name()), Some(field));
        }
    }
}
