use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction};
use tracing::info;

use medi_model::{
    BiomedicalSignal, CorrelationResult, HealthMetric, MedicalImage, NewBiomedicalSignal,
    NewCorrelationResult, NewHealthMetric, NewMedicalImage, NewPatient, NewSpectrumAnalysis,
    Patient, SpectrumAnalysis,
};

use crate::error::{Result, StoreError};
use crate::query::{self, MetricFilter, PatientFilter, PatientWithMetrics, SummaryStatistics};
use crate::{correlations, images, metrics, patients, schema, signals};

/// Owner of the single SQLite connection.
///
/// The repository modules take a `&Connection` so the same calls work inside a
/// [`Transaction`]; `Store` wraps them for the common non-transactional case.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (creating if needed) a database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "database opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        schema::configure(&conn)?;
        schema::init(&conn)?;
        Ok(Self { conn, path })
    }

    /// `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction; dropped without `commit` it rolls back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        schema::table_counts(&self.conn)
    }

    // Patients

    pub fn insert_patient(&self, patient: &NewPatient) -> Result<i64> {
        patients::insert(&self.conn, patient)
    }

    pub fn patient(&self, patient_id: i64) -> Result<Option<Patient>> {
        patients::get(&self.conn, patient_id)
    }

    pub fn update_patient(&self, patient_id: i64, patient: &NewPatient) -> Result<()> {
        patients::update(&self.conn, patient_id, patient)
    }

    pub fn delete_patient(&self, patient_id: i64) -> Result<()> {
        patients::delete(&self.conn, patient_id)
    }

    pub fn patients(&self, filter: &PatientFilter) -> Result<Vec<Patient>> {
        query::list_patients(&self.conn, filter)
    }

    pub fn patient_with_metrics(&self, patient_id: i64) -> Result<Option<PatientWithMetrics>> {
        query::patient_with_metrics(&self.conn, patient_id)
    }

    // Metrics

    pub fn insert_metric(&self, metric: &NewHealthMetric) -> Result<i64> {
        metrics::insert(&self.conn, metric)
    }

    pub fn metric(&self, metric_id: i64) -> Result<Option<HealthMetric>> {
        metrics::get(&self.conn, metric_id)
    }

    pub fn delete_metric(&self, metric_id: i64) -> Result<bool> {
        metrics::delete(&self.conn, metric_id)
    }

    pub fn metrics(&self, filter: &MetricFilter) -> Result<Vec<HealthMetric>> {
        query::list_metrics(&self.conn, filter)
    }

    pub fn summary_statistics(&self, patient_ids: &[i64]) -> Result<SummaryStatistics> {
        query::summary_statistics(&self.conn, patient_ids)
    }

    // Images

    pub fn insert_image(&self, image: &NewMedicalImage) -> Result<i64> {
        images::insert(&self.conn, image)
    }

    pub fn image(&self, image_id: i64) -> Result<Option<MedicalImage>> {
        images::get(&self.conn, image_id)
    }

    pub fn images(&self, patient_id: Option<i64>) -> Result<Vec<MedicalImage>> {
        images::list(&self.conn, patient_id)
    }

    pub fn delete_image(&self, image_id: i64) -> Result<bool> {
        images::delete(&self.conn, image_id)
    }

    // Signals and spectra

    pub fn insert_signal(&self, signal: &NewBiomedicalSignal) -> Result<i64> {
        signals::insert_signal(&self.conn, signal)
    }

    pub fn signal(&self, signal_id: i64) -> Result<Option<BiomedicalSignal>> {
        signals::get_signal(&self.conn, signal_id)
    }

    pub fn signals(
        &self,
        patient_id: Option<i64>,
        signal_type: Option<&str>,
    ) -> Result<Vec<BiomedicalSignal>> {
        signals::list_signals(&self.conn, patient_id, signal_type)
    }

    pub fn delete_signal(&self, signal_id: i64) -> Result<()> {
        signals::delete_signal(&self.conn, signal_id)
    }

    pub fn insert_spectrum_analysis(&self, analysis: &NewSpectrumAnalysis) -> Result<i64> {
        signals::insert_analysis(&self.conn, analysis)
    }

    pub fn spectrum_analyses(&self, signal_id: i64) -> Result<Vec<SpectrumAnalysis>> {
        signals::analyses_for_signal(&self.conn, signal_id)
    }

    // Correlations

    pub fn insert_correlation(&self, result: &NewCorrelationResult) -> Result<i64> {
        correlations::insert(&self.conn, result)
    }

    pub fn correlations(&self, pair: Option<(&str, &str)>) -> Result<Vec<CorrelationResult>> {
        correlations::list(&self.conn, pair)
    }
}
