//! Health-metric repository.

use chrono::NaiveDateTime;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use medi_model::{HealthMetric, Measurements, NewHealthMetric};

use crate::error::{Result, StoreError};
use crate::sql::{self, format_ts};

pub(crate) const COLUMNS: &str = "metric_id, patient_id, timestamp, systolic_bp, diastolic_bp, \
     heart_rate, body_temperature, oxygen_saturation, cholesterol, glucose, smoking, \
     alcohol_intake, physical_activity, cardiovascular_disease, created_at";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<HealthMetric> {
    Ok(HealthMetric {
        metric_id: row.get(0)?,
        patient_id: row.get(1)?,
        timestamp: sql::timestamp(row, 2)?,
        measurements: Measurements {
            systolic_bp: row.get(3)?,
            diastolic_bp: row.get(4)?,
            heart_rate: row.get(5)?,
            body_temperature: row.get(6)?,
            oxygen_saturation: row.get(7)?,
            cholesterol: row.get(8)?,
            glucose: row.get(9)?,
            smoking: row.get(10)?,
            alcohol_intake: row.get(11)?,
            physical_activity: row.get(12)?,
            cardiovascular_disease: row.get(13)?,
        },
        created_at: sql::timestamp(row, 14)?,
    })
}

/// Insert a metric. A clash on (patient, timestamp) is reported as
/// [`StoreError::DuplicateMetric`], a missing patient as [`StoreError::ForeignKey`].
pub fn insert(conn: &Connection, metric: &NewHealthMetric) -> Result<i64> {
    let m = &metric.measurements;
    let result = conn.execute(
        "INSERT INTO health_metrics (patient_id, timestamp, systolic_bp, diastolic_bp, heart_rate,
             body_temperature, oxygen_saturation, cholesterol, glucose, smoking, alcohol_intake,
             physical_activity, cardiovascular_disease, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            metric.patient_id,
            format_ts(&metric.timestamp),
            m.systolic_bp,
            m.diastolic_bp,
            m.heart_rate,
            m.body_temperature,
            m.oxygen_saturation,
            m.cholesterol,
            m.glucose,
            m.smoking,
            m.alcohol_intake,
            m.physical_activity,
            m.cardiovascular_disease,
            format_ts(&sql::now()),
        ],
    );
    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, msg)) if err.code == ErrorCode::ConstraintViolation => {
            let msg = msg.unwrap_or_default();
            if msg.contains("UNIQUE") {
                Err(StoreError::DuplicateMetric {
                    patient_id: metric.patient_id,
                    timestamp: metric.timestamp,
                })
            } else if msg.contains("FOREIGN KEY") {
                Err(StoreError::ForeignKey(format!(
                    "patient {} does not exist",
                    metric.patient_id
                )))
            } else {
                Err(rusqlite::Error::SqliteFailure(err, Some(msg)).into())
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Id of the metric stored at the natural key, if any.
pub fn find_id(conn: &Connection, patient_id: i64, timestamp: &NaiveDateTime) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT metric_id FROM health_metrics WHERE patient_id = ?1 AND timestamp = ?2",
            params![patient_id, format_ts(timestamp)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn get(conn: &Connection, metric_id: i64) -> Result<Option<HealthMetric>> {
    let metric = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM health_metrics WHERE metric_id = ?1"),
            params![metric_id],
            from_row,
        )
        .optional()?;
    Ok(metric)
}

/// Overwrite every measured value of an existing metric.
pub fn update_measurements(conn: &Connection, metric_id: i64, m: &Measurements) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE health_metrics
         SET systolic_bp = ?2, diastolic_bp = ?3, heart_rate = ?4, body_temperature = ?5,
             oxygen_saturation = ?6, cholesterol = ?7, glucose = ?8, smoking = ?9,
             alcohol_intake = ?10, physical_activity = ?11, cardiovascular_disease = ?12
         WHERE metric_id = ?1",
        params![
            metric_id,
            m.systolic_bp,
            m.diastolic_bp,
            m.heart_rate,
            m.body_temperature,
            m.oxygen_saturation,
            m.cholesterol,
            m.glucose,
            m.smoking,
            m.alcohol_intake,
            m.physical_activity,
            m.cardiovascular_disease,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, metric_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM health_metrics WHERE metric_id = ?1",
        params![metric_id],
    )?;
    Ok(changed > 0)
}

/// All metrics of one patient, oldest first.
pub fn for_patient(conn: &Connection, patient_id: i64) -> Result<Vec<HealthMetric>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM health_metrics WHERE patient_id = ?1 ORDER BY timestamp, metric_id"
    ))?;
    let rows = stmt
        .query_map(params![patient_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
