//! Filtered retrieval and summary statistics.

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use tracing::debug;

use medi_model::{Gender, HealthMetric, Patient};

use crate::error::Result;
use crate::sql::{format_ts, placeholders};
use crate::{metrics, patients};

const BMI_SQL: &str = "(weight / ((height / 100.0) * (height / 100.0)))";

/// Patient selection. Empty/`None` fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub ids: Vec<i64>,
    pub gender: Option<Gender>,
    /// Days, inclusive.
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub min_bmi: Option<f64>,
    pub max_bmi: Option<f64>,
    pub limit: Option<usize>,
}

/// Metric selection. Results are ordered by timestamp, newest first.
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    pub patient_ids: Vec<i64>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub min_systolic: Option<i64>,
    pub max_systolic: Option<i64>,
    pub min_diastolic: Option<i64>,
    pub max_diastolic: Option<i64>,
    pub cardiovascular_disease: Option<bool>,
    pub limit: Option<usize>,
}

/// Accumulates `WHERE` clauses and their bound values.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: impl Into<String>, value: impl Into<Value>) {
        self.clauses.push(clause.into());
        self.values.push(value.into());
    }

    fn push_in(&mut self, column: &str, ids: &[i64]) {
        if ids.is_empty() {
            return;
        }
        self.clauses
            .push(format!("{column} IN ({})", placeholders(ids.len())));
        self.values.extend(ids.iter().map(|id| Value::Integer(*id)));
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn limit_sql(limit: Option<usize>) -> String {
    limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default()
}

pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>> {
    let mut conditions = Conditions::default();
    conditions.push_in("patient_id", &filter.ids);
    if let Some(gender) = filter.gender {
        conditions.push("gender = ?", gender.code());
    }
    if let Some(min) = filter.min_age {
        conditions.push("age >= ?", min);
    }
    if let Some(max) = filter.max_age {
        conditions.push("age <= ?", max);
    }
    if let Some(min) = filter.min_bmi {
        conditions.push(format!("{BMI_SQL} >= ?"), min);
    }
    if let Some(max) = filter.max_bmi {
        conditions.push(format!("{BMI_SQL} <= ?"), max);
    }
    let sql = format!(
        "SELECT {} FROM patients{} ORDER BY patient_id{}",
        patients::COLUMNS,
        conditions.where_sql(),
        limit_sql(filter.limit)
    );
    debug!(%sql, "listing patients");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.values), patients::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_metrics(conn: &Connection, filter: &MetricFilter) -> Result<Vec<HealthMetric>> {
    let mut conditions = Conditions::default();
    conditions.push_in("patient_id", &filter.patient_ids);
    if let Some(start) = filter.start {
        conditions.push("timestamp >= ?", format_ts(&start));
    }
    if let Some(end) = filter.end {
        conditions.push("timestamp <= ?", format_ts(&end));
    }
    if let Some(min) = filter.min_systolic {
        conditions.push("systolic_bp >= ?", min);
    }
    if let Some(max) = filter.max_systolic {
        conditions.push("systolic_bp <= ?", max);
    }
    if let Some(min) = filter.min_diastolic {
        conditions.push("diastolic_bp >= ?", min);
    }
    if let Some(max) = filter.max_diastolic {
        conditions.push("diastolic_bp <= ?", max);
    }
    if let Some(flag) = filter.cardiovascular_disease {
        conditions.push("cardiovascular_disease = ?", i64::from(flag));
    }
    let sql = format!(
        "SELECT {} FROM health_metrics{} ORDER BY timestamp DESC, metric_id DESC{}",
        metrics::COLUMNS,
        conditions.where_sql(),
        limit_sql(filter.limit)
    );
    debug!(%sql, "listing metrics");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.values), metrics::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// A patient together with all of their metrics.
#[derive(Debug, Clone, Serialize)]
pub struct PatientWithMetrics {
    pub patient: Patient,
    /// Oldest first.
    pub metrics: Vec<HealthMetric>,
}

pub fn patient_with_metrics(conn: &Connection, patient_id: i64) -> Result<Option<PatientWithMetrics>> {
    let Some(patient) = patients::get(conn, patient_id)? else {
        return Ok(None);
    };
    let metrics = metrics::for_patient(conn, patient_id)?;
    Ok(Some(PatientWithMetrics { patient, metrics }))
}

/// Counts and averages over patients and their metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub total_patients: i64,
    pub avg_age_days: Option<f64>,
    pub avg_height: Option<f64>,
    pub avg_weight: Option<f64>,
    pub total_health_metrics: i64,
    pub avg_systolic_bp: Option<f64>,
    pub avg_diastolic_bp: Option<f64>,
    pub avg_heart_rate: Option<f64>,
}

/// Summary over the given patients, or over everyone when `patient_ids` is empty.
pub fn summary_statistics(conn: &Connection, patient_ids: &[i64]) -> Result<SummaryStatistics> {
    let mut conditions = Conditions::default();
    conditions.push_in("patient_id", patient_ids);
    let where_sql = conditions.where_sql();

    let (total_patients, avg_age_days, avg_height, avg_weight) = conn.query_row(
        &format!("SELECT COUNT(*), AVG(age), AVG(height), AVG(weight) FROM patients{where_sql}"),
        params_from_iter(conditions.values.iter()),
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    // AVG ignores NULLs, so missing measurements do not drag the averages down.
    let (total_health_metrics, avg_systolic_bp, avg_diastolic_bp, avg_heart_rate) = conn.query_row(
        &format!(
            "SELECT COUNT(*), AVG(systolic_bp), AVG(diastolic_bp), AVG(heart_rate)
             FROM health_metrics{where_sql}"
        ),
        params_from_iter(conditions.values.iter()),
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    Ok(SummaryStatistics {
        total_patients,
        avg_age_days,
        avg_height,
        avg_weight,
        total_health_metrics,
        avg_systolic_bp,
        avg_diastolic_bp,
        avg_heart_rate,
    })
}
