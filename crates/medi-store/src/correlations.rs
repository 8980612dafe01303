//! Stored correlation coefficients.

use rusqlite::{Connection, Row, params};

use medi_model::{CorrelationResult, NewCorrelationResult};

use crate::error::Result;
use crate::sql::{self, format_ts};

const COLUMNS: &str = "correlation_id, metric1, metric2, correlation_value, correlation_type, \
     sample_size, p_value, timestamp, notes";

fn from_row(row: &Row<'_>) -> rusqlite::Result<CorrelationResult> {
    Ok(CorrelationResult {
        correlation_id: row.get(0)?,
        metric1: row.get(1)?,
        metric2: row.get(2)?,
        correlation_value: row.get(3)?,
        correlation_type: sql::correlation_method(row, 4)?,
        sample_size: row.get(5)?,
        p_value: row.get(6)?,
        timestamp: sql::timestamp(row, 7)?,
        notes: row.get(8)?,
    })
}

pub fn insert(conn: &Connection, result: &NewCorrelationResult) -> Result<i64> {
    conn.execute(
        "INSERT INTO correlation_results (metric1, metric2, correlation_value, correlation_type,
             sample_size, p_value, timestamp, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            result.metric1,
            result.metric2,
            result.correlation_value,
            result.correlation_type.as_str(),
            result.sample_size,
            result.p_value,
            format_ts(&sql::now()),
            result.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Results for a metric pair in either order, newest first. All results when
/// no pair is given.
pub fn list(conn: &Connection, pair: Option<(&str, &str)>) -> Result<Vec<CorrelationResult>> {
    let (a, b) = pair.unzip();
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM correlation_results
         WHERE ?1 IS NULL
            OR (metric1 = ?1 AND metric2 = ?2)
            OR (metric1 = ?2 AND metric2 = ?1)
         ORDER BY timestamp DESC, correlation_id DESC"
    ))?;
    let rows = stmt
        .query_map(params![a, b], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
