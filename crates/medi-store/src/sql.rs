//! Column conversions shared by the repositories.

use chrono::{NaiveDateTime, Timelike, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use medi_model::{CorrelationMethod, Gender, ModelError, TIMESTAMP_FORMAT};

/// Current UTC time truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn gender(row: &Row<'_>, idx: usize) -> rusqlite::Result<Gender> {
    let code: i64 = row.get(idx)?;
    Gender::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(ModelError::UnknownValue {
                kind: "gender",
                value: code.to_string(),
            }),
        )
    })
}

pub fn correlation_method(row: &Row<'_>, idx: usize) -> rusqlite::Result<CorrelationMethod> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: ModelError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `?, ?, ?` with `n` placeholders.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
