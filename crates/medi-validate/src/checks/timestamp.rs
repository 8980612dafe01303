//! ISO 8601 date and date-time values.

use chrono::NaiveDateTime;
use medi_ingest::values::parse_timestamp;
use medi_model::{Field, Violation, ViolationCode};

pub fn check(raw: &str) -> Result<NaiveDateTime, Violation> {
    parse_timestamp(raw).ok_or_else(|| {
        Violation::new(
            Some(Field::Timestamp),
            ViolationCode::InvalidTimestamp,
            format!(
                "Timestamp must be an ISO date or date-time, got '{}'",
                raw.trim()
            ),
        )
    })
}
