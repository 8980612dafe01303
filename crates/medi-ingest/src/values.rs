//! Cell-level parsing helpers shared by the loaders, validator and exporter.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Tokens that mean "no value" in source files.
pub const MISSING_TOKENS: [&str; 8] = ["", "NA", "N/A", "null", "NULL", "None", "nan", "NaN"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Returns true if the trimmed cell is one of the missing-value tokens.
pub fn is_missing_value(value: &str) -> bool {
    let trimmed = value.trim();
    MISSING_TOKENS.contains(&trimmed)
}

/// Parses a string as f64, returning None for invalid, missing or non-finite values.
pub fn parse_f64(value: &str) -> Option<f64> {
    if is_missing_value(value) {
        return None;
    }
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a string as i64, returning None for invalid or missing values.
pub fn parse_i64(value: &str) -> Option<i64> {
    if is_missing_value(value) {
        return None;
    }
    value.trim().parse::<i64>().ok()
}

/// Parses an integer that may have been written as an integral float (`120.0`).
///
/// Returns `Some(Err(value))` when the value is numeric but has a fractional part.
pub fn parse_integral(value: &str) -> Option<Result<i64, f64>> {
    if let Some(int) = parse_i64(value) {
        return Some(Ok(int));
    }
    let float = parse_f64(value)?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(Ok(float as i64))
    } else {
        Some(Err(float))
    }
}

/// Parses a yes/no flag (`0/1`, `true/false`, `yes/no`, `y/n`).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "0.0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parses an ISO 8601 date or date-time. Bare dates resolve to midnight.
///
/// Date-times carrying `Z` or a UTC offset are converted to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z"))
    {
        return Some(parsed.naive_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Formats a float in its shortest form that parses back to the same value.
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tokens_are_recognised() {
        for token in MISSING_TOKENS {
            assert!(is_missing_value(token), "{token}");
        }
        assert!(is_missing_value("  "));
        assert!(!is_missing_value("0"));
    }

    #[test]
    fn integral_floats_parse_as_integers() {
        assert_eq!(parse_integral("120"), Some(Ok(120)));
        assert_eq!(parse_integral("120.0"), Some(Ok(120)));
        assert_eq!(parse_integral("120.5"), Some(Err(120.5)));
        assert_eq!(parse_integral("abc"), None);
        assert_eq!(parse_integral("NA"), None);
    }

    #[test]
    fn timestamps_accept_dates_and_datetimes() {
        let midnight = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(midnight.to_string(), "2024-01-15 00:00:00");
        let with_t = parse_timestamp("2024-01-15T08:05:00").unwrap();
        assert_eq!(with_t.to_string(), "2024-01-15 08:05:00");
        assert!(parse_timestamp("15/01/2024").is_none());
    }

    #[test]
    fn offset_datetimes_convert_to_utc() {
        let zulu = parse_timestamp("2024-01-15T08:05:00Z").unwrap();
        assert_eq!(zulu.to_string(), "2024-01-15 08:05:00");
        let offset = parse_timestamp("2024-01-15T08:05:00+02:00").unwrap();
        assert_eq!(offset.to_string(), "2024-01-15 06:05:00");
        let spaced = parse_timestamp("2024-01-15 00:30:00.5-01:00").unwrap();
        assert_eq!(spaced.to_string(), "2024-01-15 01:30:00.500");
    }

    #[test]
    fn format_numeric_keeps_integers_intact() {
        assert_eq!(format_numeric(100.0), "100");
        assert_eq!(format_numeric(36.6), "36.6");
        assert_eq!(format_numeric(0.1 + 0.2), "0.30000000000000004");
    }
}
