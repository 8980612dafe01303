use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::Field;

/// Kind of rule a value broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    /// Value could not be parsed as a number.
    NotNumeric,
    /// Integer field holds a fractional value.
    NotInteger,
    /// Numeric value outside the medical bounds.
    OutOfRange,
    /// Value not in the allowed category set.
    InvalidCategory,
    /// Boolean flag that is not 0/1/true/false/yes/no.
    InvalidBoolean,
    /// Timestamp that is neither an ISO date nor date-time.
    InvalidTimestamp,
    /// Systolic pressure below diastolic pressure.
    BloodPressureOrder,
    /// No recognised health-metric column in the header.
    NoKnownColumns,
    /// Same canonical column appears twice.
    DuplicateColumn,
}

impl ViolationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationCode::NotNumeric => "not_numeric",
            ViolationCode::NotInteger => "not_integer",
            ViolationCode::OutOfRange => "out_of_range",
            ViolationCode::InvalidCategory => "invalid_category",
            ViolationCode::InvalidBoolean => "invalid_boolean",
            ViolationCode::InvalidTimestamp => "invalid_timestamp",
            ViolationCode::BloodPressureOrder => "bp_order",
            ViolationCode::NoKnownColumns => "no_known_columns",
            ViolationCode::DuplicateColumn => "duplicate_column",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broken rule on one row (or on the header when `field` names a column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub field: Option<Field>,
    pub code: ViolationCode,
    pub message: String,
}

impl Violation {
    pub fn new(field: Option<Field>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// A row the validator refused, with every reason it was refused for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub line: usize,
    pub violations: Vec<Violation>,
}

impl RejectedRow {
    /// Messages joined for single-line display.
    pub fn reason(&self) -> String {
        self.violations
            .iter()
            .map(|violation| violation.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
