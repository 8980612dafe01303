//! Type-safe enumerations for values stored as integers or strings.
//!
//! The cardiovascular dataset encodes gender and lab levels as small
//! integers; these enums keep the encoding in one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Patient gender as encoded in source files (1 = female, 2 = male).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Integer code used in CSV files and the database.
    pub fn code(self) -> i64 {
        match self {
            Gender::Female => 1,
            Gender::Male => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Gender::Female),
            2 => Some(Gender::Male),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ModelError;

    /// Accepts the integer code or the name (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "f" | "female" => Ok(Gender::Female),
            "2" | "m" | "male" => Ok(Gender::Male),
            other => Err(ModelError::UnknownValue {
                kind: "gender",
                value: other.to_string(),
            }),
        }
    }
}

/// How the importer treats a row whose (patient, timestamp) already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the stored record and count the row as skipped.
    #[default]
    Skip,
    /// Overwrite the stored measurements with the row's values.
    Update,
    /// Abort the chunk containing the duplicate.
    Fail,
}

impl DuplicatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Update => "update",
            DuplicatePolicy::Fail => "fail",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "update" | "overwrite" => Ok(DuplicatePolicy::Update),
            "fail" | "error" => Ok(DuplicatePolicy::Fail),
            other => Err(ModelError::UnknownValue {
                kind: "duplicate policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Correlation coefficient flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CorrelationMethod {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            other => Err(ModelError::UnknownValue {
                kind: "correlation method",
                value: other.to_string(),
            }),
        }
    }
}
