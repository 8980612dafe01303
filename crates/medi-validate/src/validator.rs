//! Row validation.
//!
//! Validation is total: every row produces a [`RowVerdict`]. It is also
//! non-mutating: an accepted row carries exactly the values that were parsed
//! from the input, and a rejected row carries every violation found rather
//! than a repaired value.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use medi_ingest::RawRow;
use medi_model::{
    Demographics, Field, Gender, Measurements, MetricRecord, RejectedRow, Violation,
    ViolationCode,
};

use crate::checks::{blood_pressure, flags, numeric, timestamp};
use crate::rules::{BOOLEAN_FIELDS, RULES};

/// Outcome for a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowVerdict {
    Accepted(MetricRecord),
    Rejected(RejectedRow),
}

impl RowVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RowVerdict::Accepted(_))
    }
}

/// Accepted and rejected rows of one file, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationOutcome {
    pub accepted: Vec<MetricRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl ValidationOutcome {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Violation counts by code, most frequent first.
    pub fn violation_counts(&self) -> Vec<(ViolationCode, usize)> {
        let mut counts: BTreeMap<&'static str, (ViolationCode, usize)> = BTreeMap::new();
        for violation in self.rejected.iter().flat_map(|row| &row.violations) {
            counts
                .entry(violation.code.as_str())
                .or_insert((violation.code, 0))
                .1 += 1;
        }
        let mut counts: Vec<_> = counts.into_values().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

/// Check one row against every rule.
pub fn validate_row(row: &RawRow) -> RowVerdict {
    let mut violations = Vec::new();

    let patient_id = row
        .get(Field::PatientId)
        .and_then(|raw| numeric::check_patient_id(raw).map_err(|v| violations.push(v)).ok());

    let mut numbers: BTreeMap<Field, f64> = BTreeMap::new();
    for rule in &RULES {
        let Some(raw) = row.get(rule.field) else {
            continue;
        };
        match numeric::check(rule, raw) {
            Ok(value) => {
                numbers.insert(rule.field, value);
            }
            Err(violation) => violations.push(violation),
        }
    }

    let mut booleans: BTreeMap<Field, bool> = BTreeMap::new();
    for field in BOOLEAN_FIELDS {
        let Some(raw) = row.get(field) else {
            continue;
        };
        match flags::check(field, raw) {
            Ok(value) => {
                booleans.insert(field, value);
            }
            Err(violation) => violations.push(violation),
        }
    }

    let timestamp = row
        .get(Field::Timestamp)
        .and_then(|raw| timestamp::check(raw).map_err(|v| violations.push(v)).ok());

    let int = |field: Field| numbers.get(&field).map(|v| *v as i64);
    if let Some(violation) = blood_pressure::check(int(Field::SystolicBp), int(Field::DiastolicBp))
    {
        violations.push(violation);
    }

    if !violations.is_empty() {
        debug!(
            line = row.line,
            codes = %violations
                .iter()
                .map(|v| v.code.as_str())
                .collect::<Vec<_>>()
                .join(","),
            "row rejected"
        );
        return RowVerdict::Rejected(RejectedRow {
            line: row.line,
            violations,
        });
    }

    let flag = |field: Field| booleans.get(&field).copied();
    RowVerdict::Accepted(MetricRecord {
        line: row.line,
        patient_id,
        demographics: Demographics {
            name: row.get(Field::Name).map(str::to_string),
            age: int(Field::Age),
            gender: int(Field::Gender).and_then(Gender::from_code),
            height: numbers.get(&Field::Height).copied(),
            weight: numbers.get(&Field::Weight).copied(),
        },
        timestamp,
        measurements: Measurements {
            systolic_bp: int(Field::SystolicBp),
            diastolic_bp: int(Field::DiastolicBp),
            heart_rate: int(Field::HeartRate),
            body_temperature: numbers.get(&Field::BodyTemperature).copied(),
            oxygen_saturation: numbers.get(&Field::OxygenSaturation).copied(),
            cholesterol: int(Field::Cholesterol),
            glucose: int(Field::Glucose),
            smoking: flag(Field::Smoking).unwrap_or(false),
            alcohol_intake: flag(Field::AlcoholIntake).unwrap_or(false),
            physical_activity: flag(Field::PhysicalActivity).unwrap_or(false),
            cardiovascular_disease: flag(Field::CardiovascularDisease),
        },
    })
}

/// Validate every row, keeping input order within each bucket.
pub fn validate_rows<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for row in rows {
        match validate_row(row) {
            RowVerdict::Accepted(record) => outcome.accepted.push(record),
            RowVerdict::Rejected(rejected) => outcome.rejected.push(rejected),
        }
    }
    info!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "validation complete"
    );
    outcome
}

/// Convenience for reporting: every violation on every rejected row.
pub fn all_violations(outcome: &ValidationOutcome) -> impl Iterator<Item = (usize, &Violation)> {
    outcome
        .rejected
        .iter()
        .flat_map(|row| row.violations.iter().map(move |v| (row.line, v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: usize, cells: &[(Field, &str)]) -> RawRow {
        cells
            .iter()
            .fold(RawRow::new(line), |row, (field, value)| row.with(*field, *value))
    }

    #[test]
    fn accepted_row_keeps_parsed_values() {
        let verdict = validate_row(&row(
            2,
            &[
                (Field::PatientId, "5"),
                (Field::Age, "18393"),
                (Field::Gender, "2"),
                (Field::Height, "168"),
                (Field::Weight, "62.5"),
                (Field::SystolicBp, "110"),
                (Field::DiastolicBp, "80"),
                (Field::Smoking, "yes"),
                (Field::CardiovascularDisease, "0"),
                (Field::Timestamp, "2024-02-01"),
            ],
        ));
        let RowVerdict::Accepted(record) = verdict else {
            panic!("expected acceptance, got {verdict:?}");
        };
        assert_eq!(record.line, 2);
        assert_eq!(record.patient_id, Some(5));
        assert_eq!(record.demographics.gender, Some(Gender::Male));
        assert_eq!(record.demographics.weight, Some(62.5));
        assert_eq!(record.measurements.systolic_bp, Some(110));
        assert!(record.measurements.smoking);
        assert!(!record.measurements.alcohol_intake);
        assert_eq!(record.measurements.cardiovascular_disease, Some(false));
        assert_eq!(
            record.timestamp.map(|t| t.to_string()),
            Some("2024-02-01 00:00:00".to_string())
        );
    }

    #[test]
    fn every_violation_is_reported() {
        let verdict = validate_row(&row(
            9,
            &[
                (Field::HeartRate, "250"),
                (Field::Glucose, "7"),
                (Field::Smoking, "maybe"),
                (Field::Timestamp, "yesterday"),
            ],
        ));
        let RowVerdict::Rejected(rejected) = verdict else {
            panic!("expected rejection");
        };
        let codes: Vec<_> = rejected.violations.iter().map(|v| v.code).collect();
        assert_eq!(
            codes,
            vec![
                ViolationCode::OutOfRange,
                ViolationCode::InvalidCategory,
                ViolationCode::InvalidBoolean,
                ViolationCode::InvalidTimestamp,
            ]
        );
    }

    #[test]
    fn empty_row_is_accepted_with_defaults() {
        let verdict = validate_row(&RawRow::new(3));
        assert!(verdict.is_accepted());
    }

    #[test]
    fn violation_counts_are_sorted() {
        let outcome = validate_rows(&[
            row(2, &[(Field::HeartRate, "10")]),
            row(3, &[(Field::HeartRate, "500"), (Field::Glucose, "9")]),
        ]);
        assert_eq!(
            outcome.violation_counts(),
            vec![
                (ViolationCode::OutOfRange, 2),
                (ViolationCode::InvalidCategory, 1)
            ]
        );
        assert_eq!(all_violations(&outcome).count(), 3);
    }
}
