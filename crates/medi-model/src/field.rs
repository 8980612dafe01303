//! Canonical column names for health-metric files.
//!
//! Source files use a mix of short dataset codes (`ap_hi`, `gluc`, `cardio`)
//! and descriptive names. Every alias resolves to one [`Field`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PatientId,
    Name,
    Age,
    Gender,
    Height,
    Weight,
    Timestamp,
    SystolicBp,
    DiastolicBp,
    HeartRate,
    BodyTemperature,
    OxygenSaturation,
    Cholesterol,
    Glucose,
    Smoking,
    AlcoholIntake,
    PhysicalActivity,
    CardiovascularDisease,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::PatientId,
        Field::Name,
        Field::Age,
        Field::Gender,
        Field::Height,
        Field::Weight,
        Field::Timestamp,
        Field::SystolicBp,
        Field::DiastolicBp,
        Field::HeartRate,
        Field::BodyTemperature,
        Field::OxygenSaturation,
        Field::Cholesterol,
        Field::Glucose,
        Field::Smoking,
        Field::AlcoholIntake,
        Field::PhysicalActivity,
        Field::CardiovascularDisease,
    ];

    /// Numeric health measurements that can be correlated or trended.
    pub const MEASUREMENTS: [Field; 7] = [
        Field::SystolicBp,
        Field::DiastolicBp,
        Field::HeartRate,
        Field::BodyTemperature,
        Field::OxygenSaturation,
        Field::Cholesterol,
        Field::Glucose,
    ];

    /// Canonical (export) column name.
    pub fn name(self) -> &'static str {
        match self {
            Field::PatientId => "patient_id",
            Field::Name => "name",
            Field::Age => "age",
            Field::Gender => "gender",
            Field::Height => "height",
            Field::Weight => "weight",
            Field::Timestamp => "timestamp",
            Field::SystolicBp => "systolic_bp",
            Field::DiastolicBp => "diastolic_bp",
            Field::HeartRate => "heart_rate",
            Field::BodyTemperature => "body_temperature",
            Field::OxygenSaturation => "oxygen_saturation",
            Field::Cholesterol => "cholesterol",
            Field::Glucose => "glucose",
            Field::Smoking => "smoking",
            Field::AlcoholIntake => "alcohol_intake",
            Field::PhysicalActivity => "physical_activity",
            Field::CardiovascularDisease => "cardiovascular_disease",
        }
    }

    /// Resolve a normalized (trimmed, lowercase) header to a field.
    pub fn from_header(header: &str) -> Option<Self> {
        let field = match header {
            "id" | "patient_id" => Field::PatientId,
            "name" => Field::Name,
            "age" => Field::Age,
            "gender" | "sex" => Field::Gender,
            "height" => Field::Height,
            "weight" => Field::Weight,
            "timestamp" | "date" | "datetime" | "measured_at" => Field::Timestamp,
            "ap_hi" | "systolic_bp" | "systolic" => Field::SystolicBp,
            "ap_lo" | "diastolic_bp" | "diastolic" => Field::DiastolicBp,
            "heart_rate" | "hr" | "pulse" => Field::HeartRate,
            "body_temperature" | "temperature" | "temp" => Field::BodyTemperature,
            "oxygen_saturation" | "spo2" => Field::OxygenSaturation,
            "cholesterol" => Field::Cholesterol,
            "gluc" | "glucose" => Field::Glucose,
            "smoke" | "smoking" => Field::Smoking,
            "alco" | "alcohol_intake" => Field::AlcoholIntake,
            "active" | "physical_activity" => Field::PhysicalActivity,
            "cardio" | "cardiovascular_disease" => Field::CardiovascularDisease,
            _ => return None,
        };
        Some(field)
    }

    /// Parse a canonical or alias name supplied by a user (e.g. on the CLI).
    pub fn parse(name: &str) -> Option<Self> {
        Self::from_header(&name.trim().to_ascii_lowercase())
    }

    /// True for the demographic fields that describe the patient, not the visit.
    pub fn is_demographic(self) -> bool {
        matches!(
            self,
            Field::Name | Field::Age | Field::Gender | Field::Height | Field::Weight
        )
    }

    /// Free text is taken verbatim; only a blank cell means absent, so a
    /// name like `NA` survives an export and re-import.
    pub fn is_free_text(self) -> bool {
        self == Field::Name
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_resolve_to_themselves() {
        for field in Field::ALL {
            assert_eq!(Field::from_header(field.name()), Some(field));
        }
    }

    #[test]
    fn dataset_aliases_resolve() {
        assert_eq!(Field::from_header("ap_hi"), Some(Field::SystolicBp));
        assert_eq!(Field::from_header("ap_lo"), Some(Field::DiastolicBp));
        assert_eq!(Field::from_header("cardio"), Some(Field::CardiovascularDisease));
        assert_eq!(Field::from_header("id"), Some(Field::PatientId));
        assert_eq!(Field::from_header("unknown"), None);
    }
}
