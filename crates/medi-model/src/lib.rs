pub mod enums;
pub mod error;
pub mod field;
pub mod options;
pub mod records;
pub mod validation;

pub use enums::{CorrelationMethod, DuplicatePolicy, Gender};
pub use error::{ModelError, Result};
pub use field::Field;
pub use options::{DEFAULT_BATCH_SIZE, ImportOptions};
pub use records::{
    BiomedicalSignal, CorrelationResult, Demographics, HealthMetric, MedicalImage, Measurements,
    MetricRecord, NewBiomedicalSignal, NewCorrelationResult, NewHealthMetric, NewMedicalImage,
    NewPatient, NewSpectrumAnalysis, Patient, SpectrumAnalysis, TIMESTAMP_FORMAT,
};
pub use validation::{RejectedRow, Violation, ViolationCode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_row_joins_reasons() {
        let row = RejectedRow {
            line: 4,
            violations: vec![
                Violation::new(
                    Some(Field::HeartRate),
                    ViolationCode::OutOfRange,
                    "Heart rate must be between 30 and 220 bpm, got 250",
                ),
                Violation::new(None, ViolationCode::BloodPressureOrder, "systolic < diastolic"),
            ],
        };
        assert_eq!(
            row.reason(),
            "Heart rate must be between 30 and 220 bpm, got 250; systolic < diastolic"
        );
    }

    #[test]
    fn import_options_clamp_batch_size() {
        let options = ImportOptions::new().with_batch_size(0);
        assert_eq!(options.effective_batch_size(), 1);
        assert_eq!(ImportOptions::default().effective_batch_size(), DEFAULT_BATCH_SIZE);
    }
}
