//! Stored records and their insert/update forms.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::enums::{CorrelationMethod, Gender};

/// Storage and export format for timestamps.
///
/// Fractional seconds are written only when present, so whole-second values
/// keep the plain `YYYY-MM-DD HH:MM:SS` form and still sort as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A patient row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: i64,
    pub name: Option<String>,
    /// Age in days.
    pub age: i64,
    pub gender: Gender,
    /// Height in cm.
    pub height: f64,
    /// Weight in kg.
    pub weight: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Patient {
    /// Body mass index (kg/m²).
    pub fn bmi(&self) -> f64 {
        let height_m = self.height / 100.0;
        self.weight / (height_m * height_m)
    }

    pub fn demographics(&self) -> Demographics {
        Demographics {
            name: self.name.clone(),
            age: Some(self.age),
            gender: Some(self.gender),
            height: Some(self.height),
            weight: Some(self.weight),
        }
    }
}

/// Insert form of [`Patient`]. `patient_id` is assigned by the store when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub patient_id: Option<i64>,
    pub name: Option<String>,
    pub age: i64,
    pub gender: Gender,
    pub height: f64,
    pub weight: f64,
}

/// Optional demographic values as they appear on an imported row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
}

impl Demographics {
    /// Build an insert form when every required field is present.
    pub fn to_new_patient(&self, patient_id: Option<i64>) -> Option<NewPatient> {
        Some(NewPatient {
            patient_id,
            name: self.name.clone(),
            age: self.age?,
            gender: self.gender?,
            height: self.height?,
            weight: self.weight?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.height.is_none()
            && self.weight.is_none()
    }
}

/// Vital signs and lifestyle flags recorded at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub systolic_bp: Option<i64>,
    pub diastolic_bp: Option<i64>,
    pub heart_rate: Option<i64>,
    /// °C
    pub body_temperature: Option<f64>,
    /// SpO2 %
    pub oxygen_saturation: Option<f64>,
    /// 1 normal, 2 above normal, 3 well above normal.
    pub cholesterol: Option<i64>,
    pub glucose: Option<i64>,
    pub smoking: bool,
    pub alcohol_intake: bool,
    pub physical_activity: bool,
    pub cardiovascular_disease: Option<bool>,
}

/// A health-metric row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub metric_id: i64,
    pub patient_id: i64,
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub measurements: Measurements,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHealthMetric {
    pub patient_id: i64,
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub measurements: Measurements,
}

/// A row that passed validation, with every value typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// 1-based line in the source file.
    pub line: usize,
    pub patient_id: Option<i64>,
    pub demographics: Demographics,
    pub timestamp: Option<NaiveDateTime>,
    pub measurements: Measurements,
}

/// Metadata for an externally stored medical image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalImage {
    pub image_id: i64,
    pub patient_id: Option<i64>,
    pub filename: String,
    pub image_path: String,
    pub image_type: Option<String>,
    pub processing_method: Option<String>,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub upload_date: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMedicalImage {
    pub patient_id: Option<i64>,
    pub filename: String,
    pub image_path: String,
    pub image_type: Option<String>,
    pub processing_method: Option<String>,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub notes: Option<String>,
}

/// Metadata for an ECG/EEG recording stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomedicalSignal {
    pub signal_id: i64,
    pub patient_id: Option<i64>,
    pub signal_type: String,
    pub signal_data_path: String,
    pub sampling_rate: Option<f64>,
    /// Seconds.
    pub duration: Option<f64>,
    pub number_of_channels: Option<i64>,
    pub timestamp: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewBiomedicalSignal {
    pub patient_id: Option<i64>,
    pub signal_type: String,
    pub signal_data_path: String,
    pub sampling_rate: Option<f64>,
    pub duration: Option<f64>,
    pub number_of_channels: Option<i64>,
    pub notes: Option<String>,
}

/// A stored correlation coefficient between two metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub correlation_id: i64,
    pub metric1: String,
    pub metric2: String,
    pub correlation_value: f64,
    pub correlation_type: CorrelationMethod,
    pub sample_size: Option<i64>,
    pub p_value: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCorrelationResult {
    pub metric1: String,
    pub metric2: String,
    pub correlation_value: f64,
    pub correlation_type: CorrelationMethod,
    pub sample_size: Option<i64>,
    pub p_value: Option<f64>,
    pub notes: Option<String>,
}

/// A stored FFT run over a [`BiomedicalSignal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumAnalysis {
    pub analysis_id: i64,
    pub signal_id: i64,
    pub frequency_data_path: String,
    pub fft_size: Option<i64>,
    pub frequency_resolution: Option<f64>,
    pub dominant_frequency: Option<f64>,
    pub power_spectrum_path: Option<String>,
    pub timestamp: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpectrumAnalysis {
    pub signal_id: i64,
    pub frequency_data_path: String,
    pub fft_size: Option<i64>,
    pub frequency_resolution: Option<f64>,
    pub dominant_frequency: Option<f64>,
    pub power_spectrum_path: Option<String>,
    pub notes: Option<String>,
}
