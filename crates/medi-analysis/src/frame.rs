//! Polars frame of stored metrics joined with patient attributes.
//!
//! One row per [`HealthMetric`], ordered by patient then timestamp. Patient
//! columns (`age`, `gender`, `height`, `weight`, `bmi`) are null when the
//! patient is not in the slice passed in.

use std::collections::HashMap;

use polars::prelude::*;

use medi_model::{Field, HealthMetric, Measurements, Patient, TIMESTAMP_FORMAT};

use crate::error::{AnalysisError, Result};

/// Columns correlated when the caller names none.
pub const DEFAULT_MATRIX_COLUMNS: [&str; 9] = [
    "age",
    "bmi",
    "systolic_bp",
    "diastolic_bp",
    "heart_rate",
    "body_temperature",
    "oxygen_saturation",
    "cholesterol",
    "glucose",
];

const FLAG_FIELDS: [Field; 4] = [
    Field::Smoking,
    Field::AlcoholIntake,
    Field::PhysicalActivity,
    Field::CardiovascularDisease,
];

/// Numeric value of a measurement field; flags map to 0/1.
pub fn measurement_value(m: &Measurements, field: Field) -> Option<f64> {
    let int = |v: Option<i64>| v.map(|v| v as f64);
    let flag = |v: bool| Some(f64::from(u8::from(v)));
    match field {
        Field::SystolicBp => int(m.systolic_bp),
        Field::DiastolicBp => int(m.diastolic_bp),
        Field::HeartRate => int(m.heart_rate),
        Field::BodyTemperature => m.body_temperature,
        Field::OxygenSaturation => m.oxygen_saturation,
        Field::Cholesterol => int(m.cholesterol),
        Field::Glucose => int(m.glucose),
        Field::Smoking => flag(m.smoking),
        Field::AlcoholIntake => flag(m.alcohol_intake),
        Field::PhysicalActivity => flag(m.physical_activity),
        Field::CardiovascularDisease => m.cardiovascular_disease.and_then(flag),
        _ => None,
    }
}

pub fn metrics_frame(patients: &[Patient], metrics: &[HealthMetric]) -> Result<DataFrame> {
    let by_id: HashMap<i64, &Patient> = patients.iter().map(|p| (p.patient_id, p)).collect();
    let mut rows: Vec<&HealthMetric> = metrics.iter().collect();
    rows.sort_by_key(|m| (m.patient_id, m.timestamp, m.metric_id));

    let patient = |m: &HealthMetric| by_id.get(&m.patient_id).copied();
    let patient_col = |f: &dyn Fn(&Patient) -> f64| -> Vec<Option<f64>> {
        rows.iter().map(|m| patient(m).map(f)).collect()
    };

    let mut columns: Vec<Column> = vec![
        Series::new("metric_id".into(), rows.iter().map(|m| m.metric_id).collect::<Vec<_>>()).into(),
        Series::new("patient_id".into(), rows.iter().map(|m| m.patient_id).collect::<Vec<_>>()).into(),
        Series::new(
            "timestamp".into(),
            rows.iter()
                .map(|m| m.timestamp.format(TIMESTAMP_FORMAT).to_string())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new("age".into(), patient_col(&|p: &Patient| p.age as f64)).into(),
        Series::new(
            "gender".into(),
            rows.iter()
                .map(|m| patient(m).map(|p| p.gender.code()))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new("height".into(), patient_col(&|p: &Patient| p.height)).into(),
        Series::new("weight".into(), patient_col(&|p: &Patient| p.weight)).into(),
        Series::new("bmi".into(), patient_col(&Patient::bmi)).into(),
    ];
    for field in Field::MEASUREMENTS.iter().chain(&FLAG_FIELDS) {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|m| measurement_value(&m.measurements, *field))
            .collect();
        columns.push(Series::new(field.name().into(), values).into());
    }
    Ok(DataFrame::new(columns)?)
}

fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::Boolean(b) => Some(f64::from(u8::from(b))),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Values of a numeric column; nulls become `None`.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| AnalysisError::UnknownColumn(name.to_string()))?;
    let mut values = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        values.push(any_to_f64(column.get(idx).unwrap_or(AnyValue::Null)));
    }
    Ok(values)
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use medi_model::Gender;

    use super::*;

    fn at(day: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap()
    }

    #[test]
    fn frame_joins_patients_and_sorts_rows() {
        let patient = Patient {
            patient_id: 1,
            name: None,
            age: 40,
            gender: Gender::Female,
            height: 200.0,
            weight: 100.0,
            created_at: at(1),
            updated_at: at(1),
        };
        let metric = |metric_id, patient_id, day, sys| HealthMetric {
            metric_id,
            patient_id,
            timestamp: at(day),
            measurements: Measurements {
                systolic_bp: Some(sys),
                smoking: true,
                ..Measurements::default()
            },
            created_at: at(day),
        };
        let metrics = [metric(1, 1, 3, 130), metric(2, 1, 2, 120), metric(3, 2, 1, 110)];
        let df = metrics_frame(&[patient], &metrics).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(
            numeric_column(&df, "systolic_bp").unwrap(),
            vec![Some(120.0), Some(130.0), Some(110.0)]
        );
        assert_eq!(numeric_column(&df, "bmi").unwrap(), vec![Some(25.0), Some(25.0), None]);
        assert_eq!(numeric_column(&df, "smoking").unwrap(), vec![Some(1.0); 3]);
        assert_eq!(numeric_column(&df, "glucose").unwrap(), vec![None; 3]);
        assert!(matches!(
            numeric_column(&df, "pulse"),
            Err(AnalysisError::UnknownColumn(_))
        ));
    }
}
