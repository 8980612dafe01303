use chrono::NaiveDate;

use medi_model::{
    Demographics, Gender, HealthMetric, Measurements, NewPatient, Patient, TIMESTAMP_FORMAT,
};

fn timestamp() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap()
}

#[test]
fn bmi_uses_height_in_meters() {
    let patient = Patient {
        patient_id: 1,
        name: None,
        age: 18_000,
        gender: Gender::Male,
        height: 180.0,
        weight: 81.0,
        created_at: timestamp(),
        updated_at: timestamp(),
    };
    assert!((patient.bmi() - 25.0).abs() < 1e-9);
}

#[test]
fn demographics_require_all_fields_for_new_patient() {
    let partial = Demographics {
        age: Some(20_000),
        gender: Some(Gender::Female),
        height: Some(165.0),
        ..Demographics::default()
    };
    assert!(partial.to_new_patient(None).is_none());

    let complete = Demographics {
        weight: Some(60.5),
        ..partial
    };
    assert_eq!(
        complete.to_new_patient(Some(7)),
        Some(NewPatient {
            patient_id: Some(7),
            name: None,
            age: 20_000,
            gender: Gender::Female,
            height: 165.0,
            weight: 60.5,
        })
    );
}

#[test]
fn health_metric_serializes_flat() {
    let metric = HealthMetric {
        metric_id: 3,
        patient_id: 1,
        timestamp: timestamp(),
        measurements: Measurements {
            systolic_bp: Some(120),
            diastolic_bp: Some(80),
            ..Measurements::default()
        },
        created_at: timestamp(),
    };
    let json = serde_json::to_value(&metric).expect("serialize metric");
    assert_eq!(json["systolic_bp"], 120);
    assert_eq!(json["diastolic_bp"], 80);
    assert!(json.get("measurements").is_none());

    let round: HealthMetric = serde_json::from_value(json).expect("deserialize metric");
    assert_eq!(round, metric);
}

#[test]
fn timestamp_format_is_sortable_text() {
    assert_eq!(
        timestamp().format(TIMESTAMP_FORMAT).to_string(),
        "2024-03-01 08:30:00"
    );
}

#[test]
fn timestamp_format_keeps_fractional_seconds() {
    let precise = timestamp() + chrono::Duration::milliseconds(250);
    let text = precise.format(TIMESTAMP_FORMAT).to_string();
    assert_eq!(text, "2024-03-01 08:30:00.250");
    assert!(text.as_str() > "2024-03-01 08:30:00");
    let parsed = chrono::NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).unwrap();
    assert_eq!(parsed, precise);
    let whole =
        chrono::NaiveDateTime::parse_from_str("2024-03-01 08:30:00", TIMESTAMP_FORMAT).unwrap();
    assert_eq!(whole, timestamp());
}
