use chrono::{NaiveDate, NaiveDateTime};

use medi_model::{
    CorrelationMethod, Gender, Measurements, NewBiomedicalSignal, NewCorrelationResult,
    NewHealthMetric, NewMedicalImage, NewPatient, NewSpectrumAnalysis,
};
use medi_store::{MetricFilter, PatientFilter, Store, StoreError};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn patient(id: Option<i64>, gender: Gender, height: f64, weight: f64) -> NewPatient {
    NewPatient {
        patient_id: id,
        name: None,
        age: 20_000,
        gender,
        height,
        weight,
    }
}

fn metric(patient_id: i64, timestamp: NaiveDateTime, systolic: i64, diastolic: i64) -> NewHealthMetric {
    NewHealthMetric {
        patient_id,
        timestamp,
        measurements: Measurements {
            systolic_bp: Some(systolic),
            diastolic_bp: Some(diastolic),
            heart_rate: Some(70),
            cardiovascular_disease: Some(systolic >= 140),
            ..Measurements::default()
        },
    }
}

fn seeded() -> Store {
    let store = Store::open_in_memory().unwrap();
    store.insert_patient(&patient(Some(1), Gender::Female, 160.0, 50.0)).unwrap();
    store.insert_patient(&patient(Some(2), Gender::Male, 180.0, 100.0)).unwrap();
    store.insert_metric(&metric(1, at(1, 8), 120, 80)).unwrap();
    store.insert_metric(&metric(1, at(2, 8), 130, 85)).unwrap();
    store.insert_metric(&metric(2, at(1, 9), 150, 95)).unwrap();
    store
}

#[test]
fn explicit_and_generated_patient_ids() {
    let store = Store::open_in_memory().unwrap();
    assert_eq!(store.insert_patient(&patient(Some(42), Gender::Male, 170.0, 70.0)).unwrap(), 42);
    let generated = store.insert_patient(&patient(None, Gender::Male, 170.0, 70.0)).unwrap();
    assert_eq!(generated, 43);
    let loaded = store.patient(42).unwrap().unwrap();
    assert_eq!(loaded.gender, Gender::Male);
    assert_eq!(loaded.height, 170.0);
}

#[test]
fn natural_key_is_unique() {
    let store = seeded();
    let err = store.insert_metric(&metric(1, at(1, 8), 110, 70)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateMetric { patient_id: 1, .. }));
    assert!(err.is_constraint_violation());

    let orphan = store.insert_metric(&metric(99, at(1, 8), 110, 70)).unwrap_err();
    assert!(matches!(orphan, StoreError::ForeignKey(_)));
}

#[test]
fn deleting_a_patient_cascades() {
    let store = seeded();
    let signal_id = store
        .insert_signal(&NewBiomedicalSignal {
            patient_id: Some(1),
            signal_type: "ECG".into(),
            signal_data_path: "ecg.csv".into(),
            sampling_rate: Some(250.0),
            ..NewBiomedicalSignal::default()
        })
        .unwrap();
    store
        .insert_spectrum_analysis(&NewSpectrumAnalysis {
            signal_id,
            frequency_data_path: "ecg_spectrum.csv".into(),
            fft_size: Some(1024),
            frequency_resolution: Some(250.0 / 1024.0),
            dominant_frequency: Some(1.2),
            power_spectrum_path: None,
            notes: None,
        })
        .unwrap();
    store
        .insert_image(&NewMedicalImage {
            patient_id: Some(1),
            filename: "chest.png".into(),
            image_path: "/images/chest.png".into(),
            ..NewMedicalImage::default()
        })
        .unwrap();

    store.delete_patient(1).unwrap();

    let counts: Vec<i64> = store.table_counts().unwrap().into_iter().map(|(_, n)| n).collect();
    // patients, metrics, images, signals, correlations, spectra
    assert_eq!(counts, vec![1, 1, 0, 0, 0, 0]);
    assert!(matches!(store.delete_patient(1), Err(StoreError::PatientNotFound(1))));
}

#[test]
fn patient_filters_combine() {
    let store = seeded();
    let all = store.patients(&PatientFilter::default()).unwrap();
    assert_eq!(all.len(), 2);

    // BMI of patient 1 is 19.5, patient 2 is 30.9.
    let obese = store
        .patients(&PatientFilter {
            min_bmi: Some(30.0),
            ..PatientFilter::default()
        })
        .unwrap();
    assert_eq!(obese.iter().map(|p| p.patient_id).collect::<Vec<_>>(), vec![2]);

    let female = store
        .patients(&PatientFilter {
            gender: Some(Gender::Female),
            max_bmi: Some(25.0),
            ..PatientFilter::default()
        })
        .unwrap();
    assert_eq!(female.len(), 1);
    assert_eq!(female[0].patient_id, 1);
}

#[test]
fn metric_filters_order_newest_first() {
    let store = seeded();
    let metrics = store
        .metrics(&MetricFilter {
            patient_ids: vec![1],
            ..MetricFilter::default()
        })
        .unwrap();
    assert_eq!(
        metrics.iter().map(|m| m.timestamp).collect::<Vec<_>>(),
        vec![at(2, 8), at(1, 8)]
    );

    let hypertensive = store
        .metrics(&MetricFilter {
            min_systolic: Some(140),
            cardiovascular_disease: Some(true),
            ..MetricFilter::default()
        })
        .unwrap();
    assert_eq!(hypertensive.len(), 1);
    assert_eq!(hypertensive[0].patient_id, 2);

    let window = store
        .metrics(&MetricFilter {
            start: Some(at(1, 8)),
            end: Some(at(1, 23)),
            limit: Some(1),
            ..MetricFilter::default()
        })
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].timestamp, at(1, 9));
}

#[test]
fn summary_respects_patient_selection() {
    let store = seeded();
    let everyone = store.summary_statistics(&[]).unwrap();
    assert_eq!(everyone.total_patients, 2);
    assert_eq!(everyone.total_health_metrics, 3);
    assert_eq!(everyone.avg_systolic_bp, Some((120.0 + 130.0 + 150.0) / 3.0));

    let first = store.summary_statistics(&[1]).unwrap();
    assert_eq!(first.total_patients, 1);
    assert_eq!(first.total_health_metrics, 2);
    assert_eq!(first.avg_diastolic_bp, Some(82.5));

    let with_metrics = store.patient_with_metrics(1).unwrap().unwrap();
    assert_eq!(with_metrics.metrics.len(), 2);
    assert!(store.patient_with_metrics(7).unwrap().is_none());
}

#[test]
fn correlations_list_pairs_in_either_order() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_correlation(&NewCorrelationResult {
            metric1: "systolic_bp".into(),
            metric2: "diastolic_bp".into(),
            correlation_value: 0.8,
            correlation_type: CorrelationMethod::Spearman,
            sample_size: Some(40),
            p_value: Some(0.001),
            notes: None,
        })
        .unwrap();
    let found = store.correlations(Some(("diastolic_bp", "systolic_bp"))).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].correlation_type, CorrelationMethod::Spearman);
    assert!(store.correlations(Some(("glucose", "age"))).unwrap().is_empty());
    assert_eq!(store.correlations(None).unwrap().len(), 1);
}

#[test]
fn file_database_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("medi.db");
    {
        let store = Store::open(&path).unwrap();
        store.insert_patient(&patient(Some(5), Gender::Female, 150.0, 45.0)).unwrap();
    }
    let store = Store::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    assert!(store.patient(5).unwrap().is_some());
}
