use chrono::{Duration, NaiveDate, NaiveDateTime};
use medi_analysis::{
    AnomalyMethod, FilterStep, OutlierMethod, OutlierReplacement, ThresholdReplacement,
    analyze_patient_series, apply_chain, correlation_matrix, correlation_summary, metrics_frame,
    moving_average, remove_outliers,
};
use medi_model::{CorrelationMethod, Field, Gender, HealthMetric, Measurements, Patient};
use proptest::prelude::*;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap()
}

fn patient(patient_id: i64, age: i64) -> Patient {
    Patient {
        patient_id,
        name: None,
        age,
        gender: Gender::Male,
        height: 180.0,
        weight: 80.0,
        created_at: start(),
        updated_at: start(),
    }
}

fn metric(metric_id: i64, patient_id: i64, day: i64, systolic: i64, diastolic: i64) -> HealthMetric {
    HealthMetric {
        metric_id,
        patient_id,
        timestamp: start() + Duration::days(day),
        measurements: Measurements {
            systolic_bp: Some(systolic),
            diastolic_bp: Some(diastolic),
            heart_rate: Some(70 + (metric_id % 3)),
            ..Measurements::default()
        },
        created_at: start(),
    }
}

#[test]
fn blood_pressure_columns_correlate_strongly() {
    let patients = [patient(1, 50), patient(2, 60)];
    let metrics: Vec<HealthMetric> = (0..10)
        .map(|i| metric(i + 1, 1 + i % 2, i, 110 + 3 * i, 70 + 2 * i))
        .collect();
    let df = metrics_frame(&patients, &metrics).unwrap();

    let matrix = correlation_matrix(&df, &[], CorrelationMethod::Pearson).unwrap();
    let r = matrix.get("systolic_bp", "diastolic_bp").unwrap();
    assert!((r - 1.0).abs() < 1e-9);
    assert_eq!(matrix.get("diastolic_bp", "systolic_bp"), Some(r));
    // Glucose is never recorded.
    assert_eq!(matrix.get("glucose", "systolic_bp"), None);

    let summary = correlation_summary(
        &df,
        &["systolic_bp".into(), "diastolic_bp".into(), "heart_rate".into()],
        CorrelationMethod::Spearman,
        0.3,
    )
    .unwrap();
    assert_eq!(summary[0].metric1, "systolic_bp");
    assert_eq!(summary[0].metric2, "diastolic_bp");
    for pair in summary.windows(2) {
        assert!(pair[0].correlation.coefficient.abs() >= pair[1].correlation.coefficient.abs());
    }
}

#[test]
fn matrix_needs_two_known_columns() {
    let df = metrics_frame(&[], &[metric(1, 1, 0, 120, 80), metric(2, 1, 1, 125, 82)]).unwrap();
    let columns = ["systolic_bp".to_string(), "pulse".to_string()];
    assert!(correlation_matrix(&df, &columns, CorrelationMethod::Pearson).is_err());
}

#[test]
fn patient_series_report_flags_the_spike() {
    let mut metrics: Vec<HealthMetric> = (0..8)
        .map(|i| metric(i + 1, 7, i, 120 + i % 2, 80))
        .collect();
    metrics.push(metric(99, 7, 9, 190, 80));
    metrics.push(metric(100, 8, 3, 100, 60));

    let report =
        analyze_patient_series(&metrics, 7, Field::SystolicBp, AnomalyMethod::ZScore, 2.0);
    assert_eq!(report.data_points, 9);
    assert_eq!(report.first, Some(start()));
    assert_eq!(report.anomalies, vec![(start() + Duration::days(9), 190.0)]);
    assert!(report.trend.slope > 0.0);
    assert_eq!(report.statistics.map(|s| s.count), Some(9));
}

#[test]
fn chain_from_json_config() {
    let steps: Vec<FilterStep> = serde_json::from_str(
        r#"[
            {"type": "threshold", "min": 30, "max": 220, "replace": "clamp"},
            {"type": "moving_average", "window": 3}
        ]"#,
    )
    .unwrap();
    assert_eq!(
        steps[0],
        FilterStep::Threshold {
            min: Some(30.0),
            max: Some(220.0),
            replace: ThresholdReplacement::Clamp,
        }
    );
    let out = apply_chain(&[Some(10.0), Some(60.0), Some(90.0)], &steps).unwrap();
    assert_eq!(out, vec![Some(45.0), Some(60.0), Some(75.0)]);
}

proptest! {
    #[test]
    fn moving_average_stays_within_input_range(
        data in prop::collection::vec(prop::option::of(-1000.0f64..1000.0), 1..60),
        window in 1usize..9,
        centered in any::<bool>(),
    ) {
        let out = moving_average(&data, window, centered).unwrap();
        prop_assert_eq!(out.len(), data.len());
        let present: Vec<f64> = data.iter().flatten().copied().collect();
        if let (Some(lo), Some(hi)) = (
            present.iter().copied().reduce(f64::min),
            present.iter().copied().reduce(f64::max),
        ) {
            for v in out.iter().flatten() {
                prop_assert!(*v >= lo - 1e-9 && *v <= hi + 1e-9);
            }
        } else {
            prop_assert!(out.iter().all(Option::is_none));
        }
    }

    #[test]
    fn outlier_removal_keeps_length_and_kept_values(
        data in prop::collection::vec(prop::option::of(0.0f64..500.0), 0..80),
    ) {
        let out = remove_outliers(&data, OutlierMethod::Iqr, 1.5, OutlierReplacement::Missing);
        prop_assert_eq!(out.values.len(), data.len());
        for ((orig, new), kept) in data.iter().zip(&out.values).zip(&out.keep) {
            if *kept {
                prop_assert_eq!(orig, new);
            }
        }
    }
}
