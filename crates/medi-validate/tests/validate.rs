use medi_ingest::{RawRow, parse_text};
use medi_model::{Field, ViolationCode};
use medi_validate::{BP_ORDER_REASON, RowVerdict, check_columns, validate_row, validate_rows};
use proptest::prelude::*;

#[test]
fn three_row_file_rejects_inverted_pressure() {
    let text = "patient_id,systolic_bp,diastolic_bp\n1,120,80\n2,80,120\n3,130,85\n";
    let loaded = parse_text(text, b',', None).unwrap();
    assert!(check_columns(&loaded.headers).is_empty());

    let outcome = validate_rows(&loaded.rows);
    assert_eq!(outcome.accepted.len(), 2);
    assert_eq!(outcome.rejected.len(), 1);

    let rejected = &outcome.rejected[0];
    assert_eq!(rejected.line, 3);
    assert_eq!(rejected.reason(), BP_ORDER_REASON);
    assert_eq!(rejected.violations[0].code, ViolationCode::BloodPressureOrder);
    assert_eq!(
        outcome.accepted.iter().map(|r| r.line).collect::<Vec<_>>(),
        vec![2, 4]
    );
}

#[test]
fn range_and_order_violations_accumulate() {
    let row = RawRow::new(7)
        .with(Field::SystolicBp, "40")
        .with(Field::DiastolicBp, "60");
    let RowVerdict::Rejected(rejected) = validate_row(&row) else {
        panic!("expected rejection");
    };
    assert_eq!(
        rejected.reason(),
        "Systolic BP must be between 50 and 250, got 40; systolic < diastolic"
    );
}

#[test]
fn missing_tokens_count_as_absent() {
    let loaded = parse_text("systolic_bp,heart_rate\nNA,72\n", b',', None).unwrap();
    let outcome = validate_rows(&loaded.rows);
    assert_eq!(outcome.accepted[0].measurements.systolic_bp, None);
    assert_eq!(outcome.accepted[0].measurements.heart_rate, Some(72));
}

proptest! {
    #[test]
    fn in_bounds_rows_are_accepted_unchanged(
        age in 365i64..=36_500,
        height_tenths in 500i64..=2_500,
        diastolic in 30i64..=200,
        gap in 0i64..=50,
        heart_rate in 30i64..=220,
        temp_tenths in 300i64..=450,
        spo2 in 50i64..=100,
        cholesterol in 1i64..=3,
        smoking in any::<bool>(),
    ) {
        let systolic = (diastolic + gap).clamp(50, 250);
        prop_assume!(systolic >= diastolic);
        let height = height_tenths as f64 / 10.0;
        let temperature = temp_tenths as f64 / 10.0;

        let row = RawRow::new(2)
            .with(Field::Age, age.to_string())
            .with(Field::Height, height.to_string())
            .with(Field::SystolicBp, systolic.to_string())
            .with(Field::DiastolicBp, diastolic.to_string())
            .with(Field::HeartRate, heart_rate.to_string())
            .with(Field::BodyTemperature, temperature.to_string())
            .with(Field::OxygenSaturation, spo2.to_string())
            .with(Field::Cholesterol, cholesterol.to_string())
            .with(Field::Smoking, if smoking { "1" } else { "0" });

        let RowVerdict::Accepted(record) = validate_row(&row) else {
            return Err(TestCaseError::fail("in-bounds row rejected"));
        };
        prop_assert_eq!(record.demographics.age, Some(age));
        prop_assert_eq!(record.demographics.height, Some(height));
        prop_assert_eq!(record.measurements.systolic_bp, Some(systolic));
        prop_assert_eq!(record.measurements.diastolic_bp, Some(diastolic));
        prop_assert_eq!(record.measurements.heart_rate, Some(heart_rate));
        prop_assert_eq!(record.measurements.body_temperature, Some(temperature));
        prop_assert_eq!(record.measurements.oxygen_saturation, Some(spo2 as f64));
        prop_assert_eq!(record.measurements.cholesterol, Some(cholesterol));
        prop_assert_eq!(record.measurements.smoking, smoking);
    }

    #[test]
    fn systolic_below_diastolic_is_always_rejected(
        systolic in 50i64..=199,
        delta in 1i64..=150,
    ) {
        let diastolic = (systolic + delta).min(200);
        prop_assume!(systolic < diastolic);
        let row = RawRow::new(2)
            .with(Field::SystolicBp, systolic.to_string())
            .with(Field::DiastolicBp, diastolic.to_string());
        match validate_row(&row) {
            RowVerdict::Rejected(rejected) => {
                prop_assert!(rejected
                    .violations
                    .iter()
                    .any(|v| v.code == ViolationCode::BloodPressureOrder));
            }
            RowVerdict::Accepted(_) => prop_assert!(false, "inverted pressure accepted"),
        }
    }
}
