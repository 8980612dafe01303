use medi_model::{Violation, ViolationCode};

/// Reason recorded when systolic pressure is below diastolic pressure.
pub const BP_ORDER_REASON: &str = "systolic < diastolic";

pub fn check(systolic: Option<i64>, diastolic: Option<i64>) -> Option<Violation> {
    match (systolic, diastolic) {
        (Some(sys), Some(dia)) if sys < dia => Some(Violation::new(
            None,
            ViolationCode::BloodPressureOrder,
            BP_ORDER_REASON,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_pressures_pass() {
        assert!(check(Some(90), Some(90)).is_none());
        assert!(check(Some(80), None).is_none());
        assert_eq!(
            check(Some(80), Some(120)).map(|v| v.message),
            Some(BP_ORDER_REASON.to_string())
        );
    }
}
