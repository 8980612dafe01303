//! Range, integer and category checks driven by the rule table.

use medi_ingest::values::{format_numeric, parse_f64, parse_integral};
use medi_model::{Field, Gender, Violation, ViolationCode};

use crate::rules::{Rule, RuleKind};

/// Parse `raw` according to `rule` and check its bounds.
pub fn check(rule: &Rule, raw: &str) -> Result<f64, Violation> {
    let value = parse(rule, raw)?;
    if rule.contains(value) {
        return Ok(value);
    }
    let message = match rule.kind {
        RuleKind::Category(allowed) => format!(
            "{} must be one of {allowed:?}, got {}",
            rule.label,
            format_numeric(value)
        ),
        RuleKind::Integer | RuleKind::Decimal => {
            let unit = if rule.unit.is_empty() {
                String::new()
            } else {
                format!(" {}", rule.unit)
            };
            format!(
                "{} must be between {} and {}{unit}, got {}",
                rule.label,
                format_numeric(rule.min),
                format_numeric(rule.max),
                format_numeric(value)
            )
        }
    };
    let code = match rule.kind {
        RuleKind::Category(_) => ViolationCode::InvalidCategory,
        _ => ViolationCode::OutOfRange,
    };
    Err(Violation::new(Some(rule.field), code, message))
}

fn parse(rule: &Rule, raw: &str) -> Result<f64, Violation> {
    // Gender is also written as f/m/female/male.
    if rule.field == Field::Gender
        && let Ok(gender) = raw.parse::<Gender>()
    {
        return Ok(gender.code() as f64);
    }
    match rule.kind {
        RuleKind::Decimal => parse_f64(raw).ok_or_else(|| not_numeric(rule.field, rule.label, raw)),
        RuleKind::Integer | RuleKind::Category(_) => match parse_integral(raw) {
            Some(Ok(value)) => Ok(value as f64),
            Some(Err(_)) => Err(Violation::new(
                Some(rule.field),
                ViolationCode::NotInteger,
                format!("{} must be an integer, got {}", rule.label, raw.trim()),
            )),
            None => Err(not_numeric(rule.field, rule.label, raw)),
        },
    }
}

pub(crate) fn not_numeric(field: Field, label: &str, raw: &str) -> Violation {
    Violation::new(
        Some(field),
        ViolationCode::NotNumeric,
        format!("{label} must be a number, got '{}'", raw.trim()),
    )
}

/// Patient identifiers are non-negative integers.
pub fn check_patient_id(raw: &str) -> Result<i64, Violation> {
    match parse_integral(raw) {
        Some(Ok(id)) if id >= 0 => Ok(id),
        Some(Ok(id)) => Err(Violation::new(
            Some(Field::PatientId),
            ViolationCode::OutOfRange,
            format!("Patient id must not be negative, got {id}"),
        )),
        Some(Err(_)) => Err(Violation::new(
            Some(Field::PatientId),
            ViolationCode::NotInteger,
            format!("Patient id must be an integer, got {}", raw.trim()),
        )),
        None => Err(not_numeric(Field::PatientId, "Patient id", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::rule_for;

    fn rule(field: Field) -> &'static Rule {
        rule_for(field).unwrap()
    }

    #[test]
    fn out_of_range_message_names_bounds_and_unit() {
        let err = check(rule(Field::HeartRate), "250").unwrap_err();
        assert_eq!(err.code, ViolationCode::OutOfRange);
        assert_eq!(
            err.message,
            "Heart rate must be between 30 and 220 bpm, got 250"
        );
    }

    #[test]
    fn integer_fields_reject_fractions() {
        let err = check(rule(Field::SystolicBp), "120.5").unwrap_err();
        assert_eq!(err.code, ViolationCode::NotInteger);
        assert_eq!(check(rule(Field::SystolicBp), "120.0"), Ok(120.0));
    }

    #[test]
    fn decimals_keep_precision() {
        assert_eq!(check(rule(Field::BodyTemperature), "36.65"), Ok(36.65));
        let err = check(rule(Field::Weight), "heavy").unwrap_err();
        assert_eq!(err.code, ViolationCode::NotNumeric);
    }

    #[test]
    fn categories_report_allowed_values() {
        let err = check(rule(Field::Cholesterol), "4").unwrap_err();
        assert_eq!(err.code, ViolationCode::InvalidCategory);
        assert_eq!(err.message, "Cholesterol must be one of [1, 2, 3], got 4");
    }

    #[test]
    fn gender_accepts_codes_and_words() {
        assert_eq!(check(rule(Field::Gender), "2"), Ok(2.0));
        assert_eq!(check(rule(Field::Gender), "female"), Ok(1.0));
        assert!(check(rule(Field::Gender), "3").is_err());
    }

    #[test]
    fn patient_ids_are_non_negative_integers() {
        assert_eq!(check_patient_id("0"), Ok(0));
        assert!(check_patient_id("-1").is_err());
        assert!(check_patient_id("P-17").is_err());
    }
}
