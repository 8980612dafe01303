//! Medical value bounds.

use medi_model::Field;

/// How a numeric cell is interpreted before its bounds are checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleKind {
    /// Whole number; integral floats such as `120.0` are accepted.
    Integer,
    Decimal,
    /// Whole number drawn from a fixed set.
    Category(&'static [i64]),
}

/// Bounds for one numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub field: Field,
    /// Human-readable name used in messages.
    pub label: &'static str,
    pub kind: RuleKind,
    pub min: f64,
    pub max: f64,
    /// Unit suffix for messages, may be empty.
    pub unit: &'static str,
}

impl Rule {
    const fn bounded(
        field: Field,
        label: &'static str,
        kind: RuleKind,
        min: f64,
        max: f64,
        unit: &'static str,
    ) -> Self {
        Self {
            field,
            label,
            kind,
            min,
            max,
            unit,
        }
    }

    const fn category(field: Field, label: &'static str, allowed: &'static [i64]) -> Self {
        Self {
            field,
            label,
            kind: RuleKind::Category(allowed),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            unit: "",
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        match self.kind {
            RuleKind::Category(allowed) => allowed.iter().any(|a| *a as f64 == value),
            RuleKind::Integer | RuleKind::Decimal => value >= self.min && value <= self.max,
        }
    }
}

pub const GENDER_CODES: &[i64] = &[1, 2];
pub const LEVEL_CODES: &[i64] = &[1, 2, 3];

pub const RULES: [Rule; 11] = [
    Rule::bounded(Field::Age, "Age", RuleKind::Integer, 365.0, 36_500.0, "days"),
    Rule::bounded(Field::Height, "Height", RuleKind::Decimal, 50.0, 250.0, "cm"),
    Rule::bounded(Field::Weight, "Weight", RuleKind::Decimal, 2.0, 300.0, "kg"),
    Rule::category(Field::Gender, "Gender", GENDER_CODES),
    Rule::bounded(Field::SystolicBp, "Systolic BP", RuleKind::Integer, 50.0, 250.0, ""),
    Rule::bounded(Field::DiastolicBp, "Diastolic BP", RuleKind::Integer, 30.0, 200.0, ""),
    Rule::bounded(Field::HeartRate, "Heart rate", RuleKind::Integer, 30.0, 220.0, "bpm"),
    Rule::bounded(Field::BodyTemperature, "Body temperature", RuleKind::Decimal, 30.0, 45.0, "°C"),
    Rule::bounded(
        Field::OxygenSaturation,
        "Oxygen saturation",
        RuleKind::Decimal,
        50.0,
        100.0,
        "%",
    ),
    Rule::category(Field::Cholesterol, "Cholesterol", LEVEL_CODES),
    Rule::category(Field::Glucose, "Glucose", LEVEL_CODES),
];

/// Yes/no flags.
pub const BOOLEAN_FIELDS: [Field; 4] = [
    Field::Smoking,
    Field::AlcoholIntake,
    Field::PhysicalActivity,
    Field::CardiovascularDisease,
];

pub fn rule_for(field: Field) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.field == field)
}
