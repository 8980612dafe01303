//! Validation of imported health-metric rows.

pub mod checks;
pub mod rules;
pub mod validator;

pub use checks::blood_pressure::BP_ORDER_REASON;
pub use checks::columns::check_columns;
pub use rules::{BOOLEAN_FIELDS, RULES, Rule, RuleKind, rule_for};
pub use validator::{RowVerdict, ValidationOutcome, all_violations, validate_row, validate_rows};
