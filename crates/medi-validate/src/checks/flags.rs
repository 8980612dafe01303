use medi_ingest::values::parse_bool;
use medi_model::{Field, Violation, ViolationCode};

pub fn check(field: Field, raw: &str) -> Result<bool, Violation> {
    parse_bool(raw).ok_or_else(|| {
        Violation::new(
            Some(field),
            ViolationCode::InvalidBoolean,
            format!(
                "{field} must be 0/1, true/false or yes/no, got '{}'",
                raw.trim()
            ),
        )
    })
}
