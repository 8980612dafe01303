//! Header-level checks.

use std::collections::BTreeMap;

use medi_model::{Field, Violation, ViolationCode};

/// Report structural problems with a normalized header row.
pub fn check_columns(headers: &[String]) -> Vec<Violation> {
    let mut issues = Vec::new();
    let mut positions: BTreeMap<Field, Vec<&str>> = BTreeMap::new();
    for header in headers {
        if let Some(field) = Field::from_header(header) {
            positions.entry(field).or_default().push(header);
        }
    }

    if positions.is_empty() {
        issues.push(Violation::new(
            None,
            ViolationCode::NoKnownColumns,
            format!(
                "No recognised health-metric columns (found: {})",
                headers.join(", ")
            ),
        ));
    }
    for (field, sources) in positions {
        if sources.len() > 1 {
            issues.push(Violation::new(
                Some(field),
                ViolationCode::DuplicateColumn,
                format!(
                    "Columns {} all map to {field}; the first one is used",
                    sources.join(", ")
                ),
            ));
        }
    }
    issues
}
