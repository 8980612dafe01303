//! Individual row and header checks.
//!
//! Each check returns the typed value on success or a [`Violation`] that
//! names the field and the broken rule. Checks never rewrite input.
//!
//! [`Violation`]: medi_model::Violation

pub mod blood_pressure;
pub mod columns;
pub mod flags;
pub mod numeric;
pub mod timestamp;
