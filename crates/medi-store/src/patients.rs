//! Patient repository.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use medi_model::{Demographics, NewPatient, Patient};

use crate::error::{Result, StoreError};
use crate::sql::{self, format_ts};

pub(crate) const COLUMNS: &str =
    "patient_id, name, age, gender, height, weight, created_at, updated_at";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        patient_id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: sql::gender(row, 3)?,
        height: row.get(4)?,
        weight: row.get(5)?,
        created_at: sql::timestamp(row, 6)?,
        updated_at: sql::timestamp(row, 7)?,
    })
}

/// Insert a patient, honouring an explicit `patient_id`. Returns the id.
pub fn insert(conn: &Connection, patient: &NewPatient) -> Result<i64> {
    let now = format_ts(&sql::now());
    conn.execute(
        "INSERT INTO patients (patient_id, name, age, gender, height, weight, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            patient.patient_id,
            patient.name,
            patient.age,
            patient.gender.code(),
            patient.height,
            patient.weight,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(patient_id = id, "patient inserted");
    Ok(id)
}

pub fn get(conn: &Connection, patient_id: i64) -> Result<Option<Patient>> {
    let patient = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM patients WHERE patient_id = ?1"),
            params![patient_id],
            from_row,
        )
        .optional()?;
    Ok(patient)
}

pub fn exists(conn: &Connection, patient_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM patients WHERE patient_id = ?1",
            params![patient_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Overwrite the demographic fields of an existing patient.
pub fn update(conn: &Connection, patient_id: i64, patient: &NewPatient) -> Result<()> {
    let changed = conn.execute(
        "UPDATE patients
         SET name = ?2, age = ?3, gender = ?4, height = ?5, weight = ?6, updated_at = ?7
         WHERE patient_id = ?1",
        params![
            patient_id,
            patient.name,
            patient.age,
            patient.gender.code(),
            patient.height,
            patient.weight,
            format_ts(&sql::now()),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::PatientNotFound(patient_id));
    }
    Ok(())
}

/// Delete a patient and, through the cascade, everything attached to it.
pub fn delete(conn: &Connection, patient_id: i64) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM patients WHERE patient_id = ?1",
        params![patient_id],
    )?;
    if changed == 0 {
        return Err(StoreError::PatientNotFound(patient_id));
    }
    debug!(patient_id, "patient deleted");
    Ok(())
}

/// Lowest patient id whose demographics match exactly.
///
/// Every demographic field must be present; a partial set never matches.
pub fn find_by_demographics(conn: &Connection, demographics: &Demographics) -> Result<Option<i64>> {
    let Some(patient) = demographics.to_new_patient(None) else {
        return Ok(None);
    };
    let id = conn
        .query_row(
            "SELECT patient_id FROM patients
             WHERE name IS ?1 AND age = ?2 AND gender = ?3 AND height = ?4 AND weight = ?5
             ORDER BY patient_id LIMIT 1",
            params![
                patient.name,
                patient.age,
                patient.gender.code(),
                patient.height,
                patient.weight,
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}
