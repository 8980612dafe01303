//! Medical image metadata. Pixel data stays on disk.

use rusqlite::{Connection, OptionalExtension, Row, params};

use medi_model::{MedicalImage, NewMedicalImage};

use crate::error::Result;
use crate::sql::{self, format_ts};

const COLUMNS: &str = "image_id, patient_id, filename, image_path, image_type, processing_method, \
     original_filename, file_size, width, height, upload_date, notes";

fn from_row(row: &Row<'_>) -> rusqlite::Result<MedicalImage> {
    Ok(MedicalImage {
        image_id: row.get(0)?,
        patient_id: row.get(1)?,
        filename: row.get(2)?,
        image_path: row.get(3)?,
        image_type: row.get(4)?,
        processing_method: row.get(5)?,
        original_filename: row.get(6)?,
        file_size: row.get(7)?,
        width: row.get(8)?,
        height: row.get(9)?,
        upload_date: sql::timestamp(row, 10)?,
        notes: row.get(11)?,
    })
}

pub fn insert(conn: &Connection, image: &NewMedicalImage) -> Result<i64> {
    conn.execute(
        "INSERT INTO medical_images (patient_id, filename, image_path, image_type,
             processing_method, original_filename, file_size, width, height, upload_date, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            image.patient_id,
            image.filename,
            image.image_path,
            image.image_type,
            image.processing_method,
            image.original_filename,
            image.file_size,
            image.width,
            image.height,
            format_ts(&sql::now()),
            image.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, image_id: i64) -> Result<Option<MedicalImage>> {
    let image = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM medical_images WHERE image_id = ?1"),
            params![image_id],
            from_row,
        )
        .optional()?;
    Ok(image)
}

/// Images of one patient, or every image when `patient_id` is `None`. Newest first.
pub fn list(conn: &Connection, patient_id: Option<i64>) -> Result<Vec<MedicalImage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM medical_images
         WHERE ?1 IS NULL OR patient_id = ?1
         ORDER BY upload_date DESC, image_id DESC"
    ))?;
    let rows = stmt
        .query_map(params![patient_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, image_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM medical_images WHERE image_id = ?1",
        params![image_id],
    )?;
    Ok(changed > 0)
}
