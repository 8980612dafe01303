//! Biomedical signal metadata and the spectrum analyses run over them.

use rusqlite::{Connection, OptionalExtension, Row, params};

use medi_model::{BiomedicalSignal, NewBiomedicalSignal, NewSpectrumAnalysis, SpectrumAnalysis};

use crate::error::{Result, StoreError};
use crate::sql::{self, format_ts};

const SIGNAL_COLUMNS: &str = "signal_id, patient_id, signal_type, signal_data_path, sampling_rate, \
     duration, number_of_channels, timestamp, notes";

const ANALYSIS_COLUMNS: &str = "analysis_id, signal_id, frequency_data_path, fft_size, \
     frequency_resolution, dominant_frequency, power_spectrum_path, timestamp, notes";

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<BiomedicalSignal> {
    Ok(BiomedicalSignal {
        signal_id: row.get(0)?,
        patient_id: row.get(1)?,
        signal_type: row.get(2)?,
        signal_data_path: row.get(3)?,
        sampling_rate: row.get(4)?,
        duration: row.get(5)?,
        number_of_channels: row.get(6)?,
        timestamp: sql::timestamp(row, 7)?,
        notes: row.get(8)?,
    })
}

fn analysis_from_row(row: &Row<'_>) -> rusqlite::Result<SpectrumAnalysis> {
    Ok(SpectrumAnalysis {
        analysis_id: row.get(0)?,
        signal_id: row.get(1)?,
        frequency_data_path: row.get(2)?,
        fft_size: row.get(3)?,
        frequency_resolution: row.get(4)?,
        dominant_frequency: row.get(5)?,
        power_spectrum_path: row.get(6)?,
        timestamp: sql::timestamp(row, 7)?,
        notes: row.get(8)?,
    })
}

pub fn insert_signal(conn: &Connection, signal: &NewBiomedicalSignal) -> Result<i64> {
    conn.execute(
        "INSERT INTO biomedical_signals (patient_id, signal_type, signal_data_path, sampling_rate,
             duration, number_of_channels, timestamp, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            signal.patient_id,
            signal.signal_type,
            signal.signal_data_path,
            signal.sampling_rate,
            signal.duration,
            signal.number_of_channels,
            format_ts(&sql::now()),
            signal.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_signal(conn: &Connection, signal_id: i64) -> Result<Option<BiomedicalSignal>> {
    let signal = conn
        .query_row(
            &format!("SELECT {SIGNAL_COLUMNS} FROM biomedical_signals WHERE signal_id = ?1"),
            params![signal_id],
            signal_from_row,
        )
        .optional()?;
    Ok(signal)
}

/// Signals, optionally restricted to one patient and/or type. Newest first.
pub fn list_signals(
    conn: &Connection,
    patient_id: Option<i64>,
    signal_type: Option<&str>,
) -> Result<Vec<BiomedicalSignal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SIGNAL_COLUMNS} FROM biomedical_signals
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR signal_type = ?2)
         ORDER BY timestamp DESC, signal_id DESC"
    ))?;
    let rows = stmt
        .query_map(params![patient_id, signal_type], signal_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_signal(conn: &Connection, signal_id: i64) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM biomedical_signals WHERE signal_id = ?1",
        params![signal_id],
    )?;
    if changed == 0 {
        return Err(StoreError::SignalNotFound(signal_id));
    }
    Ok(())
}

pub fn insert_analysis(conn: &Connection, analysis: &NewSpectrumAnalysis) -> Result<i64> {
    if get_signal(conn, analysis.signal_id)?.is_none() {
        return Err(StoreError::SignalNotFound(analysis.signal_id));
    }
    conn.execute(
        "INSERT INTO spectrum_analysis (signal_id, frequency_data_path, fft_size,
             frequency_resolution, dominant_frequency, power_spectrum_path, timestamp, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            analysis.signal_id,
            analysis.frequency_data_path,
            analysis.fft_size,
            analysis.frequency_resolution,
            analysis.dominant_frequency,
            analysis.power_spectrum_path,
            format_ts(&sql::now()),
            analysis.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Analyses of one signal, newest first.
pub fn analyses_for_signal(conn: &Connection, signal_id: i64) -> Result<Vec<SpectrumAnalysis>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM spectrum_analysis WHERE signal_id = ?1
         ORDER BY timestamp DESC, analysis_id DESC"
    ))?;
    let rows = stmt
        .query_map(params![signal_id], analysis_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
