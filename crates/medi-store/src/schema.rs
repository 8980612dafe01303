//! Table definitions.
//!
//! Every child table references its parent with `ON DELETE CASCADE`, so
//! deleting a patient removes its metrics, images and signals, and deleting a
//! signal removes its spectrum analyses. Foreign keys are only enforced when
//! the connection enables them, see [`configure`].

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Table names in dependency order.
pub const TABLES: [&str; 6] = [
    "patients",
    "health_metrics",
    "medical_images",
    "biomedical_signals",
    "correlation_results",
    "spectrum_analysis",
];

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS patients (
    patient_id  INTEGER PRIMARY KEY,
    name        TEXT,
    age         INTEGER NOT NULL,
    gender      INTEGER NOT NULL CHECK (gender IN (1, 2)),
    height      REAL NOT NULL,
    weight      REAL NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS health_metrics (
    metric_id               INTEGER PRIMARY KEY,
    patient_id              INTEGER NOT NULL
                            REFERENCES patients(patient_id) ON DELETE CASCADE,
    timestamp               TEXT NOT NULL,
    systolic_bp             INTEGER,
    diastolic_bp            INTEGER,
    heart_rate              INTEGER,
    body_temperature        REAL,
    oxygen_saturation       REAL,
    cholesterol             INTEGER,
    glucose                 INTEGER,
    smoking                 INTEGER NOT NULL DEFAULT 0,
    alcohol_intake          INTEGER NOT NULL DEFAULT 0,
    physical_activity       INTEGER NOT NULL DEFAULT 0,
    cardiovascular_disease  INTEGER,
    created_at              TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_health_metrics_patient_time
    ON health_metrics(patient_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_health_metrics_time ON health_metrics(timestamp);

CREATE TABLE IF NOT EXISTS medical_images (
    image_id           INTEGER PRIMARY KEY,
    patient_id         INTEGER REFERENCES patients(patient_id) ON DELETE CASCADE,
    filename           TEXT NOT NULL,
    image_path         TEXT NOT NULL,
    image_type         TEXT,
    processing_method  TEXT,
    original_filename  TEXT,
    file_size          INTEGER,
    width              INTEGER,
    height             INTEGER,
    upload_date        TEXT NOT NULL,
    notes              TEXT
);

CREATE TABLE IF NOT EXISTS biomedical_signals (
    signal_id           INTEGER PRIMARY KEY,
    patient_id          INTEGER REFERENCES patients(patient_id) ON DELETE CASCADE,
    signal_type         TEXT NOT NULL,
    signal_data_path    TEXT NOT NULL,
    sampling_rate       REAL,
    duration            REAL,
    number_of_channels  INTEGER,
    timestamp           TEXT NOT NULL,
    notes               TEXT
);

CREATE TABLE IF NOT EXISTS correlation_results (
    correlation_id     INTEGER PRIMARY KEY,
    metric1            TEXT NOT NULL,
    metric2            TEXT NOT NULL,
    correlation_value  REAL NOT NULL,
    correlation_type   TEXT NOT NULL DEFAULT 'pearson',
    sample_size        INTEGER,
    p_value            REAL,
    timestamp          TEXT NOT NULL,
    notes              TEXT
);

CREATE TABLE IF NOT EXISTS spectrum_analysis (
    analysis_id           INTEGER PRIMARY KEY,
    signal_id             INTEGER NOT NULL
                          REFERENCES biomedical_signals(signal_id) ON DELETE CASCADE,
    frequency_data_path   TEXT NOT NULL,
    fft_size              INTEGER,
    frequency_resolution  REAL,
    dominant_frequency    REAL,
    power_spectrum_path   TEXT,
    timestamp             TEXT NOT NULL,
    notes                 TEXT
);
";

/// Per-connection settings.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Create any missing tables and indexes.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    debug!("schema ready");
    Ok(())
}

/// Row count of every table, in [`TABLES`] order.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    TABLES
        .iter()
        .map(|table| {
            let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
            Ok((*table, count))
        })
        .collect()
}
