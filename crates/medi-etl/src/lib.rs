//! Import of health-metric files into the store and CSV export back out.

pub mod error;
pub mod exporter;
pub mod importer;

pub use error::{EtlError, Result};
pub use exporter::{ExportSummary, export_combined, export_metrics, export_patients};
pub use importer::{
    ChunkFailure, ImportCounts, ImportProgress, ImportReport, Importer, RowError,
};
