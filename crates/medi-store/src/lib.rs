//! SQLite persistence for patients, health metrics, images, signals and
//! analysis results.

pub mod correlations;
pub mod error;
pub mod images;
pub mod metrics;
pub mod patients;
pub mod query;
pub mod schema;
pub mod signals;
mod sql;
mod store;

pub use error::{Result, StoreError};
pub use query::{MetricFilter, PatientFilter, PatientWithMetrics, SummaryStatistics};
pub use schema::TABLES;
pub use store::Store;
