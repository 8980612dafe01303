//! Numeric analysis of stored health metrics.
//!
//! Everything here works on `Option<f64>` sequences, with `None` marking a
//! missing value, or on the polars frame built by [`metrics_frame`].

pub mod correlation;
pub mod error;
pub mod filters;
pub mod frame;
pub mod stats;
pub mod time_series;

pub use correlation::{
    Correlation, CorrelationMatrix, MetricCorrelation, analyze_pair, correlate, correlation_matrix,
    correlation_summary, pearson, spearman,
};
pub use error::{AnalysisError, Result};
pub use filters::{
    FilterStep, Filtered, OutlierMethod, OutlierReplacement, ThresholdReplacement, apply_chain,
    moving_average, remove_outliers, threshold,
};
pub use frame::{DEFAULT_MATRIX_COLUMNS, measurement_value, metrics_frame, numeric_column};
pub use stats::{Summary, describe};
pub use time_series::{
    Aggregation, AnomalyMethod, ResamplePeriod, SeriesReport, Trend, analyze_patient_series,
    analyze_points, detect_anomalies, linear_trend, mean_change, patient_series, rate_of_change,
    resample, rolling_mean,
};
