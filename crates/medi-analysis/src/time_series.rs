//! Trends, anomalies and resampling of per-patient metric series.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use medi_model::{Field, HealthMetric};

use crate::error::{AnalysisError, Result};
use crate::frame::measurement_value;
use crate::stats::{Summary, describe, mean, median, present, quantile_sorted, sorted, std_dev};

/// Least-squares line through the present values against their position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    /// Mean of consecutive differences.
    pub mean_change: f64,
}

/// Fit a trend. Fewer than two present values give an all-zero trend.
pub fn linear_trend(values: &[Option<f64>]) -> Trend {
    let y = present(values);
    if y.len() < 2 {
        return Trend::default();
    }
    let n = y.len() as f64;
    let sum_x: f64 = (0..y.len()).map(|i| i as f64).sum();
    let sum_x2: f64 = (0..y.len()).map(|i| (i as f64).powi(2)).sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = y.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let denominator = n * sum_x2 - sum_x * sum_x;
    let y_mean = sum_y / n;
    let (slope, intercept) = if denominator == 0.0 {
        (0.0, y_mean)
    } else {
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        (slope, (sum_y - slope * sum_x) / n)
    };
    let ss_res: f64 = y
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (slope * i as f64 + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    Trend {
        slope,
        intercept,
        r_squared: if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot },
        mean: y_mean,
        std: std_dev(&y, 0).unwrap_or(0.0),
        mean_change: mean_change(values),
    }
}

/// Mean of consecutive differences between present values.
pub fn mean_change(values: &[Option<f64>]) -> f64 {
    let y = present(values);
    let diffs: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
    mean(&diffs).unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    /// `|x - mean| / std > k` with the sample std.
    #[default]
    ZScore,
    /// Outside `[Q1 - k·IQR, Q3 + k·IQR]`.
    Iqr,
}

impl AnomalyMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyMethod::ZScore => "zscore",
            AnomalyMethod::Iqr => "iqr",
        }
    }
}

impl fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zscore" | "z-score" | "z_score" => Ok(AnomalyMethod::ZScore),
            "iqr" => Ok(AnomalyMethod::Iqr),
            _ => Err(AnalysisError::UnknownMethod {
                kind: "anomaly method",
                value: s.to_string(),
            }),
        }
    }
}

/// Positions flagged as anomalous. Missing values are never flagged.
pub fn detect_anomalies(values: &[Option<f64>], method: AnomalyMethod, k: f64) -> Vec<bool> {
    let none = vec![false; values.len()];
    let valid = present(values);
    if valid.len() < 3 {
        return none;
    }
    let is_anomaly: Box<dyn Fn(f64) -> bool> = match method {
        AnomalyMethod::ZScore => {
            let (Some(mu), Some(sd)) = (mean(&valid), std_dev(&valid, 1)) else {
                return none;
            };
            if sd == 0.0 {
                return none;
            }
            Box::new(move |v| ((v - mu) / sd).abs() > k)
        }
        AnomalyMethod::Iqr => {
            let s = sorted(&valid);
            let (Some(q1), Some(q3)) = (quantile_sorted(&s, 0.25), quantile_sorted(&s, 0.75)) else {
                return none;
            };
            let iqr = q3 - q1;
            Box::new(move |v| v < q1 - k * iqr || v > q3 + k * iqr)
        }
    };
    values
        .iter()
        .map(|v| v.is_some_and(|v| v.is_finite() && is_anomaly(v)))
        .collect()
}

/// Percent change against the value `period` positions earlier.
pub fn rate_of_change(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let prev = values.get(i.checked_sub(period.max(1))?).copied().flatten()?;
            let cur = values[i]?;
            (prev != 0.0).then(|| (cur - prev) / prev * 100.0)
        })
        .collect()
}

/// Trailing rolling mean over `window` present values.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    crate::filters::moving_average(values, window, false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplePeriod {
    Hour,
    Day,
    Week,
    Month,
}

impl ResamplePeriod {
    /// Start of the bucket containing `ts`. Weeks start on Monday.
    pub fn bucket(self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        let midnight = |d: NaiveDate| d.and_time(chrono::NaiveTime::MIN);
        match self {
            ResamplePeriod::Hour => ts
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts),
            ResamplePeriod::Day => midnight(date),
            ResamplePeriod::Week => {
                midnight(date - Duration::days(i64::from(date.weekday().num_days_from_monday())))
            }
            ResamplePeriod::Month => midnight(date.with_day(1).unwrap_or(date)),
        }
    }
}

impl FromStr for ResamplePeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "hour" => Ok(ResamplePeriod::Hour),
            "d" | "day" => Ok(ResamplePeriod::Day),
            "w" | "week" => Ok(ResamplePeriod::Week),
            "m" | "month" => Ok(ResamplePeriod::Month),
            _ => Err(AnalysisError::UnknownMethod {
                kind: "resample period",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    Median,
}

impl Aggregation {
    fn apply(self, values: &[f64]) -> Option<f64> {
        match self {
            Aggregation::Mean => mean(values),
            Aggregation::Sum => (!values.is_empty()).then(|| values.iter().sum()),
            Aggregation::Min => values.iter().copied().reduce(f64::min),
            Aggregation::Max => values.iter().copied().reduce(f64::max),
            Aggregation::Median => median(values),
        }
    }
}

/// Aggregate timestamped values into calendar buckets. Only buckets holding
/// at least one present value are returned, in time order.
pub fn resample(
    points: &[(NaiveDateTime, Option<f64>)],
    period: ResamplePeriod,
    aggregation: Aggregation,
) -> Vec<(NaiveDateTime, f64)> {
    let mut buckets: BTreeMap<NaiveDateTime, Vec<f64>> = BTreeMap::new();
    for (ts, value) in points {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            buckets.entry(period.bucket(*ts)).or_default().push(v);
        }
    }
    buckets
        .into_iter()
        .filter_map(|(ts, values)| aggregation.apply(&values).map(|v| (ts, v)))
        .collect()
}

/// One measurement of one patient over time, oldest first.
pub fn patient_series(
    metrics: &[HealthMetric],
    patient_id: i64,
    field: Field,
) -> Vec<(NaiveDateTime, Option<f64>)> {
    let mut points: Vec<(NaiveDateTime, Option<f64>)> = metrics
        .iter()
        .filter(|m| m.patient_id == patient_id)
        .map(|m| (m.timestamp, measurement_value(&m.measurements, field)))
        .collect();
    points.sort_by_key(|(ts, _)| *ts);
    points
}

/// Statistics, trend and anomalies for one patient's measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub patient_id: i64,
    pub metric: Field,
    pub data_points: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub statistics: Option<Summary>,
    pub trend: Trend,
    pub anomalies: Vec<(NaiveDateTime, f64)>,
}

pub fn analyze_patient_series(
    metrics: &[HealthMetric],
    patient_id: i64,
    field: Field,
    method: AnomalyMethod,
    k: f64,
) -> SeriesReport {
    let points = patient_series(metrics, patient_id, field);
    analyze_points(patient_id, field, &points, method, k)
}

/// Same as [`analyze_patient_series`] for points already extracted (and
/// possibly filtered) by the caller. Points must be ordered by time.
pub fn analyze_points(
    patient_id: i64,
    field: Field,
    points: &[(NaiveDateTime, Option<f64>)],
    method: AnomalyMethod,
    k: f64,
) -> SeriesReport {
    let values: Vec<Option<f64>> = points.iter().map(|(_, v)| *v).collect();
    let flags = detect_anomalies(&values, method, k);
    let anomalies = points
        .iter()
        .zip(&flags)
        .filter(|(_, flagged)| **flagged)
        .filter_map(|((ts, v), _)| v.map(|v| (*ts, v)))
        .collect();
    SeriesReport {
        patient_id,
        metric: field,
        data_points: points.len(),
        first: points.first().map(|(ts, _)| *ts),
        last: points.last().map(|(ts, _)| *ts),
        statistics: describe(&values),
        trend: linear_trend(&values),
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn trend_of_a_line_is_exact() {
        let trend = linear_trend(&some(&[1.0, 3.0, 5.0, 7.0]));
        assert_eq!(trend.slope, 2.0);
        assert_eq!(trend.intercept, 1.0);
        assert_eq!(trend.r_squared, 1.0);
        assert_eq!(trend.mean_change, 2.0);
        assert_eq!(trend.mean, 4.0);
    }

    #[test]
    fn short_series_have_a_flat_trend() {
        assert_eq!(linear_trend(&[Some(5.0), None]), Trend::default());
        let flat = linear_trend(&some(&[4.0, 4.0, 4.0]));
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_squared, 0.0);
    }

    #[test]
    fn zscore_anomalies_need_three_points() {
        assert_eq!(
            detect_anomalies(&some(&[1.0, 100.0]), AnomalyMethod::ZScore, 1.0),
            vec![false, false]
        );
        let data = some(&[10.0, 11.0, 9.0, 10.0, 10.0, 11.0, 9.0, 40.0]);
        let flags = detect_anomalies(&data, AnomalyMethod::ZScore, 2.0);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        assert!(flags[7]);
    }

    #[test]
    fn iqr_anomalies_ignore_missing() {
        let data = [Some(1.0), Some(2.0), None, Some(3.0), Some(2.0), Some(30.0)];
        let flags = detect_anomalies(&data, AnomalyMethod::Iqr, 1.5);
        assert_eq!(flags, vec![false, false, false, false, false, true]);
    }

    #[test]
    fn rate_of_change_in_percent() {
        let out = rate_of_change(&[Some(100.0), Some(110.0), None, Some(121.0), Some(0.0)], 1);
        assert_eq!(out, vec![None, Some(10.0), None, None, Some(-100.0)]);
        let two = rate_of_change(&some(&[50.0, 60.0, 75.0]), 2);
        assert_eq!(two, vec![None, None, Some(50.0)]);
    }

    #[test]
    fn daily_resample_averages_each_day() {
        let points = [
            (ts("2024-01-01 08:00:00"), Some(120.0)),
            (ts("2024-01-01 20:00:00"), Some(130.0)),
            (ts("2024-01-03 09:00:00"), Some(110.0)),
            (ts("2024-01-04 09:00:00"), None),
        ];
        let daily = resample(&points, ResamplePeriod::Day, Aggregation::Mean);
        assert_eq!(
            daily,
            vec![
                (ts("2024-01-01 00:00:00"), 125.0),
                (ts("2024-01-03 00:00:00"), 110.0),
            ]
        );
        let weekly = resample(&points, ResamplePeriod::Week, Aggregation::Max);
        assert_eq!(weekly, vec![(ts("2024-01-01 00:00:00"), 130.0)]);
    }

    #[test]
    fn periods_parse() {
        assert_eq!("D".parse::<ResamplePeriod>().unwrap(), ResamplePeriod::Day);
        assert!("fortnight".parse::<ResamplePeriod>().is_err());
    }
}
