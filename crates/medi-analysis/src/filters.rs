//! Smoothing and cleaning filters for metric sequences.
//!
//! Sequences are `Option<f64>` slices; `None` is a missing value. Every filter
//! returns a sequence of the same length as its input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::stats::{mean, median, present, quantile_sorted, sorted, std_dev};

/// Scale factor relating the MAD to the standard deviation of a normal distribution.
const MODIFIED_Z_FACTOR: f64 = 0.6745;

/// Filtered values plus, per position, whether the original value was kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filtered {
    pub values: Vec<Option<f64>>,
    pub keep: Vec<bool>,
}

impl Filtered {
    pub fn removed(&self) -> usize {
        self.keep.iter().filter(|k| !**k).count()
    }
}

/// Moving average over `window` values.
///
/// Centered windows need an odd size, so an even `window` grows by one. Windows
/// are truncated at the edges and missing values are skipped; a window with no
/// present values yields `None`.
pub fn moving_average(data: &[Option<f64>], window: usize, centered: bool) -> Result<Vec<Option<f64>>> {
    if window == 0 {
        return Err(AnalysisError::InvalidWindow);
    }
    let mut window = window;
    if centered && window % 2 == 0 {
        warn!(window, "even window for centered moving average, using {}", window + 1);
        window += 1;
    }
    let n = data.len();
    let out = (0..n)
        .map(|i| {
            let (start, end) = if centered {
                let half = window / 2;
                (i.saturating_sub(half), (i + half).min(n.saturating_sub(1)))
            } else {
                (i.saturating_sub(window - 1), i)
            };
            let values = present(&data[start..=end]);
            mean(&values)
        })
        .collect();
    Ok(out)
}

/// What replaces a value that falls outside the threshold bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdReplacement {
    #[default]
    Missing,
    /// The bound that was crossed.
    Clamp,
    Value(f64),
}

/// Keep values inside `[min, max]`. Either bound may be absent.
///
/// With at least one bound, missing values are not kept.
pub fn threshold(
    data: &[Option<f64>],
    min: Option<f64>,
    max: Option<f64>,
    replace: ThresholdReplacement,
) -> Filtered {
    let unbounded = min.is_none() && max.is_none();
    let within = |v: f64| min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi);
    let mut values = Vec::with_capacity(data.len());
    let mut keep = Vec::with_capacity(data.len());
    for value in data {
        let kept = match value {
            Some(v) => within(*v),
            None => unbounded,
        };
        keep.push(kept);
        values.push(if kept {
            *value
        } else {
            match replace {
                ThresholdReplacement::Missing => None,
                ThresholdReplacement::Value(r) => Some(r),
                ThresholdReplacement::Clamp => value.map(|v| match (min, max) {
                    (Some(lo), _) if v < lo => lo,
                    (_, Some(hi)) if v > hi => hi,
                    _ => v,
                }),
            }
        });
    }
    Filtered { values, keep }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Outside `[Q1 - k·IQR, Q3 + k·IQR]`.
    #[default]
    Iqr,
    /// `|x - mean| / std > k` with the population std.
    ZScore,
    /// `|0.6745 (x - median) / MAD| > k`.
    ModifiedZScore,
}

impl OutlierMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::ZScore => "zscore",
            OutlierMethod::ModifiedZScore => "modified_zscore",
        }
    }

    /// Conventional threshold for the method.
    pub fn default_threshold(self) -> f64 {
        match self {
            OutlierMethod::Iqr => 1.5,
            OutlierMethod::ZScore => 3.0,
            OutlierMethod::ModifiedZScore => 3.5,
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z_score" => Ok(OutlierMethod::ZScore),
            "modified_zscore" | "modified_z_score" | "mad" => Ok(OutlierMethod::ModifiedZScore),
            _ => Err(AnalysisError::UnknownMethod {
                kind: "outlier method",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierReplacement {
    #[default]
    Missing,
    Mean,
    Median,
    Value(f64),
}

/// Remove outliers. Missing values are never kept.
///
/// When the spread is zero (std or MAD) nothing is considered an outlier and
/// the input is returned unchanged.
pub fn remove_outliers(
    data: &[Option<f64>],
    method: OutlierMethod,
    k: f64,
    replace: OutlierReplacement,
) -> Filtered {
    let valid = present(data);
    let unchanged = || Filtered {
        values: data.to_vec(),
        keep: vec![true; data.len()],
    };
    if valid.is_empty() {
        warn!("no valid values for outlier detection");
        return unchanged();
    }

    let inlier: Box<dyn Fn(f64) -> bool> = match method {
        OutlierMethod::Iqr => {
            let s = sorted(&valid);
            let (Some(q1), Some(q3)) = (quantile_sorted(&s, 0.25), quantile_sorted(&s, 0.75)) else {
                return unchanged();
            };
            let iqr = q3 - q1;
            let (lo, hi) = (q1 - k * iqr, q3 + k * iqr);
            Box::new(move |v| v >= lo && v <= hi)
        }
        OutlierMethod::ZScore => {
            let (Some(mu), Some(sd)) = (mean(&valid), std_dev(&valid, 0)) else {
                return unchanged();
            };
            if sd == 0.0 {
                warn!("standard deviation is 0, skipping z-score outlier removal");
                return unchanged();
            }
            Box::new(move |v| ((v - mu) / sd).abs() <= k)
        }
        OutlierMethod::ModifiedZScore => {
            let Some(med) = median(&valid) else {
                return unchanged();
            };
            let deviations: Vec<f64> = valid.iter().map(|v| (v - med).abs()).collect();
            let mad = median(&deviations).unwrap_or(0.0);
            if mad == 0.0 {
                warn!("MAD is 0, skipping modified z-score outlier removal");
                return unchanged();
            }
            Box::new(move |v| (MODIFIED_Z_FACTOR * (v - med) / mad).abs() <= k)
        }
    };

    let replacement = match replace {
        OutlierReplacement::Missing => None,
        OutlierReplacement::Mean => mean(&valid),
        OutlierReplacement::Median => median(&valid),
        OutlierReplacement::Value(v) => Some(v),
    };
    let keep: Vec<bool> = data
        .iter()
        .map(|v| v.is_some_and(|v| v.is_finite() && inlier(v)))
        .collect();
    let values = data
        .iter()
        .zip(&keep)
        .map(|(v, kept)| if *kept { *v } else { replacement })
        .collect();
    let filtered = Filtered { values, keep };
    debug!(method = %method, k, removed = filtered.removed(), "outliers removed");
    filtered
}

/// One step of a filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterStep {
    MovingAverage {
        window: usize,
        #[serde(default = "default_centered")]
        centered: bool,
    },
    Threshold {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        replace: ThresholdReplacement,
    },
    RemoveOutliers {
        #[serde(default)]
        method: OutlierMethod,
        #[serde(default)]
        threshold: Option<f64>,
        #[serde(default)]
        replace: OutlierReplacement,
    },
}

fn default_centered() -> bool {
    true
}

impl FilterStep {
    pub fn apply(&self, data: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
        match self {
            FilterStep::MovingAverage { window, centered } => moving_average(data, *window, *centered),
            FilterStep::Threshold { min, max, replace } => {
                Ok(threshold(data, *min, *max, *replace).values)
            }
            FilterStep::RemoveOutliers {
                method,
                threshold,
                replace,
            } => {
                let k = threshold.unwrap_or_else(|| method.default_threshold());
                Ok(remove_outliers(data, *method, k, *replace).values)
            }
        }
    }
}

/// Apply `steps` in order, each to the output of the previous one.
pub fn apply_chain(data: &[Option<f64>], steps: &[FilterStep]) -> Result<Vec<Option<f64>>> {
    let mut current = data.to_vec();
    for step in steps {
        current = step.apply(&current)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn centered_average_truncates_edges() {
        let out = moving_average(&some(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3, true).unwrap();
        assert_eq!(out, some(&[1.5, 2.0, 3.0, 4.0, 4.5]));
    }

    #[test]
    fn even_centered_window_grows_by_one() {
        let even = moving_average(&some(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2, true).unwrap();
        let odd = moving_average(&some(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3, true).unwrap();
        assert_eq!(even, odd);
    }

    #[test]
    fn trailing_average_skips_missing() {
        let out = moving_average(&[Some(2.0), None, Some(4.0), None], 2, false).unwrap();
        assert_eq!(out, vec![Some(2.0), Some(2.0), Some(4.0), Some(4.0)]);
        let gap = moving_average(&[None, None, Some(1.0)], 1, false).unwrap();
        assert_eq!(gap, vec![None, None, Some(1.0)]);
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(matches!(
            moving_average(&some(&[1.0]), 0, true),
            Err(AnalysisError::InvalidWindow)
        ));
    }

    #[test]
    fn threshold_replacements() {
        let data = [Some(50.0), Some(120.0), Some(300.0), None];
        let missing = threshold(&data, Some(60.0), Some(250.0), ThresholdReplacement::Missing);
        assert_eq!(missing.values, vec![None, Some(120.0), None, None]);
        assert_eq!(missing.keep, vec![false, true, false, false]);

        let clamped = threshold(&data, Some(60.0), Some(250.0), ThresholdReplacement::Clamp);
        assert_eq!(clamped.values, vec![Some(60.0), Some(120.0), Some(250.0), None]);

        let constant = threshold(&data, None, Some(250.0), ThresholdReplacement::Value(0.0));
        assert_eq!(constant.values, vec![Some(50.0), Some(120.0), Some(0.0), Some(0.0)]);

        let open = threshold(&data, None, None, ThresholdReplacement::Missing);
        assert_eq!(open.values, data.to_vec());
        assert_eq!(open.removed(), 0);
    }

    #[test]
    fn iqr_flags_the_spike() {
        let data = some(&[70.0, 72.0, 71.0, 73.0, 69.0, 200.0]);
        let out = remove_outliers(&data, OutlierMethod::Iqr, 1.5, OutlierReplacement::Median);
        assert_eq!(out.keep, vec![true, true, true, true, true, false]);
        assert_eq!(out.values[5], Some(71.5));
    }

    #[test]
    fn zscore_with_constant_input_is_a_no_op() {
        let data = some(&[5.0, 5.0, 5.0]);
        let out = remove_outliers(&data, OutlierMethod::ZScore, 3.0, OutlierReplacement::Missing);
        assert_eq!(out.values, data);
        assert!(out.keep.iter().all(|k| *k));
    }

    #[test]
    fn modified_zscore_uses_the_mad() {
        let data = some(&[10.0, 11.0, 9.0, 10.0, 10.0, 50.0]);
        let out = remove_outliers(
            &data,
            OutlierMethod::ModifiedZScore,
            3.5,
            OutlierReplacement::Value(-1.0),
        );
        assert_eq!(out.removed(), 1);
        assert_eq!(out.values[5], Some(-1.0));
    }

    #[test]
    fn outlier_methods_parse() {
        assert_eq!("iqr".parse::<OutlierMethod>().unwrap(), OutlierMethod::Iqr);
        assert_eq!("z-score".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert_eq!(
            "modified_zscore".parse::<OutlierMethod>().unwrap(),
            OutlierMethod::ModifiedZScore
        );
        assert!("kalman".parse::<OutlierMethod>().is_err());
    }

    #[test]
    fn chain_runs_steps_in_order() {
        let data = some(&[1.0, 2.0, 100.0, 2.0, 1.0]);
        let steps = [
            FilterStep::Threshold {
                min: None,
                max: Some(10.0),
                replace: ThresholdReplacement::Missing,
            },
            FilterStep::MovingAverage {
                window: 3,
                centered: true,
            },
        ];
        let out = apply_chain(&data, &steps).unwrap();
        assert_eq!(out, some(&[1.5, 1.5, 2.0, 1.5, 1.5]));
    }
}
