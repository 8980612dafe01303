//! Descriptive statistics over sequences with missing values.

use serde::Serialize;

/// Values that are present and finite.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` degrees of freedom removed (0 population, 1 sample).
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let mean = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

/// Quantile `q` in `[0, 1]` of already sorted values, linearly interpolated.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted(values), 0.5)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with a single value.
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Describe the present values, or `None` when there are none.
pub fn describe(values: &[Option<f64>]) -> Option<Summary> {
    let data = sorted(&present(values));
    let (&min, &max) = (data.first()?, data.last()?);
    Some(Summary {
        count: data.len(),
        mean: mean(&data)?,
        std: std_dev(&data, 1),
        min,
        q1: quantile_sorted(&data, 0.25)?,
        median: quantile_sorted(&data, 0.5)?,
        q3: quantile_sorted(&data, 0.75)?,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_skips_missing_values() {
        let summary = describe(&[Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)]).unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 2.5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.q1, 1.75);
        assert_eq!(summary.q3, 3.25);
        let std = summary.std.unwrap();
        assert!((std - 1.290_994_448_735_805_6).abs() < 1e-12);
    }

    #[test]
    fn describe_empty_and_single() {
        assert!(describe(&[None, None]).is_none());
        let one = describe(&[Some(7.0)]).unwrap();
        assert_eq!(one.std, None);
        assert_eq!(one.median, 7.0);
    }

    #[test]
    fn population_and_sample_std_differ() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(std_dev(&data, 0), Some(2.0));
        assert!(std_dev(&data, 1).unwrap() > 2.0);
    }
}
