//! Pearson and Spearman correlation with two-sided p-values.
//!
//! Only positions where both values are present take part (pairwise-complete
//! observations). The p-value comes from Student's t with `n - 2` degrees of
//! freedom, for both methods.

use polars::prelude::DataFrame;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use medi_model::{CorrelationMethod, NewCorrelationResult};

use crate::error::{AnalysisError, Result};
use crate::frame::{DEFAULT_MATRIX_COLUMNS, has_column, numeric_column};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub method: CorrelationMethod,
    pub coefficient: f64,
    pub p_value: f64,
    pub sample_size: usize,
}

/// A correlation between two named metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCorrelation {
    pub metric1: String,
    pub metric2: String,
    #[serde(flatten)]
    pub correlation: Correlation,
}

impl MetricCorrelation {
    /// Insert form for the `correlation_results` table.
    pub fn to_record(&self, notes: Option<String>) -> NewCorrelationResult {
        NewCorrelationResult {
            metric1: self.metric1.clone(),
            metric2: self.metric2.clone(),
            correlation_value: self.correlation.coefficient,
            correlation_type: self.correlation.method,
            sample_size: i64::try_from(self.correlation.sample_size).ok(),
            p_value: Some(self.correlation.p_value).filter(|p| p.is_finite()),
            notes,
        }
    }
}

fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
    if x.len() != y.len() {
        return Err(AnalysisError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .unzip();
    if xs.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            found: xs.len(),
        });
    }
    Ok((xs, ys))
}

fn pearson_r(x: &[f64], y: &[f64]) -> Result<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(AnalysisError::ConstantInput);
    }
    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// 1-based ranks; ties share the average of the ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for idx in &order[start..=end] {
            ranks[*idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

/// Two-sided p-value of `r` over `n` observations.
fn p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Result<Correlation> {
    let (xs, ys) = complete_pairs(x, y)?;
    let r = pearson_r(&xs, &ys)?;
    Ok(Correlation {
        method: CorrelationMethod::Pearson,
        coefficient: r,
        p_value: p_value(r, xs.len()),
        sample_size: xs.len(),
    })
}

/// Pearson correlation of the average ranks.
pub fn spearman(x: &[Option<f64>], y: &[Option<f64>]) -> Result<Correlation> {
    let (xs, ys) = complete_pairs(x, y)?;
    let r = pearson_r(&average_ranks(&xs), &average_ranks(&ys))?;
    Ok(Correlation {
        method: CorrelationMethod::Spearman,
        coefficient: r,
        p_value: p_value(r, xs.len()),
        sample_size: xs.len(),
    })
}

pub fn correlate(method: CorrelationMethod, x: &[Option<f64>], y: &[Option<f64>]) -> Result<Correlation> {
    match method {
        CorrelationMethod::Pearson => pearson(x, y),
        CorrelationMethod::Spearman => spearman(x, y),
    }
}

/// Correlate two columns of a metrics frame.
pub fn analyze_pair(
    df: &DataFrame,
    metric1: &str,
    metric2: &str,
    method: CorrelationMethod,
) -> Result<MetricCorrelation> {
    let x = numeric_column(df, metric1)?;
    let y = numeric_column(df, metric2)?;
    let correlation = correlate(method, &x, &y)?;
    debug!(
        metric1,
        metric2,
        r = correlation.coefficient,
        p = correlation.p_value,
        n = correlation.sample_size,
        "correlated"
    );
    Ok(MetricCorrelation {
        metric1: metric1.to_string(),
        metric2: metric2.to_string(),
        correlation,
    })
}

/// Symmetric matrix of coefficients. Undefined entries (too few pairs or a
/// constant column) are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

fn matrix_columns(df: &DataFrame, columns: &[String]) -> Result<Vec<String>> {
    let selected: Vec<String> = if columns.is_empty() {
        DEFAULT_MATRIX_COLUMNS
            .iter()
            .filter(|c| has_column(df, c))
            .map(|c| (*c).to_string())
            .collect()
    } else {
        columns.iter().filter(|c| has_column(df, c)).cloned().collect()
    };
    if selected.len() < 2 {
        return Err(AnalysisError::NotEnoughColumns(selected.len()));
    }
    Ok(selected)
}

/// Matrix over `columns`, or over the default measurement columns when empty.
/// Names not present in the frame are ignored.
pub fn correlation_matrix(
    df: &DataFrame,
    columns: &[String],
    method: CorrelationMethod,
) -> Result<CorrelationMatrix> {
    let columns = matrix_columns(df, columns)?;
    let data = columns
        .iter()
        .map(|c| numeric_column(df, c))
        .collect::<Result<Vec<_>>>()?;
    let k = columns.len();
    let mut values = vec![vec![None; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = correlate(method, &data[i], &data[j])
                .ok()
                .map(|c| c.coefficient);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix {
        method,
        columns,
        values,
    })
}

/// Pairs whose `|r|` is at least `min_abs`, strongest first.
pub fn correlation_summary(
    df: &DataFrame,
    columns: &[String],
    method: CorrelationMethod,
    min_abs: f64,
) -> Result<Vec<MetricCorrelation>> {
    let columns = matrix_columns(df, columns)?;
    let mut pairs = Vec::new();
    for (i, a) in columns.iter().enumerate() {
        for b in &columns[i + 1..] {
            match analyze_pair(df, a, b, method) {
                Ok(pair) if pair.correlation.coefficient.abs() >= min_abs => pairs.push(pair),
                Ok(_) => {}
                Err(err) => debug!(metric1 = %a, metric2 = %b, error = %err, "pair skipped"),
            }
        }
    }
    pairs.sort_by(|a, b| {
        b.correlation
            .coefficient
            .abs()
            .total_cmp(&a.correlation.coefficient.abs())
    });
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn perfect_linear_relationship() {
        let c = pearson(&some(&[1.0, 2.0, 3.0, 4.0]), &some(&[2.0, 4.0, 6.0, 8.0])).unwrap();
        assert!((c.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(c.p_value, 0.0);
        assert_eq!(c.sample_size, 4);
    }

    #[test]
    fn pearson_p_value_matches_reference() {
        // r = 0.8 over 5 points: t = 0.8 * sqrt(3 / 0.36) = 2.3094, p = 0.1041
        let x = some(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = some(&[2.0, 1.0, 4.0, 3.0, 5.0]);
        let c = pearson(&x, &y).unwrap();
        assert!((c.coefficient - 0.8).abs() < 1e-12);
        assert!((c.p_value - 0.104_088).abs() < 1e-4, "{}", c.p_value);
    }

    #[test]
    fn spearman_uses_average_ranks() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
        // Monotonic but not linear.
        let c = spearman(&some(&[1.0, 2.0, 3.0, 4.0]), &some(&[1.0, 8.0, 27.0, 64.0])).unwrap();
        assert!((c.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(c.method, CorrelationMethod::Spearman);
    }

    #[test]
    fn missing_pairs_are_dropped() {
        let x = [Some(1.0), None, Some(3.0), Some(4.0)];
        let y = [Some(1.0), Some(9.0), None, Some(4.0)];
        let c = pearson(&x, &y).unwrap();
        assert_eq!(c.sample_size, 2);
        assert_eq!(c.p_value, 1.0);
    }

    #[test]
    fn degenerate_inputs_are_errors() {
        assert!(matches!(
            pearson(&some(&[1.0]), &some(&[1.0])),
            Err(AnalysisError::InsufficientData { needed: 2, found: 1 })
        ));
        assert!(matches!(
            pearson(&some(&[1.0, 2.0]), &some(&[1.0])),
            Err(AnalysisError::LengthMismatch { left: 2, right: 1 })
        ));
        assert!(matches!(
            pearson(&some(&[1.0, 1.0, 1.0]), &some(&[1.0, 2.0, 3.0])),
            Err(AnalysisError::ConstantInput)
        ));
    }

    #[test]
    fn record_carries_method_and_size() {
        let pair = MetricCorrelation {
            metric1: "systolic_bp".into(),
            metric2: "diastolic_bp".into(),
            correlation: Correlation {
                method: CorrelationMethod::Pearson,
                coefficient: 0.7,
                p_value: 0.01,
                sample_size: 30,
            },
        };
        let record = pair.to_record(None);
        assert_eq!(record.correlation_type, CorrelationMethod::Pearson);
        assert_eq!(record.sample_size, Some(30));
        assert_eq!(record.p_value, Some(0.01));
    }
}
