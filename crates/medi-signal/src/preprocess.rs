//! Signal conditioning before spectral analysis.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SignalError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalize {
    /// Zero mean, unit (population) variance.
    #[default]
    ZScore,
    /// Linear rescale onto `[min, max]`.
    MinMax { min: f64, max: f64 },
    /// Linear rescale onto `[0, 1]`.
    Unit,
}

/// Normalize a signal. A constant signal normalizes to all zeros.
pub fn normalize(samples: &[f64], method: Normalize) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    match method {
        Normalize::ZScore => {
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let std = (samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            if std == 0.0 {
                warn!("standard deviation is 0, returning zero signal");
                return vec![0.0; samples.len()];
            }
            samples.iter().map(|v| (v - mean) / std).collect()
        }
        Normalize::MinMax { min, max } => rescale(samples, min, max),
        Normalize::Unit => rescale(samples, 0.0, 1.0),
    }
}

fn rescale(samples: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        warn!("signal is constant, returning zero signal");
        return vec![0.0; samples.len()];
    }
    samples
        .iter()
        .map(|v| (v - min) / (max - min) * (hi - lo) + lo)
        .collect()
}

/// Subtract the mean.
pub fn remove_dc(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|v| v - mean).collect()
}

fn odd_kernel(kernel: usize, what: &'static str) -> Result<usize> {
    if kernel == 0 {
        return Err(SignalError::InvalidSize { what, min: 1, got: 0 });
    }
    if kernel % 2 == 0 {
        warn!(kernel, "{what} must be odd, using {}", kernel + 1);
        return Ok(kernel + 1);
    }
    Ok(kernel)
}

/// Running median over an odd kernel; the signal is zero padded at both ends.
pub fn median_filter(samples: &[f64], kernel: usize) -> Result<Vec<f64>> {
    let kernel = odd_kernel(kernel, "median kernel")?;
    let half = kernel / 2;
    let n = samples.len();
    let mut window = Vec::with_capacity(kernel);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        window.clear();
        for j in 0..kernel {
            let pos = (i + j).checked_sub(half);
            window.push(pos.and_then(|p| samples.get(p)).copied().unwrap_or(0.0));
        }
        window.sort_by(f64::total_cmp);
        out.push(window[half]);
    }
    Ok(out)
}

/// Centered moving average over an odd window, truncated at the edges.
pub fn smooth(samples: &[f64], window: usize) -> Result<Vec<f64>> {
    let window = odd_kernel(window, "smoothing window")?;
    let half = window / 2;
    let n = samples.len();
    Ok((0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            let slice = &samples[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect())
}

/// One step of a preprocessing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PreprocessStep {
    RemoveDc,
    Normalize {
        #[serde(default)]
        normalize: Normalize,
    },
    Median {
        kernel: usize,
    },
    Smooth {
        window: usize,
    },
}

impl PreprocessStep {
    pub fn apply(&self, samples: &[f64]) -> Result<Vec<f64>> {
        match self {
            PreprocessStep::RemoveDc => Ok(remove_dc(samples)),
            PreprocessStep::Normalize { normalize: method } => Ok(normalize(samples, *method)),
            PreprocessStep::Median { kernel } => median_filter(samples, *kernel),
            PreprocessStep::Smooth { window } => smooth(samples, *window),
        }
    }
}

pub fn preprocess(samples: &[f64], steps: &[PreprocessStep]) -> Result<Vec<f64>> {
    let mut current = samples.to_vec();
    for step in steps {
        current = step.apply(&current)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zscore_has_zero_mean_unit_variance() {
        let out = normalize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], Normalize::ZScore);
        assert_eq!(out[0], -1.5);
        assert_eq!(out[7], 2.0);
        assert_eq!(normalize(&[3.0, 3.0], Normalize::ZScore), vec![0.0, 0.0]);
    }

    #[test]
    fn rescaling() {
        assert_eq!(normalize(&[0.0, 5.0, 10.0], Normalize::Unit), vec![0.0, 0.5, 1.0]);
        assert_eq!(
            normalize(&[0.0, 5.0, 10.0], Normalize::MinMax { min: -1.0, max: 1.0 }),
            vec![-1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn median_removes_impulses() {
        let out = median_filter(&[1.0, 1.0, 50.0, 1.0, 1.0], 3).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
        // Even kernels grow by one; edges see zero padding.
        let edge = median_filter(&[5.0, 5.0, 5.0], 2).unwrap();
        assert_eq!(edge, vec![5.0, 5.0, 5.0]);
        let padded = median_filter(&[5.0, 6.0, 7.0], 5).unwrap();
        assert_eq!(padded, vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn pipeline_from_json() {
        let steps: Vec<PreprocessStep> = serde_json::from_str(
            r#"[{"method": "remove_dc"}, {"method": "normalize", "normalize": {"kind": "unit"}}]"#,
        )
        .unwrap();
        let out = preprocess(&[1.0, 2.0, 3.0], &steps).unwrap();
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
        assert!(smooth(&[1.0], 0).is_err());
    }
}
