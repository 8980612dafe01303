//! Tapering windows applied before the FFT.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Symmetric window functions (`w[0] == w[n-1]`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    #[default]
    None,
    Hann,
    Hamming,
    Blackman,
}

impl WindowFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowFunction::None => "none",
            WindowFunction::Hann => "hann",
            WindowFunction::Hamming => "hamming",
            WindowFunction::Blackman => "blackman",
        }
    }

    pub fn coefficients(self, n: usize) -> Vec<f64> {
        if n <= 1 || self == WindowFunction::None {
            return vec![1.0; n];
        }
        let m = (n - 1) as f64;
        (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / m;
                match self {
                    WindowFunction::None => 1.0,
                    WindowFunction::Hann => 0.5 - 0.5 * x.cos(),
                    WindowFunction::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowFunction::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }

    /// Periodic variant: the symmetric window of `n + 1` points without its
    /// last sample. Used for averaged spectra.
    pub fn periodic(self, n: usize) -> Vec<f64> {
        let mut w = self.coefficients(n + 1);
        w.truncate(n);
        w
    }

    /// Multiply `samples` by the window in place.
    pub fn apply(self, samples: &mut [f64]) {
        if self == WindowFunction::None {
            return;
        }
        let n = samples.len();
        for (s, w) in samples.iter_mut().zip(self.coefficients(n)) {
            *s *= w;
        }
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowFunction {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "rect" | "rectangular" => Ok(WindowFunction::None),
            "hann" | "hanning" => Ok(WindowFunction::Hann),
            "hamming" => Ok(WindowFunction::Hamming),
            "blackman" => Ok(WindowFunction::Blackman),
            _ => Err(SignalError::UnknownMethod {
                kind: "window function",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn windows_match_reference_values() {
        assert!(close(&WindowFunction::Hann.coefficients(5), &[0.0, 0.5, 1.0, 0.5, 0.0]));
        assert!(close(
            &WindowFunction::Hamming.coefficients(5),
            &[0.08, 0.54, 1.0, 0.54, 0.08]
        ));
        assert!(close(
            &WindowFunction::Blackman.coefficients(5),
            &[0.0, 0.34, 1.0, 0.34, 0.0]
        ));
        assert_eq!(WindowFunction::Hann.coefficients(1), vec![1.0]);
    }

    #[test]
    fn window_names_parse() {
        assert_eq!("Hanning".parse::<WindowFunction>().unwrap(), WindowFunction::Hann);
        assert!("kaiser".parse::<WindowFunction>().is_err());
    }
}
