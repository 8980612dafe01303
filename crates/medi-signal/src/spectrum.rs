//! FFT spectra of real-valued signals.
//!
//! Bins cover the non-negative frequencies `k·fs/N` for `k = 0..=N/2`, where
//! `N` is the FFT size.

use std::fmt;
use std::str::FromStr;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SignalError, check_rate};
use crate::window::WindowFunction;

/// Scaling applied to `|X|²`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Raw `|X|²`.
    None,
    /// `|X|² / n` with `n` the signal length.
    #[default]
    Length,
    /// One-sided power spectral density `|X|² / (fs · Σw²)`, doubled except at
    /// DC and Nyquist.
    Density,
}

impl Normalization {
    pub fn as_str(self) -> &'static str {
        match self {
            Normalization::None => "none",
            Normalization::Length => "length",
            Normalization::Density => "density",
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Normalization {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "raw" => Ok(Normalization::None),
            "length" | "n" => Ok(Normalization::Length),
            "density" | "psd" => Ok(Normalization::Density),
            _ => Err(SignalError::UnknownMethod {
                kind: "normalization",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumConfig {
    pub window: WindowFunction,
    pub normalization: Normalization,
    /// FFT size; defaults to the signal length. Shorter signals are zero padded,
    /// longer ones truncated.
    pub nfft: Option<usize>,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            window: WindowFunction::Hann,
            normalization: Normalization::Length,
            nfft: None,
        }
    }
}

impl SpectrumConfig {
    pub fn with_window(mut self, window: WindowFunction) -> Self {
        self.window = window;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_nfft(mut self, nfft: usize) -> Self {
        self.nfft = Some(nfft);
        self
    }
}

/// Power per non-negative frequency bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
    pub sampling_rate: f64,
    pub fft_size: usize,
}

impl Spectrum {
    /// Bin spacing in Hz.
    pub fn resolution(&self) -> f64 {
        self.sampling_rate / self.fft_size as f64
    }

    /// Frequency of the strongest bin, ignoring DC.
    pub fn dominant_frequency(&self) -> Option<f64> {
        let (idx, _) = self
            .power
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        Some(self.frequencies[idx])
    }

    /// Frequency and power of the strongest bin, DC included.
    pub fn max_bin(&self) -> Option<(f64, f64)> {
        let (idx, power) = self
            .power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        Some((self.frequencies[idx], *power))
    }

    pub fn total_power(&self) -> f64 {
        self.power.iter().sum()
    }

    pub fn mean_power(&self) -> f64 {
        if self.power.is_empty() {
            0.0
        } else {
            self.total_power() / self.power.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }
}

fn bin_frequencies(nfft: usize, sampling_rate: f64) -> Vec<f64> {
    (0..=nfft / 2)
        .map(|k| k as f64 * sampling_rate / nfft as f64)
        .collect()
}

/// Complex FFT of the windowed signal, non-negative frequency bins only.
pub fn fft(
    samples: &[f64],
    sampling_rate: f64,
    window: WindowFunction,
    nfft: Option<usize>,
) -> Result<(Vec<f64>, Vec<Complex<f64>>)> {
    if samples.is_empty() {
        return Err(SignalError::Empty);
    }
    check_rate(sampling_rate)?;
    let nfft = nfft.unwrap_or(samples.len());
    if nfft == 0 {
        return Err(SignalError::InvalidSize {
            what: "FFT size",
            min: 1,
            got: 0,
        });
    }
    if nfft < samples.len() {
        warn!(nfft, samples = samples.len(), "FFT size shorter than signal, truncating");
    }

    let mut windowed = samples.to_vec();
    window.apply(&mut windowed);
    let mut buffer: Vec<Complex<f64>> = (0..nfft)
        .map(|i| Complex::new(windowed.get(i).copied().unwrap_or(0.0), 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(nfft).process(&mut buffer);
    buffer.truncate(nfft / 2 + 1);
    Ok((bin_frequencies(nfft, sampling_rate), buffer))
}

/// `|X|²` per bin, scaled per `config.normalization`.
pub fn power_spectrum(samples: &[f64], sampling_rate: f64, config: &SpectrumConfig) -> Result<Spectrum> {
    let (frequencies, values) = fft(samples, sampling_rate, config.window, config.nfft)?;
    let nfft = config.nfft.unwrap_or(samples.len());
    let mut power: Vec<f64> = values.iter().map(Complex::norm_sqr).collect();
    match config.normalization {
        Normalization::None => {}
        Normalization::Length => {
            let n = samples.len() as f64;
            power.iter_mut().for_each(|p| *p /= n);
        }
        Normalization::Density => {
            let used = samples.len().min(nfft);
            let w_sq: f64 = config.window.coefficients(used).iter().map(|w| w * w).sum();
            scale_density(&mut power, nfft, sampling_rate * w_sq);
        }
    }
    debug!(
        samples = samples.len(),
        nfft,
        window = %config.window,
        normalization = %config.normalization,
        "power spectrum computed"
    );
    Ok(Spectrum {
        frequencies,
        power,
        sampling_rate,
        fft_size: nfft,
    })
}

/// Divide by `scale` and fold the negative frequencies into the one-sided bins.
fn scale_density(power: &mut [f64], nfft: usize, scale: f64) {
    let last = power.len().saturating_sub(1);
    for (k, p) in power.iter_mut().enumerate() {
        *p /= scale;
        let nyquist = nfft % 2 == 0 && k == last;
        if k != 0 && !nyquist {
            *p *= 2.0;
        }
    }
}

/// Welch power spectral density: Hann segments of `segment_len` with 50 %
/// overlap, each detrended by its mean, periodograms averaged.
///
/// `segment_len` defaults to `min(256, n / 4)` and is capped at the signal length.
pub fn welch_psd(samples: &[f64], sampling_rate: f64, segment_len: Option<usize>) -> Result<Spectrum> {
    if samples.is_empty() {
        return Err(SignalError::Empty);
    }
    check_rate(sampling_rate)?;
    let nperseg = segment_len
        .unwrap_or_else(|| 256.min(samples.len() / 4))
        .min(samples.len());
    if nperseg < 2 {
        return Err(SignalError::InvalidSize {
            what: "Welch segment length",
            min: 2,
            got: nperseg,
        });
    }
    let step = (nperseg / 2).max(1);
    let window = WindowFunction::Hann.periodic(nperseg);
    let scale = sampling_rate * window.iter().map(|w| w * w).sum::<f64>();

    let mut planner = FftPlanner::<f64>::new();
    let plan = planner.plan_fft_forward(nperseg);
    let mut accumulated = vec![0.0; nperseg / 2 + 1];
    let mut segments = 0usize;
    let mut start = 0;
    while start + nperseg <= samples.len() {
        let segment = &samples[start..start + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        let mut buffer: Vec<Complex<f64>> = segment
            .iter()
            .zip(&window)
            .map(|(s, w)| Complex::new((s - mean) * w, 0.0))
            .collect();
        plan.process(&mut buffer);
        for (acc, value) in accumulated.iter_mut().zip(&buffer) {
            *acc += value.norm_sqr();
        }
        segments += 1;
        start += step;
    }
    let mut power: Vec<f64> = accumulated.iter().map(|p| p / segments as f64).collect();
    scale_density(&mut power, nperseg, scale);
    debug!(nperseg, segments, "welch psd computed");
    Ok(Spectrum {
        frequencies: bin_frequencies(nperseg, sampling_rate),
        power,
        sampling_rate,
        fft_size: nperseg,
    })
}
