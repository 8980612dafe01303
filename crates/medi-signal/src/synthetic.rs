//! Deterministic synthetic signals for demos and tests.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SignalError, check_rate};

/// Number of samples in `duration` seconds at `sampling_rate`.
pub fn sample_count(duration: f64, sampling_rate: f64) -> usize {
    let exact = duration * sampling_rate;
    // Products such as 0.3 * 10.0 can land just above an integer.
    (exact - 1e-9).ceil().max(0.0) as usize
}

/// Sum of sinusoids given as `(frequency Hz, amplitude)` pairs.
pub fn sine_sum(components: &[(f64, f64)], duration: f64, sampling_rate: f64) -> Result<Vec<f64>> {
    check_rate(sampling_rate)?;
    let n = sample_count(duration, sampling_rate);
    if n == 0 {
        return Err(SignalError::Empty);
    }
    Ok((0..n)
        .map(|i| {
            let t = i as f64 / sampling_rate;
            components
                .iter()
                .map(|(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                .sum()
        })
        .collect())
}

pub fn sine(frequency: f64, amplitude: f64, duration: f64, sampling_rate: f64) -> Result<Vec<f64>> {
    sine_sum(&[(frequency, amplitude)], duration, sampling_rate)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcgOptions {
    pub duration: f64,
    pub sampling_rate: f64,
    /// Beats per minute.
    pub heart_rate: f64,
    /// Adds a 0.5 Hz sinusoidal baseline.
    pub baseline_wander: bool,
}

impl Default for EcgOptions {
    fn default() -> Self {
        Self {
            duration: 10.0,
            sampling_rate: 250.0,
            heart_rate: 72.0,
            baseline_wander: true,
        }
    }
}

fn gaussian(x: f64, center: f64, width: f64) -> f64 {
    (-((x - center) / width).powi(2)).exp()
}

/// One heartbeat as a function of the position in the cardiac cycle, `[0, 1)`.
fn beat(phase: f64) -> f64 {
    match phase {
        p if p < 0.15 => 0.1 * (PI * p / 0.15).sin(),
        p if p < 0.17 => -0.2 * gaussian(p, 0.16, 0.01),
        p if p < 0.20 => gaussian(p, 0.18, 0.01),
        p if p < 0.25 => -0.3 * gaussian(p, 0.22, 0.01),
        p if p < 0.55 => 0.3 * (PI * (p - 0.25) / 0.3).sin() * gaussian(p, 0.4, 0.15),
        _ => 0.0,
    }
}

/// ECG-like waveform (P wave, QRS complex, T wave) scaled to a peak
/// magnitude of 1.
pub fn ecg(options: &EcgOptions) -> Result<Vec<f64>> {
    check_rate(options.sampling_rate)?;
    if options.heart_rate <= 0.0 || !options.heart_rate.is_finite() {
        return Err(SignalError::InvalidParameter {
            name: "heart rate",
            value: options.heart_rate,
        });
    }
    let n = sample_count(options.duration, options.sampling_rate);
    if n == 0 {
        return Err(SignalError::Empty);
    }
    let period = 60.0 / options.heart_rate;
    let mut samples: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64 / options.sampling_rate;
            let mut v = beat((t % period) / period);
            if options.baseline_wander {
                v += 0.1 * (2.0 * PI * 0.5 * t).sin();
            }
            v
        })
        .collect();
    scale_to_unit_peak(&mut samples);
    info!(
        samples = n,
        heart_rate = options.heart_rate,
        sampling_rate = options.sampling_rate,
        "generated ECG"
    );
    Ok(samples)
}

/// EEG-like mixture of the delta, theta, alpha, beta and gamma bands, each a
/// tone at the band centre with two side tones.
pub fn eeg(duration: f64, sampling_rate: f64) -> Result<Vec<f64>> {
    const BANDS: [(f64, f64, f64); 5] = [
        (0.5, 4.0, 0.1),
        (4.0, 8.0, 0.2),
        (8.0, 13.0, 0.3),
        (13.0, 30.0, 0.2),
        (30.0, 40.0, 0.1),
    ];
    let mut components = Vec::with_capacity(BANDS.len() * 3);
    for (low, high, amp) in BANDS {
        let center = (low + high) / 2.0;
        let width = high - low;
        components.push((center, amp));
        components.push((center + width / 4.0, 0.3 * amp));
        components.push((center - width / 4.0, 0.2 * amp));
    }
    let mut samples = sine_sum(&components, duration, sampling_rate)?;
    scale_to_unit_peak(&mut samples);
    Ok(samples)
}

fn scale_to_unit_peak(samples: &mut [f64]) {
    let peak = samples.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if peak > 0.0 {
        samples.iter_mut().for_each(|v| *v /= peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_counts_follow_duration() {
        assert_eq!(sample_count(1.0, 1000.0), 1000);
        assert_eq!(sample_count(10.0, 250.0), 2500);
        assert_eq!(sample_count(0.0, 250.0), 0);
    }

    #[test]
    fn sine_starts_at_zero_and_peaks_at_amplitude() {
        let s = sine(1.0, 2.0, 1.0, 4.0).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s[0], 0.0);
        assert!((s[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ecg_is_deterministic_and_unit_scaled() {
        let a = ecg(&EcgOptions::default()).unwrap();
        let b = ecg(&EcgOptions::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2500);
        let peak = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert!(sine(1.0, 1.0, 1.0, 0.0).is_err());
        assert!(sine(1.0, 1.0, 0.0, 100.0).is_err());
        let options = EcgOptions {
            heart_rate: 0.0,
            ..EcgOptions::default()
        };
        assert!(ecg(&options).is_err());
    }
}
