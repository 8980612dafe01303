//! Rough signal type guess from the dominant frequency and sampling rate.

use std::fmt;

use serde::Serialize;

use crate::spectrum::{Normalization, SpectrumConfig, power_spectrum};
use crate::window::WindowFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Ecg,
    Eeg,
    Unknown,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Ecg => "ECG",
            SignalKind::Eeg => "EEG",
            SignalKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ECG when the dominant frequency is a plausible heart rate (0.5-5 Hz) at a
/// 200-500 Hz sampling rate; EEG for 0.5-40 Hz at 256-512 Hz.
pub fn classify(dominant_frequency: f64, sampling_rate: f64) -> SignalKind {
    if (0.5..=5.0).contains(&dominant_frequency) && (200.0..=500.0).contains(&sampling_rate) {
        SignalKind::Ecg
    } else if (0.5..=40.0).contains(&dominant_frequency) && (256.0..=512.0).contains(&sampling_rate) {
        SignalKind::Eeg
    } else {
        SignalKind::Unknown
    }
}

/// Classify raw samples using an unwindowed spectrum.
pub fn detect_signal_type(samples: &[f64], sampling_rate: f64) -> SignalKind {
    let config = SpectrumConfig::default()
        .with_window(WindowFunction::None)
        .with_normalization(Normalization::None);
    power_spectrum(samples, sampling_rate, &config)
        .ok()
        .and_then(|s| s.dominant_frequency())
        .map_or(SignalKind::Unknown, |f| classify(f, sampling_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{EcgOptions, sine};

    #[test]
    fn ranges() {
        assert_eq!(classify(1.2, 250.0), SignalKind::Ecg);
        assert_eq!(classify(10.0, 256.0), SignalKind::Eeg);
        assert_eq!(classify(10.0, 1000.0), SignalKind::Unknown);
        assert_eq!(classify(0.1, 250.0), SignalKind::Unknown);
    }

    #[test]
    fn synthetic_ecg_is_recognised() {
        let options = EcgOptions {
            baseline_wander: false,
            ..EcgOptions::default()
        };
        let samples = crate::synthetic::ecg(&options).unwrap();
        assert_eq!(detect_signal_type(&samples, 250.0), SignalKind::Ecg);
        let alpha = sine(10.0, 1.0, 4.0, 256.0).unwrap();
        assert_eq!(detect_signal_type(&alpha, 256.0), SignalKind::Eeg);
        assert_eq!(detect_signal_type(&[], 256.0), SignalKind::Unknown);
    }
}
