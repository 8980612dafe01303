//! Full spectrum analysis of a signal and its persisted form.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::info;

use medi_ingest::values::format_numeric;
use medi_model::NewSpectrumAnalysis;

use crate::classify::{SignalKind, classify};
use crate::error::{Result, SignalError};
use crate::peaks::{SpectralPeak, find_peaks};
use crate::spectrum::{Spectrum, SpectrumConfig, power_spectrum};

/// Peaks reported per analysis.
pub const DEFAULT_PEAK_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumReport {
    pub sampling_rate: f64,
    pub samples: usize,
    pub fft_size: usize,
    pub frequency_resolution: f64,
    pub dominant_frequency: Option<f64>,
    pub peaks: Vec<SpectralPeak>,
    pub total_power: f64,
    pub mean_power: f64,
    pub max_power: f64,
    pub max_frequency: f64,
    pub signal_kind: SignalKind,
}

impl SpectrumReport {
    /// Insert form for the `spectrum_analyses` table.
    pub fn to_record(&self, signal_id: i64, frequency_data_path: &Path) -> NewSpectrumAnalysis {
        let path = frequency_data_path.display().to_string();
        NewSpectrumAnalysis {
            signal_id,
            frequency_data_path: path.clone(),
            fft_size: i64::try_from(self.fft_size).ok(),
            frequency_resolution: Some(self.frequency_resolution),
            dominant_frequency: self.dominant_frequency,
            power_spectrum_path: Some(path),
            notes: None,
        }
    }
}

/// Power spectrum, peaks and summary figures for one signal.
pub fn analyze(
    samples: &[f64],
    sampling_rate: f64,
    config: &SpectrumConfig,
    peak_count: usize,
) -> Result<(Spectrum, SpectrumReport)> {
    let spectrum = power_spectrum(samples, sampling_rate, config)?;
    let report = summarize(&spectrum, samples.len(), peak_count);
    Ok((spectrum, report))
}

/// Summary figures of an already computed spectrum (plain or Welch) of a
/// signal with `samples` samples.
pub fn summarize(spectrum: &Spectrum, samples: usize, peak_count: usize) -> SpectrumReport {
    let (max_frequency, max_power) = spectrum.max_bin().unwrap_or((0.0, 0.0));
    let dominant_frequency = spectrum.dominant_frequency();
    let sampling_rate = spectrum.sampling_rate;
    let report = SpectrumReport {
        sampling_rate,
        samples,
        fft_size: spectrum.fft_size,
        frequency_resolution: spectrum.resolution(),
        dominant_frequency,
        peaks: find_peaks(spectrum, peak_count, None),
        total_power: spectrum.total_power(),
        mean_power: spectrum.mean_power(),
        max_power,
        max_frequency,
        signal_kind: dominant_frequency.map_or(SignalKind::Unknown, |f| classify(f, sampling_rate)),
    };
    info!(
        samples = report.samples,
        fft_size = report.fft_size,
        dominant = ?report.dominant_frequency,
        "spectrum analysed"
    );
    report
}

/// Where the spectrum of signal `signal_id` is written: next to the signal file.
pub fn spectrum_path(signal_path: &Path, signal_id: i64) -> PathBuf {
    let dir = signal_path.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("spectrum_signal_{signal_id}.csv"))
}

/// Write `frequency,power_spectrum` rows.
pub fn write_spectrum_csv(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let io_err = |operation, source| SignalError::Io {
        operation,
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err("create directory", e))?;
    }
    let file = File::create(path).map_err(|e| io_err("create", e))?;
    let mut writer = Writer::from_writer(BufWriter::new(file));
    let csv_err = |source| SignalError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer
        .write_record(["frequency", "power_spectrum"])
        .map_err(csv_err)?;
    for (freq, power) in spectrum.frequencies.iter().zip(&spectrum.power) {
        writer
            .write_record([format_numeric(*freq), format_numeric(*power)])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|e| io_err("write", e))?;
    info!(path = %path.display(), bins = spectrum.len(), "spectrum written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_file_sits_next_to_the_signal() {
        assert_eq!(
            spectrum_path(Path::new("data/signals/ecg.csv"), 7),
            PathBuf::from("data/signals/spectrum_signal_7.csv")
        );
        assert_eq!(
            spectrum_path(Path::new("ecg.csv"), 1),
            PathBuf::from("spectrum_signal_1.csv")
        );
    }
}
