//! Frequency-domain analysis of biomedical signals.
//!
//! Signals are plain `f64` sample slices with a sampling rate in Hz. Loading
//! and writing signal files lives in `medi-ingest`; this crate computes
//! spectra, conditions signals and generates synthetic ones.

pub mod classify;
pub mod error;
pub mod peaks;
pub mod preprocess;
pub mod report;
pub mod spectrum;
pub mod synthetic;
pub mod window;

pub use classify::{SignalKind, classify, detect_signal_type};
pub use error::{Result, SignalError};
pub use peaks::{SpectralPeak, find_peaks, local_maxima};
pub use preprocess::{Normalize, PreprocessStep, median_filter, normalize, preprocess, remove_dc, smooth};
pub use report::{
    DEFAULT_PEAK_COUNT, SpectrumReport, analyze, spectrum_path, summarize, write_spectrum_csv,
};
pub use spectrum::{Normalization, Spectrum, SpectrumConfig, fft, power_spectrum, welch_psd};
pub use synthetic::{EcgOptions, ecg, eeg, sample_count, sine, sine_sum};
pub use window::WindowFunction;
