//! Single-channel signal files (ECG/EEG) stored as delimited text.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::csv_loader::{decode_text, detect_delimiter, normalize_header, DEFAULT_SAMPLE_LINES};
use crate::error::{IngestError, Result};
use crate::values::{format_numeric, parse_f64};

/// Sampling rate used when neither the caller nor the file provides one.
pub const DEFAULT_SAMPLING_RATE: f64 = 250.0;

/// Column names recognised as the time axis, in priority order.
pub const TIME_COLUMN_CANDIDATES: [&str; 5] = ["time", "t", "timestamp", "sample", "index"];

#[derive(Debug, Clone, Default)]
pub struct SignalLoadOptions {
    pub time_column: Option<String>,
    pub amplitude_column: Option<String>,
    /// Explicit rate in Hz; wins over anything inferred from the file.
    pub sampling_rate: Option<f64>,
    /// Used when no rate can be inferred. Falls back to [`DEFAULT_SAMPLING_RATE`].
    pub default_sampling_rate: Option<f64>,
    pub delimiter: Option<u8>,
}

/// Summary of a loaded signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMetadata {
    pub path: PathBuf,
    pub samples: usize,
    pub sampling_rate: f64,
    /// Seconds.
    pub duration: f64,
    pub amplitude_column: String,
    pub time_column: Option<String>,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct LoadedSignal {
    pub samples: Vec<f64>,
    pub sampling_rate: f64,
    pub metadata: SignalMetadata,
}

/// Load a signal from a delimited file.
///
/// The time column is taken from the options or the first of
/// [`TIME_COLUMN_CANDIDATES`] present. The amplitude column is the first other
/// column whose cells are all numeric. Without an explicit rate, the rate is
/// `1 / mean(dt)` of the time column when that is positive.
pub fn load_signal_csv(path: &Path, options: &SignalLoadOptions) -> Result<LoadedSignal> {
    let bytes = fs::read(path).map_err(|e| IngestError::io("read", path, e))?;
    let (text, _) = decode_text(&bytes);
    if text.trim().is_empty() {
        return Err(IngestError::Empty {
            path: path.to_path_buf(),
        });
    }
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&text, DEFAULT_SAMPLE_LINES));

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let csv_err = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(normalize_header)
        .collect();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(record.get(idx).unwrap_or("").trim().to_string());
        }
    }
    if columns.first().is_none_or(|c| c.is_empty()) {
        return Err(IngestError::Empty {
            path: path.to_path_buf(),
        });
    }

    let find = |name: &str| {
        let name = normalize_header(name);
        headers.iter().position(|h| *h == name)
    };
    let time_idx = match &options.time_column {
        Some(name) => Some(find(name.as_str()).ok_or_else(|| IngestError::MissingColumn(name.clone()))?),
        None => TIME_COLUMN_CANDIDATES.iter().find_map(|c| find(*c)),
    };
    let numeric = |idx: usize| -> Option<Vec<f64>> {
        columns[idx].iter().map(|v| parse_f64(v)).collect()
    };
    let (amp_idx, samples) = match &options.amplitude_column {
        Some(name) => {
            let idx = find(name.as_str()).ok_or_else(|| IngestError::MissingColumn(name.clone()))?;
            let values = numeric(idx).ok_or_else(|| IngestError::NoAmplitudeColumn {
                available: headers.clone(),
            })?;
            (idx, values)
        }
        None => (0..headers.len())
            .filter(|idx| Some(*idx) != time_idx)
            .find_map(|idx| numeric(idx).map(|values| (idx, values)))
            .ok_or_else(|| IngestError::NoAmplitudeColumn {
                available: headers.clone(),
            })?,
    };

    let inferred = time_idx.and_then(numeric).and_then(|t| rate_from_times(&t));
    let sampling_rate = match options.sampling_rate {
        Some(rate) if rate > 0.0 && rate.is_finite() => rate,
        Some(rate) => return Err(IngestError::InvalidSamplingRate(rate)),
        None => inferred
            .or(options.default_sampling_rate)
            .unwrap_or(DEFAULT_SAMPLING_RATE),
    };
    debug!(
        path = %path.display(),
        amplitude = %headers[amp_idx],
        inferred_rate = ?inferred,
        "resolved signal columns"
    );

    let metadata = describe(
        path,
        &samples,
        sampling_rate,
        headers[amp_idx].clone(),
        time_idx.map(|i| headers[i].clone()),
    );
    info!(
        samples = metadata.samples,
        sampling_rate = metadata.sampling_rate,
        duration = metadata.duration,
        "loaded signal"
    );
    Ok(LoadedSignal {
        samples,
        sampling_rate,
        metadata,
    })
}

fn rate_from_times(times: &[f64]) -> Option<f64> {
    if times.len() < 2 {
        return None;
    }
    let span: f64 = times.windows(2).map(|w| w[1] - w[0]).sum();
    let dt = span / (times.len() - 1) as f64;
    (dt > 0.0).then(|| 1.0 / dt)
}

fn describe(
    path: &Path,
    samples: &[f64],
    sampling_rate: f64,
    amplitude_column: String,
    time_column: Option<String>,
) -> SignalMetadata {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    SignalMetadata {
        path: path.to_path_buf(),
        samples: samples.len(),
        sampling_rate,
        duration: n / sampling_rate,
        amplitude_column,
        time_column,
        mean,
        std: var.sqrt(),
        min: samples.iter().copied().fold(f64::INFINITY, f64::min),
        max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Write `time,amplitude` rows with `time = i / sampling_rate`.
pub fn write_signal_csv(path: &Path, samples: &[f64], sampling_rate: f64) -> Result<()> {
    if !(sampling_rate > 0.0 && sampling_rate.is_finite()) {
        return Err(IngestError::InvalidSamplingRate(sampling_rate));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IngestError::io("create directory", parent, e))?;
    }
    let file = File::create(path).map_err(|e| IngestError::io("create", path, e))?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
    let csv_err = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer.write_record(["time", "amplitude"]).map_err(csv_err)?;
    for (idx, value) in samples.iter().enumerate() {
        let time = idx as f64 / sampling_rate;
        writer
            .write_record([format_numeric(time), format_numeric(*value)])
            .map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| IngestError::io("write", path, e))?;
    info!(path = %path.display(), samples = samples.len(), "wrote signal");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_inverse_mean_step() {
        let rate = rate_from_times(&[0.0, 0.002, 0.004, 0.006]).unwrap();
        assert!((rate - 500.0).abs() < 1e-6);
        assert_eq!(rate_from_times(&[1.0]), None);
        assert_eq!(rate_from_times(&[1.0, 1.0]), None);
    }
}
