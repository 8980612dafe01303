use std::fs;

use medi_ingest::{
    DEFAULT_SAMPLING_RATE, IngestError, SignalLoadOptions, load_signal_csv, write_signal_csv,
};
use tempfile::TempDir;

#[test]
fn infers_rate_from_time_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecg.csv");
    fs::write(&path, "time,lead_ii\n0.0,0.1\n0.004,0.3\n0.008,-0.2\n0.012,0.0\n").unwrap();

    let signal = load_signal_csv(&path, &SignalLoadOptions::default()).unwrap();
    assert_eq!(signal.samples, vec![0.1, 0.3, -0.2, 0.0]);
    assert!((signal.sampling_rate - 250.0).abs() < 1e-6);
    assert_eq!(signal.metadata.amplitude_column, "lead_ii");
    assert_eq!(signal.metadata.time_column.as_deref(), Some("time"));
}

#[test]
fn skips_non_numeric_columns_and_uses_default_rate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eeg.csv");
    fs::write(&path, "label,value\nalpha,1.5\nbeta,2.5\n").unwrap();

    let signal = load_signal_csv(&path, &SignalLoadOptions::default()).unwrap();
    assert_eq!(signal.samples, vec![1.5, 2.5]);
    assert_eq!(signal.sampling_rate, DEFAULT_SAMPLING_RATE);
    assert!((signal.metadata.duration - 2.0 / 250.0).abs() < 1e-12);
}

#[test]
fn explicit_rate_wins_and_must_be_positive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sig.csv");
    fs::write(&path, "t,v\n0,1\n1,2\n").unwrap();

    let options = SignalLoadOptions {
        sampling_rate: Some(100.0),
        ..SignalLoadOptions::default()
    };
    assert_eq!(load_signal_csv(&path, &options).unwrap().sampling_rate, 100.0);

    let bad = SignalLoadOptions {
        sampling_rate: Some(0.0),
        ..SignalLoadOptions::default()
    };
    assert!(matches!(
        load_signal_csv(&path, &bad),
        Err(IngestError::InvalidSamplingRate(_))
    ));
}

#[test]
fn no_numeric_column_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("text.csv");
    fs::write(&path, "time,label\n0,a\n1,b\n").unwrap();
    let err = load_signal_csv(&path, &SignalLoadOptions::default()).unwrap_err();
    assert!(matches!(err, IngestError::NoAmplitudeColumn { .. }));
}

#[test]
fn written_signals_load_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("out.csv");
    let samples = [0.0, 0.5, 1.0, 0.5, 0.0, -0.5];
    write_signal_csv(&path, &samples, 50.0).unwrap();

    let signal = load_signal_csv(&path, &SignalLoadOptions::default()).unwrap();
    assert_eq!(signal.samples, samples);
    assert!((signal.sampling_rate - 50.0).abs() < 1e-9);
}
