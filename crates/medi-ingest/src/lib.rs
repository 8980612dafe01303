//! Reading health-metric files and signal recordings from disk.

pub mod csv_loader;
pub mod error;
pub mod signal_loader;
pub mod values;

pub use csv_loader::{
    CsvLoadOptions, FileInfo, LoadedCsv, RawRow, TextEncoding, decode_text, detect_delimiter,
    detect_encoding, file_info, load_csv, normalize_header, parse_text, system_time_to_naive,
};
pub use error::{IngestError, Result};
pub use signal_loader::{
    DEFAULT_SAMPLING_RATE, LoadedSignal, SignalLoadOptions, SignalMetadata, load_signal_csv,
    write_signal_csv,
};
