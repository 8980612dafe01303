//! Delimited health-metric file loading.
//!
//! The loader guesses the delimiter and text encoding, normalizes headers to
//! canonical [`Field`] names and hands back one [`RawRow`] per non-blank line.
//! Cell values are kept as text; typing and range checks belong to the
//! validator so that a bad cell is reported instead of silently coerced.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use medi_model::Field;

use crate::error::{IngestError, Result};
use crate::values::is_missing_value;

/// Delimiters tried during detection, in tie-break order.
pub const DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];

/// Lines sampled for delimiter detection.
pub const DEFAULT_SAMPLE_LINES: usize = 5;

/// Text encoding the file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    /// UTF-8 with a leading byte-order mark.
    Utf8Bom,
    /// Not valid UTF-8; decoded byte-for-byte as ISO-8859-1.
    Latin1,
}

/// Options for [`load_csv`].
#[derive(Debug, Clone)]
pub struct CsvLoadOptions {
    /// Fixed delimiter; detected from the file when `None`.
    pub delimiter: Option<u8>,
    /// Lines inspected by delimiter detection.
    pub sample_lines: usize,
    /// Stop after this many data rows.
    pub max_rows: Option<usize>,
}

impl Default for CsvLoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            sample_lines: DEFAULT_SAMPLE_LINES,
            max_rows: None,
        }
    }
}

impl CsvLoadOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }
}

/// One data line with values keyed by canonical field.
///
/// Cells holding a missing-value token are left out, so `get` returning
/// `None` means "not provided". Free-text fields are only left out when blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// 1-based line number in the source file.
    pub line: usize,
    pub values: BTreeMap<Field, String>,
    /// Columns that did not map to a known field, by normalized header.
    pub extra: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Builder used by tests and by callers assembling rows by hand.
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        let value = value.into();
        if !is_absent(Some(field), &value) {
            self.values.insert(field, value.trim().to_string());
        }
        self
    }
}

/// Result of loading one file.
#[derive(Debug, Clone)]
pub struct LoadedCsv {
    pub path: PathBuf,
    pub delimiter: u8,
    pub encoding: TextEncoding,
    /// Normalized header names, in file order.
    pub headers: Vec<String>,
    /// Canonical field per column; `None` for unrecognised columns.
    pub fields: Vec<Option<Field>>,
    pub rows: Vec<RawRow>,
}

impl LoadedCsv {
    /// Fields that appear in more than one column (first column wins).
    pub fn duplicate_fields(&self) -> Vec<Field> {
        let mut seen = BTreeMap::new();
        for field in self.fields.iter().flatten() {
            *seen.entry(*field).or_insert(0usize) += 1;
        }
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(field, _)| field)
            .collect()
    }

    pub fn known_fields(&self) -> Vec<Field> {
        self.fields.iter().flatten().copied().collect()
    }
}

/// Size and modification time of a file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<NaiveDateTime>,
}

/// Pick the delimiter with the most occurrences in the first `sample_lines` lines.
pub fn detect_delimiter(text: &str, sample_lines: usize) -> u8 {
    let sample: Vec<&str> = text.lines().take(sample_lines.max(1)).collect();
    let mut best = (b',', 0usize);
    for delimiter in DELIMITERS {
        let count: usize = sample
            .iter()
            .map(|line| line.bytes().filter(|b| *b == delimiter).count())
            .sum();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    if best.1 == 0 {
        warn!("could not detect delimiter, defaulting to comma");
    }
    best.0
}

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Classify raw bytes as UTF-8 (with or without BOM) or Latin-1.
pub fn detect_encoding(bytes: &[u8]) -> TextEncoding {
    match bytes.strip_prefix(&UTF8_BOM) {
        Some(rest) if std::str::from_utf8(rest).is_ok() => TextEncoding::Utf8Bom,
        _ if std::str::from_utf8(bytes).is_ok() => TextEncoding::Utf8,
        _ => TextEncoding::Latin1,
    }
}

/// Decode raw bytes, reporting which encoding was used.
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let encoding = detect_encoding(bytes);
    let text = match encoding {
        TextEncoding::Utf8Bom => String::from_utf8_lossy(&bytes[UTF8_BOM.len()..]).into_owned(),
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
    };
    (text, encoding)
}

/// Normalize a header cell: trim, drop BOM, collapse whitespace to `_`, lowercase.
pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn is_absent(field: Option<Field>, value: &str) -> bool {
    match field {
        Some(field) if field.is_free_text() => value.trim().is_empty(),
        _ => is_missing_value(value),
    }
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Load a delimited health-metric file.
pub fn load_csv(path: &Path, options: &CsvLoadOptions) -> Result<LoadedCsv> {
    let bytes = fs::read(path).map_err(|e| IngestError::io("read", path, e))?;
    let (text, encoding) = decode_text(&bytes);
    if text.trim().is_empty() {
        return Err(IngestError::Empty {
            path: path.to_path_buf(),
        });
    }
    if encoding == TextEncoding::Latin1 {
        warn!(path = %path.display(), "file is not valid UTF-8, decoded as Latin-1");
    }
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&text, options.sample_lines));
    debug!(path = %path.display(), delimiter = %char::from(delimiter), "reading csv");

    let mut loaded = parse_text(&text, delimiter, options.max_rows).map_err(|source| {
        IngestError::Csv {
            path: path.to_path_buf(),
            source,
        }
    })?;
    loaded.path = path.to_path_buf();
    loaded.encoding = encoding;

    info!(
        path = %path.display(),
        rows = loaded.rows.len(),
        columns = loaded.headers.len(),
        "loaded csv"
    );
    Ok(loaded)
}

/// Parse already-decoded text. Exposed for in-memory inputs.
pub fn parse_text(
    text: &str,
    delimiter: u8,
    max_rows: Option<usize>,
) -> std::result::Result<LoadedCsv, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut headers: Vec<String> = Vec::new();
    let mut fields: Vec<Option<Field>> = Vec::new();
    let mut rows = Vec::new();
    let mut header_seen = false;

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(0);
        if !header_seen {
            headers = record.iter().map(normalize_header).collect();
            fields = map_fields(&headers);
            header_seen = true;
            continue;
        }
        if max_rows.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let mut row = RawRow::new(line);
        for (idx, header) in headers.iter().enumerate() {
            let value = normalize_cell(record.get(idx).unwrap_or(""));
            if is_absent(fields[idx], &value) {
                continue;
            }
            match fields[idx] {
                Some(field) => {
                    row.values.entry(field).or_insert(value);
                }
                None => {
                    row.extra.insert(header.clone(), value);
                }
            }
        }
        rows.push(row);
    }

    Ok(LoadedCsv {
        path: PathBuf::new(),
        delimiter,
        encoding: TextEncoding::Utf8,
        headers,
        fields,
        rows,
    })
}

fn map_fields(headers: &[String]) -> Vec<Option<Field>> {
    let mapped: Vec<Option<Field>> = headers.iter().map(|h| Field::from_header(h)).collect();
    let renamed: Vec<String> = headers
        .iter()
        .zip(&mapped)
        .filter_map(|(header, field)| match field {
            Some(field) if field.name() != header => Some(format!("{header}->{field}")),
            _ => None,
        })
        .collect();
    if !renamed.is_empty() {
        debug!(mapped = %renamed.join(", "), "mapped columns");
    }
    mapped
}

/// Size and modification time for a file.
pub fn file_info(path: &Path) -> Result<FileInfo> {
    let metadata = fs::metadata(path).map_err(|e| IngestError::io("stat", path, e))?;
    Ok(FileInfo {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        modified: metadata.modified().ok().map(system_time_to_naive),
    })
}

/// UTC time of a `SystemTime`, truncated to whole seconds.
///
/// Same clock as the store's `created_at` stamps and the import fallback.
pub fn system_time_to_naive(time: SystemTime) -> NaiveDateTime {
    let utc: DateTime<Utc> = time.into();
    let naive = utc.naive_utc();
    naive.with_nanosecond(0).unwrap_or(naive)
}
