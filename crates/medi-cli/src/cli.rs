//! CLI argument definitions for `medianalyze`.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use medi_analysis::{Aggregation, AnomalyMethod, ResamplePeriod};
use medi_ingest::values::parse_timestamp;
use medi_model::{CorrelationMethod, DuplicatePolicy, Gender};
use medi_signal::{Normalization, WindowFunction};
use medi_store::{MetricFilter, PatientFilter};

#[derive(Parser)]
#[command(
    name = "medianalyze",
    version,
    about = "MediAnalyze Pro - import, validate and analyse patient health metrics",
    long_about = "Import patient health-metric CSV files into a SQLite database.\n\n\
                  Rows are validated against medical bounds before import; stored data\n\
                  can be exported, summarised, correlated and trended. Biomedical\n\
                  signals (ECG/EEG) can be registered and analysed with an FFT."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Configuration file (default: platform config folder).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides the configuration file).
    #[arg(long = "database", value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    /// Print results as JSON instead of tables.
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow patient values (names, measurements) in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database and its tables.
    InitDb,

    /// Check a health-metric file against the validation rules without importing.
    Validate(ValidateArgs),

    /// Validate a health-metric file and import the accepted rows.
    Import(ImportArgs),

    /// Export stored data to CSV.
    Export(ExportArgs),

    /// List, show or delete patients.
    #[command(subcommand)]
    Patients(PatientsCommand),

    /// Counts and averages over patients and their metrics.
    Stats(StatsArgs),

    /// Correlate two metrics.
    Correlate(CorrelateArgs),

    /// Correlation matrix over several metrics.
    CorrelationMatrix(MatrixArgs),

    /// Trend and anomalies of one patient's measurement over time.
    Trend(TrendArgs),

    /// FFT spectrum of a signal file or a registered signal.
    Spectrum(SpectrumArgs),

    /// Register, generate or list biomedical signals.
    #[command(subcommand)]
    Signal(SignalCommand),

    /// Register, list or delete medical image metadata.
    #[command(subcommand)]
    Image(ImageCommand),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Health-metric file (CSV, semicolon, tab or pipe separated).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Field delimiter (`,` `;` `|` or `tab`); detected when omitted.
    #[arg(long = "delimiter", value_name = "CHAR")]
    pub delimiter: Option<String>,

    /// Maximum number of rejected rows listed in the table output.
    #[arg(long = "show", value_name = "N", default_value_t = 20)]
    pub show: usize,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Health-metric file (CSV, semicolon, tab or pipe separated).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Rows per transaction.
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// What to do when a (patient, timestamp) row already exists.
    #[arg(long = "duplicates", value_enum)]
    pub duplicates: Option<DuplicatesArg>,

    /// Field delimiter (`,` `;` `|` or `tab`); detected when omitted.
    #[arg(long = "delimiter", value_name = "CHAR")]
    pub delimiter: Option<String>,

    /// Timestamp for rows without one (default: the file's modification time).
    #[arg(long = "observed-at", value_name = "DATETIME", value_parser = parse_datetime_arg)]
    pub observed_at: Option<NaiveDateTime>,

    /// Validate and resolve patients, then roll everything back.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Do not draw a progress bar.
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportKind {
    /// Patients with their BMI.
    Patients,
    /// Metric rows as stored.
    Metrics,
    /// Metrics joined with patient columns; re-importable.
    Combined,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(value_enum)]
    pub kind: ExportKind,

    /// Destination CSV file.
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub patients: PatientFilterArgs,

    #[command(flatten)]
    pub metrics: MetricFilterArgs,

    /// Maximum number of rows (patients for `patients`, metrics otherwise).
    #[arg(long = "limit", value_name = "N")]
    pub limit: Option<usize>,
}

/// Patient selection shared by several commands.
#[derive(Args, Default)]
pub struct PatientFilterArgs {
    /// Restrict to this patient (repeatable).
    #[arg(long = "patient", value_name = "ID")]
    pub patients: Vec<i64>,

    #[arg(long = "gender", value_enum)]
    pub gender: Option<GenderArg>,

    /// Minimum age in days.
    #[arg(long = "min-age", value_name = "DAYS")]
    pub min_age: Option<i64>,

    /// Maximum age in days.
    #[arg(long = "max-age", value_name = "DAYS")]
    pub max_age: Option<i64>,

    #[arg(long = "min-bmi", value_name = "BMI")]
    pub min_bmi: Option<f64>,

    #[arg(long = "max-bmi", value_name = "BMI")]
    pub max_bmi: Option<f64>,
}

impl PatientFilterArgs {
    pub fn to_filter(&self, limit: Option<usize>) -> PatientFilter {
        PatientFilter {
            ids: self.patients.clone(),
            gender: self.gender.map(Gender::from),
            min_age: self.min_age,
            max_age: self.max_age,
            min_bmi: self.min_bmi,
            max_bmi: self.max_bmi,
            limit,
        }
    }
}

/// Metric selection; patients come from [`PatientFilterArgs`].
#[derive(Args, Default)]
pub struct MetricFilterArgs {
    /// Earliest timestamp (inclusive).
    #[arg(long = "start", value_name = "DATETIME", value_parser = parse_datetime_arg)]
    pub start: Option<NaiveDateTime>,

    /// Latest timestamp (inclusive).
    #[arg(long = "end", value_name = "DATETIME", value_parser = parse_datetime_arg)]
    pub end: Option<NaiveDateTime>,

    #[arg(long = "min-systolic", value_name = "MMHG")]
    pub min_systolic: Option<i64>,

    #[arg(long = "max-systolic", value_name = "MMHG")]
    pub max_systolic: Option<i64>,

    #[arg(long = "min-diastolic", value_name = "MMHG")]
    pub min_diastolic: Option<i64>,

    #[arg(long = "max-diastolic", value_name = "MMHG")]
    pub max_diastolic: Option<i64>,

    /// Only rows with (true) or without (false) cardiovascular disease.
    #[arg(long = "cardio", value_name = "BOOL")]
    pub cardio: Option<bool>,
}

impl MetricFilterArgs {
    pub fn to_filter(&self, patient_ids: &[i64], limit: Option<usize>) -> MetricFilter {
        MetricFilter {
            patient_ids: patient_ids.to_vec(),
            start: self.start,
            end: self.end,
            min_systolic: self.min_systolic,
            max_systolic: self.max_systolic,
            min_diastolic: self.min_diastolic,
            max_diastolic: self.max_diastolic,
            cardiovascular_disease: self.cardio,
            limit,
        }
    }
}

#[derive(Subcommand)]
pub enum PatientsCommand {
    /// List patients matching the filters.
    List(PatientListArgs),

    /// Show one patient with all of their metrics.
    Show {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: i64,
    },

    /// Delete a patient together with their metrics, images and signals.
    Delete {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: i64,
    },
}

#[derive(Args)]
pub struct PatientListArgs {
    #[command(flatten)]
    pub filter: PatientFilterArgs,

    #[arg(long = "limit", value_name = "N")]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Restrict to this patient (repeatable).
    #[arg(long = "patient", value_name = "ID")]
    pub patients: Vec<i64>,
}

#[derive(Args)]
pub struct CorrelateArgs {
    /// First metric (e.g. systolic_bp, ap_hi, bmi, age).
    #[arg(value_name = "METRIC1")]
    pub metric1: String,

    #[arg(value_name = "METRIC2")]
    pub metric2: String,

    #[arg(long = "method", value_enum, default_value = "pearson")]
    pub method: CorrelationArg,

    #[command(flatten)]
    pub filter: PatientFilterArgs,

    /// Store the result in the database.
    #[arg(long = "save")]
    pub save: bool,

    /// Notes stored with the result.
    #[arg(long = "notes", value_name = "TEXT", requires = "save")]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct MatrixArgs {
    /// Comma-separated metrics (default: age, bmi and the vital signs).
    #[arg(long = "columns", value_name = "LIST", value_delimiter = ',')]
    pub columns: Vec<String>,

    #[arg(long = "method", value_enum, default_value = "pearson")]
    pub method: CorrelationArg,

    /// Pairs with |r| at least this large are listed as strong.
    #[arg(long = "min-abs", value_name = "R", default_value_t = 0.5)]
    pub min_abs: f64,

    #[command(flatten)]
    pub filter: PatientFilterArgs,
}

#[derive(Args)]
pub struct TrendArgs {
    #[arg(value_name = "PATIENT_ID")]
    pub patient_id: i64,

    /// Measurement (e.g. systolic_bp, heart_rate, glucose).
    #[arg(value_name = "METRIC")]
    pub metric: String,

    /// Anomaly detection method.
    #[arg(long = "method", value_enum, default_value = "zscore")]
    pub method: AnomalyArg,

    /// Anomaly threshold (default: 3 for zscore, 1.5 for iqr).
    #[arg(long = "threshold", value_name = "K")]
    pub threshold: Option<f64>,

    /// JSON file with a list of filter steps applied before analysis.
    #[arg(long = "filters", value_name = "FILE")]
    pub filters: Option<PathBuf>,

    /// Aggregate the series into calendar buckets.
    #[arg(long = "resample", value_enum)]
    pub resample: Option<PeriodArg>,

    #[arg(long = "aggregation", value_enum, default_value = "mean")]
    pub aggregation: AggregationArg,

    /// Report the percent change over this many points.
    #[arg(long = "rate-period", value_name = "N")]
    pub rate_period: Option<usize>,
}

#[derive(Args)]
pub struct SpectrumArgs {
    /// Signal CSV file.
    #[arg(
        value_name = "FILE",
        required_unless_present = "signal",
        conflicts_with = "signal"
    )]
    pub file: Option<PathBuf>,

    /// Registered signal id instead of a file.
    #[arg(long = "signal", value_name = "ID")]
    pub signal: Option<i64>,

    /// Sampling rate in Hz (default: from the file or the configuration).
    #[arg(long = "sampling-rate", value_name = "HZ")]
    pub sampling_rate: Option<f64>,

    #[arg(long = "window", value_enum, default_value = "hann")]
    pub window: WindowArg,

    #[arg(long = "normalization", value_enum, default_value = "length")]
    pub normalization: NormalizationArg,

    /// FFT size (zero padding or truncation).
    #[arg(long = "nfft", value_name = "N")]
    pub nfft: Option<usize>,

    /// Number of peaks to report.
    #[arg(long = "peaks", value_name = "N", default_value_t = medi_signal::DEFAULT_PEAK_COUNT)]
    pub peaks: usize,

    /// Averaged (Welch) density instead of a single FFT.
    #[arg(long = "welch")]
    pub welch: bool,

    /// Welch segment length.
    #[arg(long = "segment", value_name = "N", requires = "welch")]
    pub segment: Option<usize>,

    /// JSON file with a list of preprocessing steps.
    #[arg(long = "preprocess", value_name = "FILE")]
    pub preprocess: Option<PathBuf>,

    /// Write the spectrum CSV here (default with --save: next to the signal).
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Store the analysis for the registered signal.
    #[arg(long = "save", requires = "signal")]
    pub save: bool,
}

#[derive(Subcommand)]
pub enum SignalCommand {
    /// Register a signal file, optionally for a patient.
    Register(SignalRegisterArgs),

    /// Write a synthetic signal to a CSV file.
    Generate(GenerateArgs),

    /// List registered signals.
    List {
        #[arg(long = "patient", value_name = "ID")]
        patient: Option<i64>,

        /// Signal type such as ECG or EEG.
        #[arg(long = "type", value_name = "TYPE")]
        signal_type: Option<String>,
    },
}

#[derive(Args)]
pub struct SignalRegisterArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(long = "patient", value_name = "ID")]
    pub patient: Option<i64>,

    /// Signal type (default: guessed from the spectrum).
    #[arg(long = "type", value_name = "TYPE")]
    pub signal_type: Option<String>,

    #[arg(long = "sampling-rate", value_name = "HZ")]
    pub sampling_rate: Option<f64>,

    #[arg(long = "notes", value_name = "TEXT")]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    #[arg(long = "kind", value_enum, default_value = "ecg")]
    pub kind: SyntheticArg,

    /// Seconds.
    #[arg(long = "duration", value_name = "SECONDS", default_value_t = 10.0)]
    pub duration: f64,

    /// Hz (default: the configured default sampling rate).
    #[arg(long = "sampling-rate", value_name = "HZ")]
    pub sampling_rate: Option<f64>,

    /// Sine frequency in Hz.
    #[arg(long = "frequency", value_name = "HZ", default_value_t = 10.0)]
    pub frequency: f64,

    /// Sine amplitude.
    #[arg(long = "amplitude", value_name = "A", default_value_t = 1.0)]
    pub amplitude: f64,

    /// ECG beats per minute.
    #[arg(long = "heart-rate", value_name = "BPM", default_value_t = 72.0)]
    pub heart_rate: f64,

    /// Leave out the ECG baseline wander.
    #[arg(long = "no-baseline-wander")]
    pub no_baseline_wander: bool,
}

#[derive(Subcommand)]
pub enum ImageCommand {
    /// Record the metadata of an image file.
    Register(ImageRegisterArgs),

    /// List registered images.
    List {
        #[arg(long = "patient", value_name = "ID")]
        patient: Option<i64>,
    },

    /// Remove an image record (the file itself is left alone).
    Delete {
        #[arg(value_name = "IMAGE_ID")]
        image_id: i64,
    },
}

#[derive(Args)]
pub struct ImageRegisterArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(long = "patient", value_name = "ID")]
    pub patient: Option<i64>,

    /// Image type (default: the file extension, e.g. png, dcm).
    #[arg(long = "type", value_name = "TYPE")]
    pub image_type: Option<String>,

    /// Processing already applied to the image.
    #[arg(long = "processing", value_name = "METHOD")]
    pub processing: Option<String>,

    #[arg(long = "width", value_name = "PX")]
    pub width: Option<i64>,

    #[arg(long = "height", value_name = "PX")]
    pub height: Option<i64>,

    #[arg(long = "notes", value_name = "TEXT")]
    pub notes: Option<String>,
}

fn parse_datetime_arg(value: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(value)
        .ok_or_else(|| format!("expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS, got {value:?}"))
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GenderArg {
    Female,
    Male,
}

impl From<GenderArg> for Gender {
    fn from(value: GenderArg) -> Self {
        match value {
            GenderArg::Female => Gender::Female,
            GenderArg::Male => Gender::Male,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DuplicatesArg {
    Skip,
    Update,
    Fail,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(value: DuplicatesArg) -> Self {
        match value {
            DuplicatesArg::Skip => DuplicatePolicy::Skip,
            DuplicatesArg::Update => DuplicatePolicy::Update,
            DuplicatesArg::Fail => DuplicatePolicy::Fail,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CorrelationArg {
    Pearson,
    Spearman,
}

impl From<CorrelationArg> for CorrelationMethod {
    fn from(value: CorrelationArg) -> Self {
        match value {
            CorrelationArg::Pearson => CorrelationMethod::Pearson,
            CorrelationArg::Spearman => CorrelationMethod::Spearman,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AnomalyArg {
    Zscore,
    Iqr,
}

impl AnomalyArg {
    pub fn default_threshold(self) -> f64 {
        match self {
            AnomalyArg::Zscore => 3.0,
            AnomalyArg::Iqr => 1.5,
        }
    }
}

impl From<AnomalyArg> for AnomalyMethod {
    fn from(value: AnomalyArg) -> Self {
        match value {
            AnomalyArg::Zscore => AnomalyMethod::ZScore,
            AnomalyArg::Iqr => AnomalyMethod::Iqr,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PeriodArg {
    Hour,
    Day,
    Week,
    Month,
}

impl From<PeriodArg> for ResamplePeriod {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Hour => ResamplePeriod::Hour,
            PeriodArg::Day => ResamplePeriod::Day,
            PeriodArg::Week => ResamplePeriod::Week,
            PeriodArg::Month => ResamplePeriod::Month,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AggregationArg {
    Mean,
    Sum,
    Min,
    Max,
    Median,
}

impl From<AggregationArg> for Aggregation {
    fn from(value: AggregationArg) -> Self {
        match value {
            AggregationArg::Mean => Aggregation::Mean,
            AggregationArg::Sum => Aggregation::Sum,
            AggregationArg::Min => Aggregation::Min,
            AggregationArg::Max => Aggregation::Max,
            AggregationArg::Median => Aggregation::Median,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum WindowArg {
    None,
    Hann,
    Hamming,
    Blackman,
}

impl From<WindowArg> for WindowFunction {
    fn from(value: WindowArg) -> Self {
        match value {
            WindowArg::None => WindowFunction::None,
            WindowArg::Hann => WindowFunction::Hann,
            WindowArg::Hamming => WindowFunction::Hamming,
            WindowArg::Blackman => WindowFunction::Blackman,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NormalizationArg {
    None,
    Length,
    Density,
}

impl From<NormalizationArg> for Normalization {
    fn from(value: NormalizationArg) -> Self {
        match value {
            NormalizationArg::None => Normalization::None,
            NormalizationArg::Length => Normalization::Length,
            NormalizationArg::Density => Normalization::Density,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SyntheticArg {
    Ecg,
    Eeg,
    Sine,
}

impl SyntheticArg {
    pub fn as_str(self) -> &'static str {
        match self {
            SyntheticArg::Ecg => "ECG",
            SyntheticArg::Eeg => "EEG",
            SyntheticArg::Sine => "SINE",
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn import_flags_parse() {
        let cli = Cli::try_parse_from([
            "medianalyze",
            "--database",
            "medi.db",
            "import",
            "data.csv",
            "--duplicates",
            "update",
            "--batch-size",
            "10",
            "--observed-at",
            "2024-01-02",
        ])
        .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("medi.db")));
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.batch_size, Some(10));
        assert!(matches!(args.duplicates, Some(DuplicatesArg::Update)));
        assert_eq!(
            args.observed_at.map(|ts| ts.to_string()),
            Some("2024-01-02 00:00:00".to_string())
        );
    }

    #[test]
    fn spectrum_needs_a_source() {
        assert!(Cli::try_parse_from(["medianalyze", "spectrum"]).is_err());
        assert!(Cli::try_parse_from(["medianalyze", "spectrum", "ecg.csv", "--save"]).is_err());
        assert!(
            Cli::try_parse_from(["medianalyze", "spectrum", "--signal", "3", "--save"]).is_ok()
        );
    }

    #[test]
    fn matrix_columns_split_on_commas() {
        let cli = Cli::try_parse_from([
            "medianalyze",
            "correlation-matrix",
            "--columns",
            "age,bmi,glucose",
        ])
        .unwrap();
        let Command::CorrelationMatrix(args) = cli.command else {
            panic!("expected correlation-matrix");
        };
        assert_eq!(args.columns, vec!["age", "bmi", "glucose"]);
    }
}
