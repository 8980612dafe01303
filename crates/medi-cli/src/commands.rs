use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use tracing::{debug, info, info_span, trace, warn};

use medi_analysis::{
    DEFAULT_MATRIX_COLUMNS, FilterStep, analyze_pair, analyze_points, apply_chain,
    correlation_matrix, correlation_summary, metrics_frame, patient_series, rate_of_change,
    resample,
};
use medi_etl::{
    ExportSummary, ImportProgress, ImportReport, Importer, export_combined, export_metrics,
    export_patients,
};
use medi_ingest::{CsvLoadOptions, SignalLoadOptions, load_csv, load_signal_csv, write_signal_csv};
use medi_model::{
    BiomedicalSignal, Field, HealthMetric, ImportOptions, MedicalImage, NewBiomedicalSignal,
    NewMedicalImage, Patient,
};
use medi_signal::{
    EcgOptions, PreprocessStep, SpectrumConfig, analyze, detect_signal_type, ecg, eeg, preprocess,
    sine, spectrum_path, summarize, welch_psd, write_spectrum_csv,
};
use medi_store::{MetricFilter, PatientWithMetrics, Store, SummaryStatistics};
use medi_validate::{check_columns, validate_rows};

use crate::cli::{
    CorrelateArgs, ExportArgs, ExportKind, GenerateArgs, ImageRegisterArgs, ImportArgs,
    MatrixArgs, PatientFilterArgs, PatientListArgs, SignalRegisterArgs, SpectrumArgs, StatsArgs,
    SyntheticArg, TrendArgs, ValidateArgs,
};
use crate::config::Config;
use crate::logging::redact_value;
use crate::types::{
    CorrelateResult, DeletedPatient, GeneratedSignal, InitDbResult, MatrixResult,
    RegisteredSignal, ResampledPoint, SpectrumResult, TableCount, TrendResult, ValidationReport,
    ViolationCount,
};

/// Configuration and database location shared by every command.
pub struct AppContext {
    pub config: Config,
    pub database: PathBuf,
}

impl AppContext {
    pub fn new(config: Config, database_flag: Option<&Path>) -> Self {
        let database = config.database_path(database_flag);
        Self { config, database }
    }

    pub fn open_store(&self) -> Result<Store> {
        if let Some(parent) = self.database.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create database folder {}", parent.display()))?;
        }
        Store::open(&self.database)
            .with_context(|| format!("open database {}", self.database.display()))
    }

    fn load_options(&self, delimiter: Option<&str>) -> Result<CsvLoadOptions> {
        let options = CsvLoadOptions::default();
        Ok(match self.config.delimiter(delimiter)? {
            Some(delimiter) => options.with_delimiter(delimiter),
            None => options,
        })
    }
}

pub fn run_init_db(ctx: &AppContext) -> Result<InitDbResult> {
    let store = ctx.open_store()?;
    let tables = store
        .table_counts()
        .context("count table rows")?
        .into_iter()
        .map(|(table, rows)| TableCount { table, rows })
        .collect();
    info!(database = %ctx.database.display(), "database ready");
    Ok(InitDbResult {
        database: ctx.database.clone(),
        tables,
    })
}

pub fn run_validate(ctx: &AppContext, args: &ValidateArgs) -> Result<ValidationReport> {
    let span = info_span!("validate", path = %args.file.display());
    let _guard = span.enter();
    let options = ctx.load_options(args.delimiter.as_deref())?;
    let loaded = load_csv(&args.file, &options)
        .with_context(|| format!("load {}", args.file.display()))?;
    let column_issues = check_columns(&loaded.headers);
    let outcome = validate_rows(&loaded.rows);
    for row in &outcome.rejected {
        trace!(line = row.line, reason = %redact_value(&row.reason()), "row rejected");
    }
    let violation_counts = outcome
        .violation_counts()
        .into_iter()
        .map(|(code, count)| ViolationCount { code, count })
        .collect();
    info!(
        total = outcome.total(),
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "validation complete"
    );
    Ok(ValidationReport {
        source: args.file.clone(),
        delimiter: delimiter_name(loaded.delimiter),
        encoding: loaded.encoding,
        total_rows: outcome.total(),
        accepted: outcome.accepted.len(),
        rejected: outcome.rejected,
        column_issues,
        violation_counts,
    })
}

fn delimiter_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "tab".to_string(),
        other => char::from(other).to_string(),
    }
}

pub fn run_import(ctx: &AppContext, args: &ImportArgs, show_progress: bool) -> Result<ImportReport> {
    let mut store = ctx.open_store()?;
    let mut options = ImportOptions::new()
        .with_batch_size(args.batch_size.unwrap_or(ctx.config.import.batch_size))
        .with_duplicates(
            args.duplicates
                .map_or(ctx.config.import.duplicates, Into::into),
        )
        .with_dry_run(args.dry_run);
    if let Some(observed_at) = args.observed_at {
        options = options.with_observed_at(observed_at);
    }
    let load = ctx.load_options(args.delimiter.as_deref())?;

    let bar = if show_progress && !args.no_progress && io::stderr().is_terminal() {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} rows {msg}")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let start = Instant::now();
    let result = Importer::new(&mut store, options)
        .with_progress(|progress: &ImportProgress| {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.processed as u64);
            bar.set_message(progress.message.clone());
        })
        .import_file(&args.file, &load);
    bar.finish_and_clear();
    let report = result.with_context(|| format!("import {}", args.file.display()))?;

    for row in &report.rejected {
        trace!(line = row.line, reason = %redact_value(&row.reason()), "row rejected");
    }
    for failure in &report.chunk_failures {
        warn!(
            chunk = failure.index,
            first_line = failure.first_line,
            last_line = failure.last_line,
            "chunk rolled back"
        );
    }
    info!(
        duration_ms = start.elapsed().as_millis(),
        dry_run = report.dry_run,
        "import finished"
    );
    Ok(report)
}

pub fn run_export(ctx: &AppContext, args: &ExportArgs) -> Result<ExportSummary> {
    let store = ctx.open_store()?;
    let ids = &args.patients.patients;
    let summary = match args.kind {
        ExportKind::Patients => {
            export_patients(&store, &args.patients.to_filter(args.limit), &args.output)
        }
        ExportKind::Metrics => {
            export_metrics(&store, &args.metrics.to_filter(ids, args.limit), &args.output)
        }
        ExportKind::Combined => export_combined(
            &store,
            &args.patients.to_filter(None),
            &args.metrics.to_filter(ids, args.limit),
            &args.output,
        ),
    };
    summary.with_context(|| format!("export to {}", args.output.display()))
}

pub fn run_patient_list(ctx: &AppContext, args: &PatientListArgs) -> Result<Vec<Patient>> {
    let store = ctx.open_store()?;
    store
        .patients(&args.filter.to_filter(args.limit))
        .context("query patients")
}

pub fn run_patient_show(ctx: &AppContext, patient_id: i64) -> Result<PatientWithMetrics> {
    let store = ctx.open_store()?;
    let found = store
        .patient_with_metrics(patient_id)
        .context("query patient")?
        .ok_or_else(|| anyhow!("patient {patient_id} not found"))?;
    trace!(
        patient_id,
        name = %redact_value(found.patient.name.as_deref().unwrap_or("")),
        "patient loaded"
    );
    Ok(found)
}

pub fn run_patient_delete(ctx: &AppContext, patient_id: i64) -> Result<DeletedPatient> {
    let store = ctx.open_store()?;
    let found = store
        .patient_with_metrics(patient_id)
        .context("query patient")?
        .ok_or_else(|| anyhow!("patient {patient_id} not found"))?;
    let images = store.images(Some(patient_id))?.len();
    let signals = store.signals(Some(patient_id), None)?.len();
    store
        .delete_patient(patient_id)
        .with_context(|| format!("delete patient {patient_id}"))?;
    info!(patient_id, metrics = found.metrics.len(), images, signals, "patient deleted");
    Ok(DeletedPatient {
        patient_id,
        metrics: found.metrics.len(),
        images,
        signals,
    })
}

pub fn run_stats(ctx: &AppContext, args: &StatsArgs) -> Result<SummaryStatistics> {
    let store = ctx.open_store()?;
    store
        .summary_statistics(&args.patients)
        .context("compute summary statistics")
}

/// Patients matching `filter` and their metrics, for frame building.
fn select_data(store: &Store, filter: &PatientFilterArgs) -> Result<(Vec<Patient>, Vec<HealthMetric>)> {
    let patients = store
        .patients(&filter.to_filter(None))
        .context("query patients")?;
    if patients.is_empty() {
        bail!("no patients match the selection");
    }
    let metric_filter = MetricFilter {
        patient_ids: patients.iter().map(|p| p.patient_id).collect(),
        ..MetricFilter::default()
    };
    let metrics = store.metrics(&metric_filter).context("query metrics")?;
    debug!(patients = patients.len(), metrics = metrics.len(), "analysis data selected");
    Ok((patients, metrics))
}

/// Frame column for a user-supplied metric name (aliases such as `ap_hi`
/// resolve to their canonical column).
pub fn frame_column(name: &str) -> String {
    let lowered = name.trim().to_ascii_lowercase();
    if lowered == "bmi" {
        return lowered;
    }
    Field::parse(&lowered).map_or(lowered, |field| field.name().to_string())
}

pub fn run_correlate(ctx: &AppContext, args: &CorrelateArgs) -> Result<CorrelateResult> {
    let store = ctx.open_store()?;
    let (patients, metrics) = select_data(&store, &args.filter)?;
    let df = metrics_frame(&patients, &metrics).context("build metrics frame")?;
    let metric1 = frame_column(&args.metric1);
    let metric2 = frame_column(&args.metric2);
    let correlation = analyze_pair(&df, &metric1, &metric2, args.method.into())
        .with_context(|| format!("correlate {metric1} with {metric2}"))?;
    let correlation_id = if args.save {
        let id = store
            .insert_correlation(&correlation.to_record(args.notes.clone()))
            .context("store correlation")?;
        info!(correlation_id = id, "correlation saved");
        Some(id)
    } else {
        None
    };
    Ok(CorrelateResult {
        correlation,
        correlation_id,
    })
}

pub fn run_matrix(ctx: &AppContext, args: &MatrixArgs) -> Result<MatrixResult> {
    let store = ctx.open_store()?;
    let (patients, metrics) = select_data(&store, &args.filter)?;
    let df = metrics_frame(&patients, &metrics).context("build metrics frame")?;
    let columns: Vec<String> = if args.columns.is_empty() {
        DEFAULT_MATRIX_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        args.columns.iter().map(|c| frame_column(c)).collect()
    };
    let method = args.method.into();
    let matrix = correlation_matrix(&df, &columns, method).context("correlation matrix")?;
    let strong_pairs =
        correlation_summary(&df, &columns, method, args.min_abs).context("correlation summary")?;
    Ok(MatrixResult {
        rows: df.height(),
        matrix,
        min_abs: args.min_abs,
        strong_pairs,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read {what} file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {what} file {}", path.display()))
}

pub fn run_trend(ctx: &AppContext, args: &TrendArgs) -> Result<TrendResult> {
    let field = Field::parse(&args.metric)
        .filter(|f| Field::MEASUREMENTS.contains(f))
        .ok_or_else(|| anyhow!("{} is not a trendable measurement", args.metric))?;
    let store = ctx.open_store()?;
    if store.patient(args.patient_id)?.is_none() {
        bail!("patient {} not found", args.patient_id);
    }
    let metrics = store
        .metrics(&MetricFilter {
            patient_ids: vec![args.patient_id],
            ..MetricFilter::default()
        })
        .context("query metrics")?;

    let mut points = patient_series(&metrics, args.patient_id, field);
    let steps: Vec<FilterStep> = match &args.filters {
        Some(path) => read_json(path, "filter")?,
        None => Vec::new(),
    };
    if !steps.is_empty() {
        let values: Vec<Option<f64>> = points.iter().map(|(_, v)| *v).collect();
        let filtered = apply_chain(&values, &steps).context("apply filters")?;
        for (point, value) in points.iter_mut().zip(filtered) {
            point.1 = value;
        }
    }

    let threshold = args
        .threshold
        .unwrap_or_else(|| args.method.default_threshold());
    let report = analyze_points(args.patient_id, field, &points, args.method.into(), threshold);
    let resampled = args.resample.map(|period| {
        resample(&points, period.into(), args.aggregation.into())
            .into_iter()
            .map(|(bucket, value)| ResampledPoint { bucket, value })
            .collect()
    });
    let rate = args.rate_period.map(|period| {
        let values: Vec<Option<f64>> = points.iter().map(|(_, v)| *v).collect();
        rate_of_change(&values, period)
    });
    info!(
        patient_id = args.patient_id,
        metric = %field,
        points = report.data_points,
        anomalies = report.anomalies.len(),
        "trend analysed"
    );
    Ok(TrendResult {
        report,
        filter_steps: steps.len(),
        resampled,
        rate_of_change: rate,
    })
}

pub fn run_spectrum(ctx: &AppContext, args: &SpectrumArgs) -> Result<SpectrumResult> {
    let store = if args.signal.is_some() {
        Some(ctx.open_store()?)
    } else {
        None
    };
    let (source, stored_rate) = match (&store, args.signal) {
        (Some(store), Some(signal_id)) => {
            let signal = store
                .signal(signal_id)?
                .ok_or_else(|| anyhow!("signal {signal_id} not found"))?;
            (PathBuf::from(signal.signal_data_path), signal.sampling_rate)
        }
        _ => match &args.file {
            Some(file) => (file.clone(), None),
            None => bail!("a signal file or --signal is required"),
        },
    };
    let span = info_span!("spectrum", path = %source.display());
    let _guard = span.enter();

    let loaded = load_signal_csv(
        &source,
        &SignalLoadOptions {
            sampling_rate: args.sampling_rate.or(stored_rate),
            default_sampling_rate: Some(ctx.config.signal.default_sampling_rate),
            ..SignalLoadOptions::default()
        },
    )
    .with_context(|| format!("load signal {}", source.display()))?;
    let mut samples = loaded.samples;
    if let Some(path) = &args.preprocess {
        let steps: Vec<PreprocessStep> = read_json(path, "preprocessing")?;
        samples = preprocess(&samples, &steps).context("preprocess signal")?;
    }

    let (spectrum, report, method) = if args.welch {
        let spectrum = welch_psd(&samples, loaded.sampling_rate, args.segment)
            .context("compute Welch spectrum")?;
        let report = summarize(&spectrum, samples.len(), args.peaks);
        (spectrum, report, "welch")
    } else {
        let config = SpectrumConfig::default()
            .with_window(args.window.into())
            .with_normalization(args.normalization.into());
        let config = match args.nfft {
            Some(nfft) => config.with_nfft(nfft),
            None => config,
        };
        let (spectrum, report) =
            analyze(&samples, loaded.sampling_rate, &config, args.peaks).context("compute spectrum")?;
        (spectrum, report, "fft")
    };

    let spectrum_file = match (&args.output, args.save.then_some(args.signal).flatten()) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(signal_id)) => Some(spectrum_path(&source, signal_id)),
        (None, None) => None,
    };
    if let Some(path) = &spectrum_file {
        write_spectrum_csv(path, &spectrum)
            .with_context(|| format!("write spectrum {}", path.display()))?;
    }

    let analysis_id = match (&store, args.signal, &spectrum_file) {
        (Some(store), Some(signal_id), Some(path)) if args.save => {
            let id = store
                .insert_spectrum_analysis(&report.to_record(signal_id, path))
                .context("store spectrum analysis")?;
            info!(analysis_id = id, signal_id, "spectrum analysis saved");
            Some(id)
        }
        _ => None,
    };

    Ok(SpectrumResult {
        source,
        signal_id: args.signal,
        method,
        report,
        spectrum_file,
        analysis_id,
    })
}

fn stored_path(path: &Path) -> Result<String> {
    let absolute = fs::canonicalize(path).with_context(|| format!("resolve {}", path.display()))?;
    Ok(absolute.display().to_string())
}

pub fn run_signal_register(ctx: &AppContext, args: &SignalRegisterArgs) -> Result<RegisteredSignal> {
    let loaded = load_signal_csv(
        &args.file,
        &SignalLoadOptions {
            sampling_rate: args.sampling_rate,
            default_sampling_rate: Some(ctx.config.signal.default_sampling_rate),
            ..SignalLoadOptions::default()
        },
    )
    .with_context(|| format!("load signal {}", args.file.display()))?;
    let signal_type = match &args.signal_type {
        Some(kind) => kind.trim().to_ascii_uppercase(),
        None => detect_signal_type(&loaded.samples, loaded.sampling_rate)
            .as_str()
            .to_string(),
    };
    let store = ctx.open_store()?;
    let signal_id = store
        .insert_signal(&NewBiomedicalSignal {
            patient_id: args.patient,
            signal_type: signal_type.clone(),
            signal_data_path: stored_path(&args.file)?,
            sampling_rate: Some(loaded.sampling_rate),
            duration: Some(loaded.metadata.duration),
            number_of_channels: Some(1),
            notes: args.notes.clone(),
        })
        .context("store signal")?;
    info!(signal_id, signal_type = %signal_type, "signal registered");
    Ok(RegisteredSignal {
        signal_id,
        signal_type,
        metadata: loaded.metadata,
    })
}

pub fn run_signal_generate(ctx: &AppContext, args: &GenerateArgs) -> Result<GeneratedSignal> {
    let sampling_rate = args
        .sampling_rate
        .unwrap_or(ctx.config.signal.default_sampling_rate);
    let samples = match args.kind {
        SyntheticArg::Ecg => ecg(&EcgOptions {
            duration: args.duration,
            sampling_rate,
            heart_rate: args.heart_rate,
            baseline_wander: !args.no_baseline_wander,
        }),
        SyntheticArg::Eeg => eeg(args.duration, sampling_rate),
        SyntheticArg::Sine => sine(args.frequency, args.amplitude, args.duration, sampling_rate),
    }
    .context("generate signal")?;
    write_signal_csv(&args.output, &samples, sampling_rate)
        .with_context(|| format!("write {}", args.output.display()))?;
    Ok(GeneratedSignal {
        path: args.output.clone(),
        kind: args.kind.as_str(),
        samples: samples.len(),
        sampling_rate,
        duration: samples.len() as f64 / sampling_rate,
    })
}

pub fn run_signal_list(
    ctx: &AppContext,
    patient: Option<i64>,
    signal_type: Option<&str>,
) -> Result<Vec<BiomedicalSignal>> {
    let store = ctx.open_store()?;
    store.signals(patient, signal_type).context("query signals")
}

pub fn run_image_register(ctx: &AppContext, args: &ImageRegisterArgs) -> Result<MedicalImage> {
    let metadata = fs::metadata(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a file", args.file.display());
    }
    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", args.file.display()))?;
    let image_type = args.image_type.clone().or_else(|| {
        args.file
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    });
    let store = ctx.open_store()?;
    let image_id = store
        .insert_image(&NewMedicalImage {
            patient_id: args.patient,
            filename: filename.clone(),
            image_path: stored_path(&args.file)?,
            image_type,
            processing_method: args.processing.clone(),
            original_filename: Some(filename),
            file_size: i64::try_from(metadata.len()).ok(),
            width: args.width,
            height: args.height,
            notes: args.notes.clone(),
        })
        .context("store image")?;
    info!(image_id, "image registered");
    store
        .image(image_id)?
        .ok_or_else(|| anyhow!("image {image_id} vanished after insert"))
}

pub fn run_image_list(ctx: &AppContext, patient: Option<i64>) -> Result<Vec<MedicalImage>> {
    let store = ctx.open_store()?;
    store.images(patient).context("query images")
}

pub fn run_image_delete(ctx: &AppContext, image_id: i64) -> Result<i64> {
    let store = ctx.open_store()?;
    if !store.delete_image(image_id).context("delete image")? {
        bail!("image {image_id} not found");
    }
    Ok(image_id)
}
