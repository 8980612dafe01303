use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use medi_etl::{ExportSummary, ImportReport};
use medi_model::{BiomedicalSignal, HealthMetric, MedicalImage, Patient, RejectedRow};
use medi_store::{PatientWithMetrics, SummaryStatistics};

use crate::types::{
    CorrelateResult, DeletedPatient, GeneratedSignal, InitDbResult, MatrixResult,
    RegisteredSignal, SpectrumResult, TrendResult, ValidationReport,
};

pub fn print_init_db(result: &InitDbResult) {
    println!("Database: {}", result.database.display());
    let mut table = Table::new();
    table.set_header(vec![header_cell("Table"), header_cell("Rows")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for count in &result.tables {
        table.add_row(vec![Cell::new(count.table), Cell::new(count.rows)]);
    }
    println!("{table}");
}

pub fn print_validation(report: &ValidationReport, show: usize) {
    println!("File: {}", report.source.display());
    println!(
        "Delimiter: {}  Encoding: {:?}",
        report.delimiter, report.encoding
    );
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rows"),
        header_cell("Accepted"),
        header_cell("Rejected"),
        header_cell("Header issues"),
    ]);
    apply_summary_table_style(&mut table);
    for idx in 0..4 {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    table.add_row(vec![
        Cell::new(report.total_rows),
        Cell::new(report.accepted).fg(Color::Green),
        count_cell(report.rejected.len(), Color::Red),
        count_cell(report.column_issues.len(), Color::Yellow),
    ]);
    println!("{table}");

    if !report.violation_counts.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![header_cell("Violation"), header_cell("Count")]);
        apply_table_style(&mut table);
        align_column(&mut table, 1, CellAlignment::Right);
        for count in &report.violation_counts {
            table.add_row(vec![
                Cell::new(count.code.as_str()),
                count_cell(count.count, Color::Red),
            ]);
        }
        println!();
        println!("{table}");
    }
    print_column_issues(&report.column_issues);
    print_rejected(&report.rejected, show);
}

fn print_column_issues(issues: &[medi_model::Violation]) {
    if issues.is_empty() {
        return;
    }
    println!();
    println!("Header issues:");
    for issue in issues {
        println!("- {issue}");
    }
}

/// Table of rejected rows, at most `show` of them.
pub fn rejected_table(rejected: &[RejectedRow], show: usize) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Line"), header_cell("Reason")]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for row in rejected.iter().take(show) {
        table.add_row(vec![Cell::new(row.line), Cell::new(row.reason())]);
    }
    if rejected.len() > show {
        table.add_row(vec![
            dim_cell("..."),
            dim_cell(format!("{} more", rejected.len() - show)),
        ]);
    }
    table
}

fn print_rejected(rejected: &[RejectedRow], show: usize) {
    if rejected.is_empty() || show == 0 {
        return;
    }
    println!();
    println!("Rejected rows:");
    println!("{}", rejected_table(rejected, show));
}

pub fn print_import(report: &ImportReport) {
    if let Some(source) = &report.source {
        println!("File: {}", source.display());
    }
    if report.dry_run {
        println!("Dry run: nothing was written");
    }
    let counts = &report.counts;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rows"),
        header_cell("Accepted"),
        header_cell("Rejected"),
        header_cell("Patients new"),
        header_cell("Patients updated"),
        header_cell("Metrics new"),
        header_cell("Metrics updated"),
        header_cell("Skipped"),
        header_cell("Failed chunks"),
    ]);
    apply_summary_table_style(&mut table);
    for idx in 0..9 {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    table.add_row(vec![
        Cell::new(report.total_rows),
        Cell::new(report.accepted).fg(Color::Green),
        count_cell(report.rejected.len(), Color::Red),
        Cell::new(counts.patients_created),
        Cell::new(counts.patients_updated),
        Cell::new(counts.metrics_inserted),
        Cell::new(counts.metrics_updated),
        count_cell(counts.metrics_skipped, Color::Yellow),
        count_cell(report.chunk_failures.len(), Color::Red),
    ]);
    println!("{table}");
    print_column_issues(&report.column_issues);
    print_rejected(&report.rejected, 20);

    if !report.row_errors.is_empty() || !report.chunk_failures.is_empty() {
        eprintln!("Errors:");
        for error in &report.row_errors {
            eprintln!("- line {}: {}", error.line, error.reason);
        }
        for failure in &report.chunk_failures {
            eprintln!(
                "- chunk {} (lines {}-{}): {}",
                failure.index, failure.first_line, failure.last_line, failure.reason
            );
        }
    }
}

pub fn print_export(summary: &ExportSummary) {
    println!("Wrote {} rows to {}", summary.rows, summary.path.display());
}

pub fn patients_table(patients: &[Patient]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Age (days)"),
        header_cell("Gender"),
        header_cell("Height"),
        header_cell("Weight"),
        header_cell("BMI"),
    ]);
    apply_table_style(&mut table);
    for idx in [0, 1, 3, 4, 5] {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    for patient in patients {
        table.add_row(vec![
            Cell::new(patient.patient_id).add_attribute(Attribute::Bold),
            Cell::new(patient.age),
            Cell::new(patient.gender.as_str()),
            Cell::new(format!("{:.1}", patient.height)),
            Cell::new(format!("{:.1}", patient.weight)),
            Cell::new(format!("{:.2}", patient.bmi())),
        ]);
    }
    table
}

pub fn print_patients(patients: &[Patient]) {
    if patients.is_empty() {
        println!("No patients match.");
        return;
    }
    println!("{}", patients_table(patients));
    println!("{} patient(s)", patients.len());
}

pub fn print_patient(found: &PatientWithMetrics) {
    println!("{}", patients_table(std::slice::from_ref(&found.patient)));
    if found.metrics.is_empty() {
        println!("No metrics recorded.");
        return;
    }
    println!("{}", metrics_table(&found.metrics));
}

fn metrics_table(metrics: &[HealthMetric]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Timestamp"),
        header_cell("BP"),
        header_cell("HR"),
        header_cell("Temp"),
        header_cell("SpO2"),
        header_cell("Chol"),
        header_cell("Gluc"),
        header_cell("Cardio"),
    ]);
    apply_table_style(&mut table);
    for idx in 1..7 {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    align_column(&mut table, 7, CellAlignment::Center);
    for metric in metrics {
        let m = &metric.measurements;
        let bp = match (m.systolic_bp, m.diastolic_bp) {
            (Some(hi), Some(lo)) => Cell::new(format!("{hi}/{lo}")),
            _ => dim_cell("-"),
        };
        table.add_row(vec![
            Cell::new(metric.timestamp),
            bp,
            optional_cell(m.heart_rate),
            optional_cell(m.body_temperature),
            optional_cell(m.oxygen_saturation),
            optional_cell(m.cholesterol),
            optional_cell(m.glucose),
            match m.cardiovascular_disease {
                Some(true) => Cell::new("yes").fg(Color::Red),
                Some(false) => Cell::new("no"),
                None => dim_cell("-"),
            },
        ]);
    }
    table
}

pub fn print_deleted_patient(deleted: &DeletedPatient) {
    println!(
        "Deleted patient {} ({} metrics, {} images, {} signals)",
        deleted.patient_id, deleted.metrics, deleted.images, deleted.signals
    );
}

pub fn print_stats(stats: &SummaryStatistics) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Statistic"), header_cell("Value")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows = [
        ("Patients", Some(stats.total_patients as f64), 0),
        ("Average age (days)", stats.avg_age_days, 1),
        ("Average height (cm)", stats.avg_height, 1),
        ("Average weight (kg)", stats.avg_weight, 1),
        ("Health metrics", Some(stats.total_health_metrics as f64), 0),
        ("Average systolic BP", stats.avg_systolic_bp, 1),
        ("Average diastolic BP", stats.avg_diastolic_bp, 1),
        ("Average heart rate", stats.avg_heart_rate, 1),
    ];
    for (label, value, precision) in rows {
        table.add_row(vec![Cell::new(label), number_cell(value, precision)]);
    }
    println!("{table}");
}

pub fn print_correlation(result: &CorrelateResult) {
    let c = &result.correlation;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Metric 1"),
        header_cell("Metric 2"),
        header_cell("Method"),
        header_cell("r"),
        header_cell("p"),
        header_cell("n"),
    ]);
    apply_table_style(&mut table);
    for idx in 3..6 {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    table.add_row(vec![
        Cell::new(&c.metric1),
        Cell::new(&c.metric2),
        Cell::new(c.correlation.method.as_str()),
        coefficient_cell(Some(c.correlation.coefficient)),
        Cell::new(format!("{:.4}", c.correlation.p_value)),
        Cell::new(c.correlation.sample_size),
    ]);
    println!("{table}");
    if let Some(id) = result.correlation_id {
        println!("Saved as correlation {id}");
    }
}

pub fn matrix_table(result: &MatrixResult) -> Table {
    let mut table = Table::new();
    let mut header = vec![header_cell("")];
    header.extend(result.matrix.columns.iter().map(|c| header_cell(c)));
    table.set_header(header);
    apply_table_style(&mut table);
    for idx in 1..=result.matrix.columns.len() {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    for (name, row) in result.matrix.columns.iter().zip(&result.matrix.values) {
        let mut cells = vec![Cell::new(name).add_attribute(Attribute::Bold)];
        cells.extend(row.iter().map(|value| coefficient_cell(*value)));
        table.add_row(cells);
    }
    table
}

pub fn print_matrix(result: &MatrixResult) {
    println!(
        "{} correlation over {} rows",
        result.matrix.method, result.rows
    );
    println!("{}", matrix_table(result));
    if result.strong_pairs.is_empty() {
        println!("No pairs with |r| >= {}", result.min_abs);
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Metric 1"),
        header_cell("Metric 2"),
        header_cell("r"),
        header_cell("p"),
        header_cell("n"),
    ]);
    apply_table_style(&mut table);
    for idx in 2..5 {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    for pair in &result.strong_pairs {
        table.add_row(vec![
            Cell::new(&pair.metric1),
            Cell::new(&pair.metric2),
            coefficient_cell(Some(pair.correlation.coefficient)),
            Cell::new(format!("{:.4}", pair.correlation.p_value)),
            Cell::new(pair.correlation.sample_size),
        ]);
    }
    println!();
    println!("Pairs with |r| >= {}:", result.min_abs);
    println!("{table}");
}

pub fn print_trend(result: &TrendResult) {
    let report = &result.report;
    println!(
        "Patient {} {}: {} points",
        report.patient_id, report.metric, report.data_points
    );
    if let (Some(first), Some(last)) = (report.first, report.last) {
        println!("From {first} to {last}");
    }
    if result.filter_steps > 0 {
        println!("{} filter step(s) applied", result.filter_steps);
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Statistic"), header_cell("Value")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    if let Some(stats) = &report.statistics {
        table.add_row(vec![Cell::new("Count"), Cell::new(stats.count)]);
        for (label, value) in [
            ("Mean", Some(stats.mean)),
            ("Std", stats.std),
            ("Min", Some(stats.min)),
            ("Q1", Some(stats.q1)),
            ("Median", Some(stats.median)),
            ("Q3", Some(stats.q3)),
            ("Max", Some(stats.max)),
        ] {
            table.add_row(vec![Cell::new(label), number_cell(value, 2)]);
        }
    }
    let trend = &report.trend;
    table.add_row(vec![Cell::new("Slope"), number_cell(Some(trend.slope), 4)]);
    table.add_row(vec![Cell::new("R²"), number_cell(Some(trend.r_squared), 4)]);
    table.add_row(vec![
        Cell::new("Mean change"),
        number_cell(Some(trend.mean_change), 4),
    ]);
    println!("{table}");

    if report.anomalies.is_empty() {
        println!("No anomalies.");
    } else {
        let mut table = Table::new();
        table.set_header(vec![header_cell("Anomaly at"), header_cell("Value")]);
        apply_table_style(&mut table);
        align_column(&mut table, 1, CellAlignment::Right);
        for (ts, value) in &report.anomalies {
            table.add_row(vec![
                Cell::new(ts),
                Cell::new(format!("{value:.2}")).fg(Color::Red),
            ]);
        }
        println!("{table}");
    }

    if let Some(buckets) = &result.resampled {
        let mut table = Table::new();
        table.set_header(vec![header_cell("Bucket"), header_cell("Value")]);
        apply_table_style(&mut table);
        align_column(&mut table, 1, CellAlignment::Right);
        for point in buckets {
            table.add_row(vec![
                Cell::new(point.bucket),
                Cell::new(format!("{:.2}", point.value)),
            ]);
        }
        println!("{table}");
    }
    if let Some(rates) = &result.rate_of_change {
        let latest = rates.iter().rev().find_map(|r| *r);
        match latest {
            Some(rate) => println!("Latest rate of change: {rate:.2}%"),
            None => println!("Not enough points for a rate of change."),
        }
    }
}

pub fn print_spectrum(result: &SpectrumResult) {
    let report = &result.report;
    println!("Signal: {}", result.source.display());
    let mut table = Table::new();
    table.set_header(vec![header_cell("Property"), header_cell("Value")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows: Vec<(&str, String)> = vec![
        ("Method", result.method.to_string()),
        ("Sampling rate (Hz)", format!("{:.2}", report.sampling_rate)),
        ("Samples", report.samples.to_string()),
        ("FFT size", report.fft_size.to_string()),
        ("Resolution (Hz)", format!("{:.4}", report.frequency_resolution)),
        (
            "Dominant frequency (Hz)",
            report
                .dominant_frequency
                .map_or_else(|| "-".to_string(), |f| format!("{f:.3}")),
        ),
        ("Total power", format!("{:.6}", report.total_power)),
        ("Max power", format!("{:.6}", report.max_power)),
        ("Signal type", report.signal_kind.to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");

    if !report.peaks.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            header_cell("#"),
            header_cell("Frequency (Hz)"),
            header_cell("Power"),
            header_cell("Amplitude"),
        ]);
        apply_table_style(&mut table);
        for idx in 0..4 {
            align_column(&mut table, idx, CellAlignment::Right);
        }
        for (rank, peak) in report.peaks.iter().enumerate() {
            table.add_row(vec![
                dim_cell(rank + 1),
                Cell::new(format!("{:.3}", peak.frequency)),
                Cell::new(format!("{:.6}", peak.power)),
                Cell::new(format!("{:.6}", peak.amplitude)),
            ]);
        }
        println!("{table}");
    }
    if let Some(path) = &result.spectrum_file {
        println!("Spectrum written to {}", path.display());
    }
    if let Some(id) = result.analysis_id {
        println!("Saved as analysis {id}");
    }
}

pub fn print_registered_signal(signal: &RegisteredSignal) {
    let meta = &signal.metadata;
    println!(
        "Registered signal {} ({}): {} samples at {:.2} Hz, {:.2} s",
        signal.signal_id, signal.signal_type, meta.samples, meta.sampling_rate, meta.duration
    );
}

pub fn print_generated_signal(signal: &GeneratedSignal) {
    println!(
        "Wrote {} {} samples ({:.2} s at {:.2} Hz) to {}",
        signal.samples,
        signal.kind,
        signal.duration,
        signal.sampling_rate,
        signal.path.display()
    );
}

pub fn print_signals(signals: &[BiomedicalSignal]) {
    if signals.is_empty() {
        println!("No signals registered.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Patient"),
        header_cell("Type"),
        header_cell("Rate (Hz)"),
        header_cell("Duration (s)"),
        header_cell("File"),
    ]);
    apply_table_style(&mut table);
    for idx in [0, 1, 3, 4] {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    for signal in signals {
        table.add_row(vec![
            Cell::new(signal.signal_id).add_attribute(Attribute::Bold),
            optional_cell(signal.patient_id),
            Cell::new(&signal.signal_type),
            number_cell(signal.sampling_rate, 2),
            number_cell(signal.duration, 2),
            Cell::new(&signal.signal_data_path),
        ]);
    }
    println!("{table}");
}

pub fn print_images(images: &[MedicalImage]) {
    if images.is_empty() {
        println!("No images registered.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Patient"),
        header_cell("File"),
        header_cell("Type"),
        header_cell("Size"),
        header_cell("Dimensions"),
        header_cell("Uploaded"),
    ]);
    apply_table_style(&mut table);
    for idx in [0, 1, 4] {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    for image in images {
        let dimensions = match (image.width, image.height) {
            (Some(w), Some(h)) => Cell::new(format!("{w}x{h}")),
            _ => dim_cell("-"),
        };
        table.add_row(vec![
            Cell::new(image.image_id).add_attribute(Attribute::Bold),
            optional_cell(image.patient_id),
            Cell::new(&image.filename),
            optional_cell(image.image_type.as_deref()),
            optional_cell(image.file_size),
            dimensions,
            Cell::new(image.upload_date),
        ]);
    }
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn number_cell(value: Option<f64>, precision: usize) -> Cell {
    match value {
        Some(v) => Cell::new(format!("{v:.precision$}")),
        None => dim_cell("-"),
    }
}

fn optional_cell<T: ToString>(value: Option<T>) -> Cell {
    match value {
        Some(v) => Cell::new(v),
        None => dim_cell("-"),
    }
}

/// Coefficients colored by strength; undefined entries are dimmed.
fn coefficient_cell(value: Option<f64>) -> Cell {
    match value {
        Some(r) if r.abs() >= 0.7 => Cell::new(format!("{r:.3}"))
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        Some(r) if r.abs() >= 0.3 => Cell::new(format!("{r:.3}")).fg(Color::Yellow),
        Some(r) => Cell::new(format!("{r:.3}")),
        None => dim_cell("n/a"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medi_model::{Field, Violation, ViolationCode};

    #[test]
    fn rejected_table_truncates() {
        let rejected: Vec<RejectedRow> = (2..6)
            .map(|line| RejectedRow {
                line,
                violations: vec![Violation::new(
                    Some(Field::SystolicBp),
                    ViolationCode::OutOfRange,
                    "out of range",
                )],
            })
            .collect();
        let mut table = rejected_table(&rejected, 2);
        table.force_no_tty();
        let text = table.to_string();
        assert!(text.contains("out of range"));
        assert!(text.contains("2 more"));
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn undefined_coefficients_are_marked() {
        let cell = coefficient_cell(None);
        assert_eq!(cell.content(), "n/a");
        assert_eq!(coefficient_cell(Some(0.12345)).content(), "0.123");
    }
}
