use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;

use medi_etl::{Importer, export_combined};
use medi_ingest::CsvLoadOptions;
use medi_model::{DuplicatePolicy, ImportOptions};
use medi_store::{MetricFilter, PatientFilter, Store};

const CARDIO: &str = "\
id;age;gender;height;weight;ap_hi;ap_lo;cholesterol;gluc;smoke;alco;active;cardio
0;18393;2;168;62.0;110;80;1;1;0;0;1;0
1;20228;1;156;85.0;140;90;3;1;0;0;1;1
2;18857;1;165;64.0;130;70;3;1;0;0;0;1
3;17623;2;169;82.0;150;100;1;1;0;0;1;1
4;17474;1;156;56.0;100;60;1;1;0;0;0;0
";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn import(store: &mut Store, path: &Path, options: ImportOptions) -> medi_etl::ImportReport {
    Importer::new(store, options)
        .import_file(path, &CsvLoadOptions::default())
        .unwrap()
}

fn metric_count(store: &Store) -> i64 {
    store
        .table_counts()
        .unwrap()
        .into_iter()
        .find(|(table, _)| *table == "health_metrics")
        .map(|(_, n)| n)
        .unwrap()
}

#[test]
fn three_row_example() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "three.csv",
        "id,age,gender,height,weight,ap_hi,ap_lo\n\
         1,18000,1,160,60,120,80\n\
         2,18000,2,175,80,80,120\n\
         3,19000,2,180,90,135,85\n",
    );
    let mut store = Store::open_in_memory().unwrap();
    let report = import(&mut store, &path, ImportOptions::default());

    assert_eq!(report.total_rows, 3);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason(), "systolic < diastolic");
    assert_eq!(report.counts.metrics_inserted, 2);
    assert_eq!(report.counts.patients_created, 2);
    assert!(report.has_failures());
}

#[test]
fn reimport_under_skip_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "cardio.csv", CARDIO);
    let mut store = Store::open_in_memory().unwrap();

    let first = import(&mut store, &path, ImportOptions::default());
    assert_eq!(first.counts.metrics_inserted, 5);
    assert_eq!(first.counts.patients_created, 5);
    assert!(!first.has_failures());
    let before = metric_count(&store);

    let second = import(&mut store, &path, ImportOptions::default());
    assert_eq!(second.counts.metrics_inserted, 0);
    assert_eq!(second.counts.metrics_skipped, 5);
    assert_eq!(second.counts.patients_created, 0);
    assert_eq!(metric_count(&store), before);
}

#[test]
fn update_policy_overwrites_measurements() {
    let dir = TempDir::new().unwrap();
    let observed = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let original = write(&dir, "a.csv", "patient_id,age,gender,height,weight,heart_rate\n7,20000,1,160,55,70\n");
    let revised = write(&dir, "b.csv", "patient_id,heart_rate\n7,88\n");
    let mut store = Store::open_in_memory().unwrap();

    let options = ImportOptions::new().with_observed_at(observed);
    import(&mut store, &original, options.clone());
    let report = import(
        &mut store,
        &revised,
        options.with_duplicates(DuplicatePolicy::Update),
    );
    assert_eq!(report.counts.metrics_updated, 1);

    let stored = store.metrics(&MetricFilter::default()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].measurements.heart_rate, Some(88));
}

#[test]
fn fail_policy_rolls_back_only_the_offending_chunk() {
    let dir = TempDir::new().unwrap();
    let observed = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let seed = write(&dir, "seed.csv", "id,age,gender,height,weight,heart_rate\n3,20000,1,160,55,70\n");
    let mut store = Store::open_in_memory().unwrap();
    let options = ImportOptions::new().with_observed_at(observed);
    import(&mut store, &seed, options.clone());

    // Chunks of two rows: [1, 2], [4, 3], [5]. Patient 3 already has a metric.
    let mut body = String::from("id,age,gender,height,weight,heart_rate\n");
    for id in [1, 2, 4, 3, 5] {
        body.push_str(&format!("{id},20000,1,160,55,72\n"));
    }
    let path = write(&dir, "batch.csv", &body);
    let mut progress = Vec::new();
    let report = Importer::new(
        &mut store,
        options
            .with_batch_size(2)
            .with_duplicates(DuplicatePolicy::Fail),
    )
    .with_progress(|p| progress.push((p.processed, p.total)))
    .import_file(&path, &CsvLoadOptions::default())
    .unwrap();

    assert_eq!(report.chunks, 3);
    assert_eq!(report.chunk_failures.len(), 1);
    let failure = &report.chunk_failures[0];
    assert_eq!(failure.index, 1);
    assert_eq!((failure.first_line, failure.last_line), (4, 5));
    assert_eq!(report.counts.metrics_inserted, 3);
    // Seed metric plus patients 1, 2 and 5; patient 4 was rolled back with its chunk.
    assert_eq!(metric_count(&store), 4);
    assert!(store.patient(4).unwrap().is_none());
    assert_eq!(progress, vec![(2, 5), (4, 5), (5, 5)]);
}

#[test]
fn rows_without_patient_or_demographics_are_row_errors() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "orphans.csv", "heart_rate,age\n70,20000\n");
    let mut store = Store::open_in_memory().unwrap();
    let report = import(&mut store, &path, ImportOptions::default());
    assert_eq!(report.accepted, 1);
    assert_eq!(report.row_errors.len(), 1);
    assert_eq!(report.row_errors[0].line, 2);
    assert_eq!(metric_count(&store), 0);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "cardio.csv", CARDIO);
    let mut store = Store::open_in_memory().unwrap();
    let report = import(&mut store, &path, ImportOptions::new().with_dry_run(true));
    assert!(report.dry_run);
    assert_eq!(report.counts.metrics_inserted, 5);
    assert_eq!(metric_count(&store), 0);
}

#[test]
fn export_then_reimport_reproduces_values() {
    let dir = TempDir::new().unwrap();
    let source = write(
        &dir,
        "vitals.csv",
        "patient_id,age,gender,height,weight,timestamp,systolic_bp,diastolic_bp,heart_rate,body_temperature,oxygen_saturation,cholesterol,glucose,smoking,cardio\n\
         10,20000,1,162.3,58.75,2024-03-01 08:00:00,118,76,64,36.65,98.1,1,2,0,0\n\
         10,20000,1,162.3,58.75,2024-03-02 08:00:00,121,79,NA,37.05,97.3,1,2,1,\n\
         11,15000,2,181.1,0.1E3,2024-03-01 09:30:00,135,88,71,36.9,99,2,1,0,1\n",
    );
    let mut first = Store::open_in_memory().unwrap();
    let report = import(&mut first, &source, ImportOptions::default());
    assert_eq!(report.counts.metrics_inserted, 3);

    let exported = dir.path().join("out").join("combined.csv");
    let summary = export_combined(
        &first,
        &PatientFilter::default(),
        &MetricFilter::default(),
        &exported,
    )
    .unwrap();
    assert_eq!(summary.rows, 3);

    let mut second = Store::open_in_memory().unwrap();
    let report = import(&mut second, &exported, ImportOptions::default());
    assert!(!report.has_failures());

    let strip = |store: &Store| {
        let mut rows: Vec<_> = store
            .metrics(&MetricFilter::default())
            .unwrap()
            .into_iter()
            .map(|m| (m.patient_id, m.timestamp, m.measurements))
            .collect();
        rows.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        rows
    };
    assert_eq!(strip(&first), strip(&second));

    let patients = |store: &Store| {
        store
            .patients(&PatientFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.demographics())
            .collect::<Vec<_>>()
    };
    assert_eq!(patients(&first), patients(&second));
}

#[test]
fn readings_within_one_second_stay_distinct() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "burst.csv",
        "patient_id,age,gender,height,weight,timestamp,heart_rate\n\
         1,20000,1,160,55,2024-01-01T08:00:00.100,60\n\
         1,20000,1,160,55,2024-01-01T08:00:00.900,90\n",
    );
    let mut store = Store::open_in_memory().unwrap();
    let report = import(&mut store, &path, ImportOptions::default());
    assert_eq!(report.counts.metrics_inserted, 2);
    assert_eq!(report.counts.metrics_skipped, 0);

    let stored = store.metrics(&MetricFilter::default()).unwrap();
    let mut readings: Vec<_> = stored
        .iter()
        .map(|m| (m.timestamp.and_utc().timestamp_subsec_millis(), m.measurements.heart_rate))
        .collect();
    readings.sort();
    assert_eq!(readings, vec![(100, Some(60)), (900, Some(90))]);

    // A second pass matches the stored fractional keys.
    let again = import(&mut store, &path, ImportOptions::default());
    assert_eq!(again.counts.metrics_skipped, 2);
    assert_eq!(metric_count(&store), 2);
}

#[test]
fn dry_run_report_matches_the_real_import() {
    let dir = TempDir::new().unwrap();
    // The second row only names patient 1, created by the first chunk.
    let path = write(
        &dir,
        "follow_up.csv",
        "patient_id,age,gender,height,weight,timestamp,heart_rate\n\
         1,20000,1,160,55,2024-01-01,60\n\
         1,,,,,2024-01-02,70\n",
    );
    let options = ImportOptions::new().with_batch_size(1);

    let mut store = Store::open_in_memory().unwrap();
    let dry = import(&mut store, &path, options.clone().with_dry_run(true));
    assert_eq!(metric_count(&store), 0);
    assert!(store.patient(1).unwrap().is_none());

    let real = import(&mut store, &path, options);
    assert_eq!(dry.counts, real.counts);
    assert_eq!(dry.row_errors, real.row_errors);
    assert_eq!(dry.counts.metrics_inserted, 2);
    assert!(dry.row_errors.is_empty());
    assert!(!dry.has_failures());
    assert_eq!(metric_count(&store), 2);
}

#[test]
fn names_that_look_missing_survive_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let source = write(
        &dir,
        "named.csv",
        "patient_id,name,age,gender,height,weight,timestamp,heart_rate\n\
         1,NA,20000,1,160,55,2024-03-01 08:00:00,64\n\
         2,None,21000,2,175,80,2024-03-01 09:00:00,80\n\
         3,,22000,1,165,70,2024-03-01 10:00:00,71\n",
    );
    let mut first = Store::open_in_memory().unwrap();
    let report = import(&mut first, &source, ImportOptions::default());
    assert!(!report.has_failures());

    let exported = dir.path().join("combined.csv");
    export_combined(
        &first,
        &PatientFilter::default(),
        &MetricFilter::default(),
        &exported,
    )
    .unwrap();
    let mut second = Store::open_in_memory().unwrap();
    import(&mut second, &exported, ImportOptions::default());

    let names = |store: &Store| {
        store
            .patients(&PatientFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| (p.patient_id, p.name))
            .collect::<Vec<_>>()
    };
    let expected = vec![
        (1, Some("NA".to_string())),
        (2, Some("None".to_string())),
        (3, None),
    ];
    assert_eq!(names(&first), expected);
    assert_eq!(names(&second), expected);
}
