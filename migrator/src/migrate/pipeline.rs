//! Migration driver.
//!
//! Runs the stages in order and stops at the first error:
//!
//! 1. **Init** - report the configuration
//! 2. **Loaded** - parse, profile and deduplicate the CSV file
//! 3. **CollectionsReset** - drop both collections when configured (fresh mode)
//! 4. **Indexed** - ensure the identity indexes exist
//! 5. **Iterating** - resolve patient then admission for every row
//! 6. **Summarized** - report store totals and run counters
//!
//! Inserted documents are never rolled back. An aborted run is reconciled
//! by re-running in append mode.

use std::time::{Duration, Instant};

use crate::config::MigrationConfig;
use crate::dataset::{load_dataset, Dataset};
use crate::error::{MigrationError, MigrationResult, StoreResult};
use crate::report::{LogEntry, Reporter};
use crate::store::DocumentStore;

use super::{
    admission_index, patient_index, AdmissionResolver, CancellationFlag, MigrationMode,
    MigrationStage, PatientResolver, RunStats, ADMISSIONS, PATIENTS,
};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct MigrationSummary {
    pub mode: MigrationMode,
    /// Rows in the file before duplicate removal
    pub rows_loaded: usize,
    /// Rows left after duplicate removal
    pub rows_after_dedup: usize,
    pub stats: RunStats,
    /// Patient documents in the store at the end of the run
    pub total_patients: u64,
    /// Admission documents in the store at the end of the run
    pub total_admissions: u64,
    pub elapsed: Duration,
}

/// Migrate the configured CSV file into `store`.
///
/// A failure is reported as an error entry before it is returned.
pub fn run_migration(
    config: &MigrationConfig,
    store: &mut dyn DocumentStore,
    reporter: &dyn Reporter,
    cancel: &CancellationFlag,
) -> MigrationResult<MigrationSummary> {
    let started = Instant::now();
    let result = load_input(config, reporter)
        .and_then(|dataset| migrate_dataset(config, &dataset, store, reporter, cancel, started));
    report_failure(reporter, result)
}

/// Like [`run_migration`], but the store is opened by `open` only once the
/// input file has loaded, so a bad input never touches the store.
pub fn run_migration_with<F>(
    config: &MigrationConfig,
    open: F,
    reporter: &dyn Reporter,
    cancel: &CancellationFlag,
) -> MigrationResult<MigrationSummary>
where
    F: FnOnce(&MigrationConfig) -> StoreResult<Box<dyn DocumentStore>>,
{
    let started = Instant::now();
    let result = load_input(config, reporter).and_then(|dataset| {
        let mut store = open(config)?;
        migrate_dataset(config, &dataset, store.as_mut(), reporter, cancel, started)
    });
    report_failure(reporter, result)
}

fn report_failure(
    reporter: &dyn Reporter,
    result: MigrationResult<MigrationSummary>,
) -> MigrationResult<MigrationSummary> {
    if let Err(e) = &result {
        reporter.log(LogEntry::error(format!("Migration aborted: {e}")));
    }
    result
}

fn say(reporter: &dyn Reporter, stage: MigrationStage, entry: LogEntry) {
    reporter.log(entry.in_stage(stage.as_str()));
}

/// Init and Loaded stages.
fn load_input(config: &MigrationConfig, reporter: &dyn Reporter) -> MigrationResult<Dataset> {
    let init = MigrationStage::Init;
    say(reporter, init, LogEntry::info("=== Migration process start ==="));
    say(
        reporter,
        init,
        LogEntry::info(format!(
            "Store: {} (database '{}')",
            config.store_uri, config.db_name
        ))
        .with_indent(1),
    );
    say(
        reporter,
        init,
        LogEntry::info(format!("Input file: {}", config.csv_path.display())).with_indent(1),
    );

    let dataset = load_dataset(&config.csv_path)?;
    report_dataset(&dataset, reporter);
    Ok(dataset)
}

/// CollectionsReset through Done.
fn migrate_dataset(
    config: &MigrationConfig,
    dataset: &Dataset,
    store: &mut dyn DocumentStore,
    reporter: &dyn Reporter,
    cancel: &CancellationFlag,
    started: Instant,
) -> MigrationResult<MigrationSummary> {
    // CollectionsReset
    let mode = MigrationMode::from_drop_flag(config.drop_collections);
    if mode == MigrationMode::Fresh {
        say(
            reporter,
            MigrationStage::CollectionsReset,
            LogEntry::warning(format!(
                "Dropping collections '{PATIENTS}' and '{ADMISSIONS}'"
            )),
        );
        store.drop_collection(PATIENTS)?;
        store.drop_collection(ADMISSIONS)?;
    } else {
        say(
            reporter,
            MigrationStage::CollectionsReset,
            LogEntry::info("Keeping existing collections (append mode)"),
        );
    }

    // Indexed
    store.create_index(PATIENTS, &patient_index())?;
    store.create_index(ADMISSIONS, &admission_index())?;
    say(reporter, MigrationStage::Indexed, LogEntry::success("Indexes ensured"));

    // Iterating
    let total = dataset.len();
    say(
        reporter,
        MigrationStage::Iterating,
        LogEntry::info(format!("Migrating {total} rows in {mode} mode")),
    );
    reporter.start_progress(total);
    let iterated = migrate_rows(dataset, mode, store, reporter, cancel);
    reporter.finish_progress();
    let stats = iterated?;
    say(
        reporter,
        MigrationStage::Iterating,
        LogEntry::success(format!("{} rows processed", stats.rows_processed)),
    );

    // Summarized
    let summary = MigrationSummary {
        mode,
        rows_loaded: dataset.profile.total_rows,
        rows_after_dedup: total,
        total_patients: store.count_documents(PATIENTS)?,
        total_admissions: store.count_documents(ADMISSIONS)?,
        stats,
        elapsed: started.elapsed(),
    };
    report_summary(&summary, reporter);

    say(
        reporter,
        MigrationStage::Done,
        LogEntry::info(format!(
            "=== Migration process end ({:.2} seconds) ===",
            summary.elapsed.as_secs_f64()
        )),
    );
    Ok(summary)
}

fn migrate_rows(
    dataset: &Dataset,
    mode: MigrationMode,
    store: &mut dyn DocumentStore,
    reporter: &dyn Reporter,
    cancel: &CancellationFlag,
) -> MigrationResult<RunStats> {
    let mut stats = RunStats::default();
    let mut patients = PatientResolver::new(mode);
    let mut admissions = AdmissionResolver::new(mode);
    let total = dataset.len();

    for (record, parse_failures) in dataset.records() {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled {
                processed: stats.rows_processed,
                total,
            });
        }

        let patient_id = patients.resolve(store, &record, &mut stats)?;
        admissions.resolve(store, patient_id, &record, &mut stats)?;
        stats.row_processed(parse_failures);
        reporter.advance();
    }

    tracing::debug!(
        patients = patients.cached(),
        patient_cache_hits = patients.cache_hits(),
        admissions = admissions.cached(),
        "row iteration finished"
    );
    Ok(stats)
}

fn report_dataset(dataset: &Dataset, reporter: &dyn Reporter) {
    let emit = |entry: LogEntry| say(reporter, MigrationStage::Loaded, entry);
    let profile = &dataset.profile;

    emit(
        LogEntry::success(format!("Total lines in the dataset: {}", profile.total_rows)),
    );
    emit(
        LogEntry::info(format!(
            "Encoding: {}, delimiter: {:?}",
            dataset.encoding, dataset.delimiter
        ))
        .with_indent(1),
    );
    emit(LogEntry::info("Columns (type, missing values):").with_indent(1));
    for column in &profile.columns {
        emit(
            LogEntry::info(format!(
                "{}: {}, {} missing",
                column.name, column.column_type, column.missing
            ))
            .with_indent(2),
        );
    }

    let duplicates = LogEntry::info(format!("Duplicated lines: {}", profile.duplicate_rows));
    emit(
        if profile.duplicate_rows > 0 {
            LogEntry::warning(duplicates.message)
        } else {
            duplicates
        },
    );
    emit(
        LogEntry::info(format!(
            "Lines after removing duplicates: {}",
            dataset.len()
        )),
    );
}

fn report_summary(summary: &MigrationSummary, reporter: &dyn Reporter) {
    let emit = |entry: LogEntry| say(reporter, MigrationStage::Summarized, entry);
    let stats = &summary.stats;

    emit(
        LogEntry::success(format!(
            "Patient documents: {} (created during this process: {})",
            summary.total_patients, stats.created_patients
        )),
    );
    emit(
        LogEntry::success(format!(
            "Admission documents: {} (created during this process: {})",
            summary.total_admissions, stats.created_admissions
        )),
    );
    if summary.mode == MigrationMode::Append {
        emit(
            LogEntry::info(format!(
                "Already stored: {} patients, {} admissions",
                stats.existing_patients, stats.existing_admissions
            ))
            .with_indent(1),
        );
    }
    if stats.duplicate_admissions > 0 {
        emit(
            LogEntry::info(format!(
                "Repeated admissions skipped: {}",
                stats.duplicate_admissions
            ))
            .with_indent(1),
        );
    }
    if stats.field_parse_failures > 0 {
        emit(
            LogEntry::warning(format!(
                "Unparsable fields stored as null: {}",
                stats.field_parse_failures
            ))
            .with_indent(1),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawConfig, StoreUri};
    use crate::error::LoadError;
    use crate::report::{LogLevel, MemoryReporter};
    use crate::store::{Document, MemoryStore};
    use serde_json::Value;
    use std::io::Write;
    use std::path::Path;

    const HEADER: &str = "Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,\
Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,\
Medication,Test Results";

    fn write_csv(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    fn config(path: &Path, drop_collections: bool) -> MigrationConfig {
        let raw = RawConfig {
            store_uri: StoreUri::Memory.to_string(),
            csv_path: path.to_path_buf(),
            drop_collections: drop_collections.to_string(),
            ..RawConfig::default()
        };
        MigrationConfig::from_raw(raw).unwrap()
    }

    fn run(
        path: &Path,
        drop_collections: bool,
        store: &mut MemoryStore,
    ) -> (MigrationSummary, MemoryReporter) {
        let reporter = MemoryReporter::new();
        let summary = run_migration(
            &config(path, drop_collections),
            store,
            &reporter,
            &CancellationFlag::new(),
        )
        .unwrap();
        (summary, reporter)
    }

    const ANN_JAN: &str =
        "Ann Lee,30,Female,O+,Flu,2024-01-01,Dr A,General,Aetna,100.5,101,Elective,2024-01-03,Aspirin,Normal";
    const ANN_FEB: &str =
        "ann LEE,30,Female,O+,Cold,2024-02-01,Dr B,General,Aetna,80,102,Urgent,2024-02-02,Rest,Normal";

    #[test]
    fn test_three_rows_one_patient_two_admissions() {
        let file = write_csv(&[ANN_JAN, ANN_FEB, ANN_JAN]);
        let mut store = MemoryStore::new();
        let (summary, reporter) = run(file.path(), true, &mut store);

        assert_eq!(summary.rows_loaded, 3);
        assert_eq!(summary.rows_after_dedup, 2);
        assert_eq!(summary.total_patients, 1);
        assert_eq!(summary.total_admissions, 2);
        assert_eq!(summary.stats.created_patients, 1);
        assert_eq!(summary.stats.created_admissions, 2);
        assert!(reporter.contains("Patient documents: 1 (created during this process: 1)"));
        assert!(reporter.contains("Duplicated lines: 1"));
        assert_eq!(reporter.progress_total(), Some(2));
        assert_eq!(reporter.advanced(), 2);

        let patient_id = store.documents(PATIENTS)[0]["_id"].clone();
        assert!(store
            .documents(ADMISSIONS)
            .iter()
            .all(|a| a["patient_id"] == patient_id));
    }

    #[test]
    fn test_stages_reported_in_order() {
        let file = write_csv(&[ANN_JAN]);
        let mut store = MemoryStore::new();
        let (_, reporter) = run(file.path(), true, &mut store);

        assert_eq!(
            reporter.stages(),
            vec![
                "init",
                "loaded",
                "collections_reset",
                "indexed",
                "iterating",
                "summarized",
                "done"
            ]
        );
    }

    #[test]
    fn test_fresh_then_append_creates_nothing() {
        let file = write_csv(&[ANN_JAN, ANN_FEB]);
        let mut store = MemoryStore::new();
        let (fresh, _) = run(file.path(), true, &mut store);
        let (append, reporter) = run(file.path(), false, &mut store);

        assert_eq!(append.mode, MigrationMode::Append);
        assert_eq!(append.stats.created_patients, 0);
        assert_eq!(append.stats.created_admissions, 0);
        assert_eq!(append.stats.existing_patients, 1);
        assert_eq!(append.stats.existing_admissions, 2);
        assert_eq!(append.total_patients, fresh.total_patients);
        assert_eq!(append.total_admissions, fresh.total_admissions);
        assert!(reporter.contains("append mode"));
    }

    #[test]
    fn test_fresh_run_resets_collections() {
        let file = write_csv(&[ANN_JAN]);
        let mut store = MemoryStore::new();
        run(file.path(), true, &mut store);
        let (second, _) = run(file.path(), true, &mut store);

        assert_eq!(second.total_patients, 1);
        assert_eq!(second.stats.created_patients, 1);
    }

    #[test]
    fn test_missing_age_stored_as_null() {
        let file = write_csv(&[
            "Bo Park,,Male,A-,Asthma,2024-03-05,Dr C,North,Cigna,55,7,Emergency,2024-03-06,Inhaler,Abnormal",
        ]);
        let mut store = MemoryStore::new();
        let (summary, _) = run(file.path(), true, &mut store);

        assert_eq!(summary.stats.rows_processed, 1);
        let patient: &Document = &store.documents(PATIENTS)[0];
        assert_eq!(patient["age"], Value::Null);
        assert_eq!(patient["name"], "Bo Park");
    }

    #[test]
    fn test_admission_dates_within_one_second_are_one_admission() {
        let file = write_csv(&[
            "Ann Lee,30,Female,O+,Flu,2024-01-01T10:00:00.100Z,Dr A,General,Aetna,100.5,101,Elective,2024-01-03,Aspirin,Normal",
            "Ann Lee,30,Female,O+,Flu,2024-01-01T10:00:00.900Z,Dr A,General,Aetna,100.5,101,Elective,2024-01-03,Aspirin,Normal",
        ]);
        let mut store = MemoryStore::new();
        let (summary, _) = run(file.path(), true, &mut store);

        assert_eq!(summary.total_patients, 1);
        assert_eq!(summary.total_admissions, 1);
        assert_eq!(summary.stats.duplicate_admissions, 1);
        assert_eq!(
            store.documents(ADMISSIONS)[0]["date_of_admission"],
            "2024-01-01T10:00:00"
        );
    }

    #[test]
    fn test_unparsable_fields_counted() {
        let file = write_csv(&[
            "Bo Park,old,Male,A-,Asthma,someday,Dr C,North,Cigna,55,7,Emergency,2024-03-06,Inhaler,Abnormal",
        ]);
        let mut store = MemoryStore::new();
        let (summary, reporter) = run(file.path(), true, &mut store);

        assert_eq!(summary.stats.field_parse_failures, 2);
        assert_eq!(store.documents(ADMISSIONS)[0]["date_of_admission"], Value::Null);
        assert!(reporter.contains("Unparsable fields stored as null: 2"));
    }

    #[test]
    fn test_bad_input_leaves_store_untouched() {
        let file = write_csv(&[ANN_JAN]);
        let mut store = MemoryStore::new();
        run(file.path(), true, &mut store);

        let reporter = MemoryReporter::new();
        let missing = config(Path::new("/no/such/input.csv"), true);
        let result = run_migration(&missing, &mut store, &reporter, &CancellationFlag::new());

        assert!(matches!(
            result,
            Err(MigrationError::Load(LoadError::NotFound(_)))
        ));
        assert_eq!(store.count_documents(PATIENTS).unwrap(), 1);

        let last = reporter.entries().pop().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.message.starts_with("Migration aborted: "));
    }

    #[test]
    fn test_store_opened_only_after_input_loads() {
        let reporter = MemoryReporter::new();
        let mut opened = false;
        let result = run_migration_with(
            &config(Path::new("/no/such/input.csv"), true),
            |_| {
                opened = true;
                Ok(Box::new(MemoryStore::new()) as Box<dyn DocumentStore>)
            },
            &reporter,
            &CancellationFlag::new(),
        );
        assert!(matches!(result, Err(MigrationError::Load(_))));
        assert!(!opened);

        let file = write_csv(&[ANN_JAN]);
        let summary = run_migration_with(
            &config(file.path(), true),
            |_| Ok(Box::new(MemoryStore::new()) as Box<dyn DocumentStore>),
            &reporter,
            &CancellationFlag::new(),
        )
        .unwrap();
        assert_eq!(summary.total_admissions, 1);
    }

    #[test]
    fn test_cancelled_run_stops_before_rows() {
        let file = write_csv(&[ANN_JAN, ANN_FEB]);
        let mut store = MemoryStore::new();
        let reporter = MemoryReporter::new();
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = run_migration(&config(file.path(), true), &mut store, &reporter, &cancel);

        assert!(matches!(
            result,
            Err(MigrationError::Cancelled { processed: 0, total: 2 })
        ));
        assert_eq!(store.count_documents(ADMISSIONS).unwrap(), 0);
    }

    #[test]
    fn test_indexes_created() {
        let file = write_csv(&[ANN_JAN]);
        let mut store = MemoryStore::new();
        run(file.path(), true, &mut store);

        assert_eq!(store.indexes(PATIENTS), vec![patient_index()]);
        assert_eq!(store.indexes(ADMISSIONS), vec![admission_index()]);
    }
}
