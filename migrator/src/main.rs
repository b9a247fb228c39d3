//! Caremigrate CLI - migrate a healthcare CSV file into the document store
//!
//! ```bash
//! caremigrate                                   # settings from env / .env
//! caremigrate --csv-path data/in.csv -v         # override input, debug logs
//! caremigrate --drop-collections false          # append mode
//! ```
//!
//! Exit code 0 on success, 1 on any failure.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use caremigrate::config::{
    DEFAULT_CSV_PATH, DEFAULT_DB_NAME, DEFAULT_LOG_DIR, DEFAULT_STORE_TIMEOUT_SECS,
    DEFAULT_STORE_URI,
};
use caremigrate::logging::{init_logging, LogConfig};
use caremigrate::{
    open_store, run_migration_with, CancellationFlag, MigrationConfig, MigrationError, RawConfig,
    TracingReporter,
};

#[derive(Parser)]
#[command(name = "caremigrate")]
#[command(
    about = "Migrate a healthcare CSV file into patients and admissions collections",
    long_about = None
)]
struct Cli {
    /// Store address: sqlite://<dir> or memory://
    #[arg(long, env = "STORE_URI", default_value = DEFAULT_STORE_URI)]
    store_uri: String,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,

    /// Input CSV file
    #[arg(long, env = "CSV_PATH", default_value = DEFAULT_CSV_PATH)]
    csv_path: PathBuf,

    /// Drop both collections before migrating (true/false)
    #[arg(long, env = "DROP_COLLECTIONS", default_value = "true")]
    drop_collections: String,

    /// Directory of the migration log file
    #[arg(long, env = "LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Timeout for a single store call, in seconds
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = DEFAULT_STORE_TIMEOUT_SECS)]
    store_timeout_secs: u64,

    /// More log output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn raw_config(&self) -> RawConfig {
        RawConfig {
            store_uri: self.store_uri.clone(),
            db_name: self.db_name.clone(),
            csv_path: self.csv_path.clone(),
            drop_collections: self.drop_collections.clone(),
            log_dir: self.log_dir.clone(),
            store_timeout_secs: self.store_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap reads the environment
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match MigrationConfig::from_raw(cli.raw_config()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_config = LogConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_log_file(Some(config.log_file()))
        .with_ansi(io::stderr().is_terminal());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Error: cannot initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationFlag::new();
    let show_progress = !cli.no_progress;
    let worker_cancel = cancel.clone();
    let mut migration =
        tokio::task::spawn_blocking(move || migrate(&config, show_progress, &worker_cancel));

    let result = tokio::select! {
        joined = &mut migration => joined,
        signal = tokio::signal::ctrl_c() => {
            on_interrupt(signal, &cancel);
            migration.await
        }
    };

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        // The reporter already logged the failure
        Ok(Err(_)) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Migration task aborted");
            ExitCode::FAILURE
        }
    }
}

fn migrate(
    config: &MigrationConfig,
    show_progress: bool,
    cancel: &CancellationFlag,
) -> Result<(), MigrationError> {
    let reporter = TracingReporter::new(show_progress);
    run_migration_with(
        config,
        |c| open_store(&c.store_uri, &c.db_name, c.store_timeout),
        &reporter,
        cancel,
    )?;
    Ok(())
}

/// Cancel the run on Ctrl-C. A failure to listen leaves the run alone.
fn on_interrupt(signal: io::Result<()>, cancel: &CancellationFlag) {
    match signal {
        Ok(()) => {
            tracing::warn!("Interrupt received, stopping after the current row");
            cancel.cancel();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C, run cannot be interrupted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_cancels_run() {
        let cancel = CancellationFlag::new();
        on_interrupt(Ok(()), &cancel);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_signal_listener_failure_does_not_cancel() {
        let cancel = CancellationFlag::new();
        on_interrupt(Err(io::Error::other("no signal driver")), &cancel);
        assert!(!cancel.is_cancelled());
    }
}
