//! # Caremigrate - healthcare CSV to document store migration
//!
//! Caremigrate loads a flat healthcare admissions CSV file and stores it as
//! two linked collections: one document per distinct patient and one per
//! distinct admission, each admission referencing its patient. Runs are
//! idempotent: re-running in append mode never duplicates a record.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Dataset   │────▶│  Resolvers  │────▶│   Document  │
//! │  (ISO/UTF8) │     │ (dedup+stat)│     │  (+ caches) │     │    Store    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use caremigrate::{
//!     open_store, run_migration, CancellationFlag, MigrationConfig, RawConfig, TracingReporter,
//! };
//!
//! let config = MigrationConfig::from_raw(RawConfig::default())?;
//! let mut store = open_store(&config.store_uri, &config.db_name, config.store_timeout)?;
//! let summary = run_migration(
//!     &config,
//!     store.as_mut(),
//!     &TracingReporter::default(),
//!     &CancellationFlag::new(),
//! )?;
//! println!("{} patients", summary.total_patients);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Validated run configuration
//! - [`normalize`] - Field cleaning and parsing
//! - [`parser`] - CSV parsing with auto-detection
//! - [`dataset`] - Loading, profiling, duplicate removal
//! - [`models`] - Domain models (Patient, Admission, identity keys)
//! - [`cache`] - Per-run identity caches
//! - [`store`] - Document store trait, SQLite and in-memory stores
//! - [`report`] - Run reporting and progress
//! - [`logging`] - Subscriber setup for the binary
//! - [`migrate`] - Resolvers and migration driver

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input
pub mod dataset;
pub mod normalize;
pub mod parser;

// Storage
pub mod cache;
pub mod store;

// Migration
pub mod migrate;

// Observability
pub mod logging;
pub mod report;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, LoadError, MigrationError, MigrationResult, ParseError, StoreError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{MigrationConfig, RawConfig, StoreUri};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Admission, AdmissionId, AdmissionKey, HealthcareRecord, Patient, PatientId, PatientKey,
    RecordId,
};

// =============================================================================
// Re-exports - Dataset
// =============================================================================

pub use dataset::{load_dataset, load_dataset_bytes, Dataset, DatasetProfile};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{open_store, DocumentStore, MemoryStore, SqliteStore};

// =============================================================================
// Re-exports - Migration
// =============================================================================

pub use migrate::{
    run_migration, run_migration_with, AdmissionResolver, CancellationFlag, MigrationMode,
    MigrationStage, MigrationSummary, PatientResolver, RunStats,
};

// =============================================================================
// Re-exports - Reporting
// =============================================================================

pub use report::{MemoryReporter, Reporter, TracingReporter};
