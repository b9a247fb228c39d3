//! Error types for the caremigrate migration pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`ConfigError`] - Invalid configuration (fatal, before any store access)
//! - [`LoadError`] - Input file could not be loaded (fatal, before any store access)
//! - [`ParseError`] - A single field could not be parsed (recovered as a missing value)
//! - [`StoreError`] - Document store failures (fatal for the run)
//! - [`MigrationError`] - Top-level orchestration errors
//!
//! Conversion into [`MigrationError`] is automatic via `From` implementations,
//! allowing `?` to work across layer boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while validating the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Store address is not a supported URI.
    #[error("Unsupported store URI '{0}' (expected sqlite://<dir> or memory://)")]
    UnsupportedStoreUri(String),

    /// Database name is empty or contains characters unfit for a file name.
    #[error("Invalid database name '{0}'")]
    InvalidDatabaseName(String),

    /// No input file was configured.
    #[error("CSV path is empty")]
    EmptyCsvPath,

    /// A timeout of zero would fail every store call.
    #[error("Store timeout must be greater than zero")]
    ZeroTimeout,

    /// A boolean option could not be interpreted.
    #[error("Invalid value '{value}' for {option}")]
    InvalidFlag { option: String, value: String },
}

// =============================================================================
// Dataset Load Errors
// =============================================================================

/// Errors while loading the flat input file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input file does not exist.
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read the file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid CSV content.
    #[error("Malformed CSV at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// File has no header row.
    #[error("CSV file has no header row")]
    NoHeaders,

    /// Columns the migration needs are absent.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

// =============================================================================
// Field Parse Errors
// =============================================================================

/// A single field value that could not be interpreted.
///
/// Never fatal: callers substitute a missing value and move on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Invalid date '{0}'")]
    InvalidDate(String),

    #[error("Invalid integer '{0}'")]
    InvalidInteger(String),

    #[error("Invalid decimal '{0}'")]
    InvalidDecimal(String),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or reached.
    #[error("Cannot connect to store at {address}: {message}")]
    Connection { address: String, message: String },

    /// An insert or index creation failed.
    #[error("Write to '{collection}' failed: {message}")]
    Write { collection: String, message: String },

    /// A lookup or count failed.
    #[error("Query on '{collection}' failed: {message}")]
    Query { collection: String, message: String },

    /// Collection names become table names and must be plain identifiers.
    #[error("Invalid collection name '{0}'")]
    InvalidCollection(String),

    /// A stored document could not be encoded or decoded.
    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn write(collection: &str, message: impl ToString) -> Self {
        StoreError::Write {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn query(collection: &str, message: impl ToString) -> Self {
        StoreError::Query {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Migration Errors (top-level)
// =============================================================================

/// Top-level migration errors.
///
/// This is the error type returned by [`crate::migrate::run_migration`].
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The run was interrupted before all rows were processed.
    #[error("Migration cancelled after {processed} of {total} rows")]
    Cancelled { processed: usize, total: usize },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for dataset loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for a migration run.
pub type MigrationResult<T> = Result<T, MigrationError>;
