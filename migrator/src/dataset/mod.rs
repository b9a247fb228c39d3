//! Dataset loading: parse, profile, and remove exact duplicate rows.
//!
//! # Example
//!
//! ```rust,ignore
//! use caremigrate::dataset::load_dataset;
//!
//! let dataset = load_dataset("data/healthcare_dataset.csv")?;
//! println!("{} rows, {} duplicates removed",
//!     dataset.len(), dataset.profile.duplicate_rows);
//! ```

pub mod profile;

use std::collections::HashSet;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{HealthcareRecord, RecordReader, REQUIRED_COLUMNS};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, CsvTable};

use profile::row_identity;
pub use profile::{ColumnProfile, ColumnType, DatasetProfile};

/// A loaded, deduplicated dataset ready for migration.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Canonical column names
    pub headers: Vec<String>,
    /// Rows left after duplicate removal, in input order
    pub rows: Vec<Vec<String>>,
    /// Statistics computed before duplicate removal
    pub profile: DatasetProfile,
    /// Detected input encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    reader: RecordReader,
}

impl Dataset {
    /// Validate, profile and deduplicate a parsed table.
    pub fn from_table(table: CsvTable) -> LoadResult<Self> {
        let reader = RecordReader::new(&table.headers);
        let missing = reader.missing_columns(REQUIRED_COLUMNS);
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns(missing));
        }

        let profile = DatasetProfile::compute(&table.headers, &table.rows);
        let rows = drop_duplicate_rows(table.rows);

        Ok(Self {
            headers: table.headers,
            rows,
            profile,
            encoding: table.encoding,
            delimiter: table.delimiter,
            reader,
        })
    }

    /// Number of rows after duplicate removal.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Typed records in input order, each with its field-level parse failures.
    pub fn records(&self) -> impl Iterator<Item = (HealthcareRecord, usize)> + '_ {
        self.rows.iter().map(|row| {
            let (record, errors) = self.reader.read(row);
            for err in &errors {
                tracing::debug!(error = %err, "field parse failure, stored as null");
            }
            (record, errors.len())
        })
    }
}

/// Load a dataset from a CSV file.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> LoadResult<Dataset> {
    Dataset::from_table(parse_csv_file_auto(path)?)
}

/// Load a dataset from in-memory CSV bytes.
pub fn load_dataset_bytes(bytes: &[u8]) -> LoadResult<Dataset> {
    Dataset::from_table(parse_bytes_auto(bytes)?)
}

/// Remove rows equal to an earlier row across all columns, keeping the first.
///
/// Missing cells compare equal whatever their spelling.
pub fn drop_duplicate_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let keep: Vec<bool> = {
        let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(rows.len());
        rows.iter().map(|row| seen.insert(row_identity(row))).collect()
    };
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}
