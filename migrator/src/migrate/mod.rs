//! Migration of a loaded dataset into the patients and admissions collections.
//!
//! - [`patient`] - Patient resolver: find or create the patient of a row
//! - [`admission`] - Admission resolver: create the admission of a row once
//! - [`pipeline`] - Driver: load, reset, index, iterate, summarize
//!
//! ```text
//! Dataset rows ──▶ PatientResolver ──(patient id)──▶ AdmissionResolver ──▶ store
//!                        │                                  │
//!                  IdentityCache                      IdentityCache
//! ```

pub mod admission;
pub mod patient;
pub mod pipeline;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::models::RecordId;
use crate::store::{document_id, Document, IndexSpec};

pub use admission::AdmissionResolver;
pub use patient::PatientResolver;
pub use pipeline::{run_migration, run_migration_with, MigrationSummary};

/// Collection holding patient documents
pub const PATIENTS: &str = "patients";

/// Collection holding admission documents
pub const ADMISSIONS: &str = "admissions";

/// Compound index backing the patient identity lookup.
pub fn patient_index() -> IndexSpec {
    IndexSpec::new("identity")
        .asc("name")
        .asc("age")
        .asc("gender")
        .asc("blood_type")
}

/// Compound index backing the admission identity lookup.
pub fn admission_index() -> IndexSpec {
    IndexSpec::new("identity")
        .asc("patient_id")
        .desc("date_of_admission")
        .asc("hospital")
        .asc("room_number")
}

// =============================================================================
// Run Mode and Stages
// =============================================================================

/// Whether the store may already hold records from an earlier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    /// Collections were cleared at start; only the in-run caches deduplicate.
    Fresh,
    /// Collections were kept; existence is checked in the store before insert.
    Append,
}

impl MigrationMode {
    pub fn from_drop_flag(drop_collections: bool) -> Self {
        if drop_collections {
            MigrationMode::Fresh
        } else {
            MigrationMode::Append
        }
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationMode::Fresh => f.write_str("fresh"),
            MigrationMode::Append => f.write_str("append"),
        }
    }
}

/// Driver stages, in the order a successful run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    Init,
    Loaded,
    CollectionsReset,
    Indexed,
    Iterating,
    Summarized,
    Done,
}

impl MigrationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStage::Init => "init",
            MigrationStage::Loaded => "loaded",
            MigrationStage::CollectionsReset => "collections_reset",
            MigrationStage::Indexed => "indexed",
            MigrationStage::Iterating => "iterating",
            MigrationStage::Summarized => "summarized",
            MigrationStage::Done => "done",
        }
    }
}

// =============================================================================
// Run Statistics
// =============================================================================

/// Counters for one run, owned by the driver and bumped by the resolvers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub rows_processed: usize,
    pub created_patients: usize,
    /// Patients matched in the store (append mode)
    pub existing_patients: usize,
    pub created_admissions: usize,
    /// Admissions matched in the store (append mode)
    pub existing_admissions: usize,
    /// Rows whose admission key was already handled earlier in this run
    pub duplicate_admissions: usize,
    /// Fields stored as null because they could not be parsed
    pub field_parse_failures: usize,
}

impl RunStats {
    pub fn patient_created(&mut self) {
        self.created_patients += 1;
    }

    pub fn patient_found(&mut self) {
        self.existing_patients += 1;
    }

    pub fn admission_created(&mut self) {
        self.created_admissions += 1;
    }

    pub fn admission_found(&mut self) {
        self.existing_admissions += 1;
    }

    pub fn admission_duplicate(&mut self) {
        self.duplicate_admissions += 1;
    }

    pub fn row_processed(&mut self, parse_failures: usize) {
        self.rows_processed += 1;
        self.field_parse_failures += parse_failures;
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Shared flag checked between rows; setting it stops the run.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identifier of a document returned by a lookup.
pub(crate) fn existing_id(collection: &str, document: &Document) -> StoreResult<RecordId> {
    document_id(document)
        .ok_or_else(|| StoreError::query(collection, "matched document has no valid _id"))
}
