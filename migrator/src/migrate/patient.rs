//! Patient resolution: map a row to the identifier of its patient document.

use crate::cache::IdentityCache;
use crate::error::StoreResult;
use crate::models::{HealthcareRecord, Patient, PatientId, PatientKey};
use crate::store::{to_document, DocumentStore};

use super::{existing_id, MigrationMode, RunStats, PATIENTS};

/// Finds or creates the patient for each row, at most one document per key.
///
/// Lookup order is the run cache, then (append mode only) the store, then a
/// fresh insert. Every identifier obtained is cached, so the store sees at
/// most one lookup per distinct key.
#[derive(Debug)]
pub struct PatientResolver {
    cache: IdentityCache<PatientKey>,
    mode: MigrationMode,
}

impl PatientResolver {
    pub fn new(mode: MigrationMode) -> Self {
        Self {
            cache: IdentityCache::new(),
            mode,
        }
    }

    pub fn resolve(
        &mut self,
        store: &mut dyn DocumentStore,
        record: &HealthcareRecord,
        stats: &mut RunStats,
    ) -> StoreResult<PatientId> {
        let key = PatientKey::from_record(record);
        if let Some(id) = self.cache.get(&key) {
            tracing::trace!(patient_id = %id, "patient cache hit");
            return Ok(id);
        }

        let document = to_document(&Patient::from(&key))?;

        if self.mode == MigrationMode::Append {
            if let Some(found) = store.find_one(PATIENTS, &document)? {
                let id = existing_id(PATIENTS, &found)?;
                tracing::debug!(patient_id = %id, "patient already stored");
                stats.patient_found();
                return Ok(self.cache.insert(key, id));
            }
        }

        let id = store.insert_one(PATIENTS, document)?;
        tracing::debug!(patient_id = %id, name = ?key.name, "patient created");
        stats.patient_created();
        Ok(self.cache.insert(key, id))
    }

    /// Distinct patient keys seen so far
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_hits(&self) -> usize {
        self.cache.hits()
    }
}
