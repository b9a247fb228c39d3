//! Admission resolution: store each distinct admission once.

use crate::cache::IdentityCache;
use crate::error::StoreResult;
use crate::models::{
    Admission, AdmissionFilter, AdmissionId, AdmissionKey, HealthcareRecord, PatientId,
};
use crate::store::{to_document, DocumentStore};

use super::{existing_id, MigrationMode, RunStats, ADMISSIONS};

/// Creates the admission for each row unless its key was already handled.
///
/// The key is (patient, admission date, hospital, room). In append mode the
/// store is checked before inserting.
#[derive(Debug)]
pub struct AdmissionResolver {
    cache: IdentityCache<AdmissionKey>,
    mode: MigrationMode,
}

impl AdmissionResolver {
    pub fn new(mode: MigrationMode) -> Self {
        Self {
            cache: IdentityCache::new(),
            mode,
        }
    }

    pub fn resolve(
        &mut self,
        store: &mut dyn DocumentStore,
        patient_id: PatientId,
        record: &HealthcareRecord,
        stats: &mut RunStats,
    ) -> StoreResult<AdmissionId> {
        let key = AdmissionKey::new(patient_id, record);
        if let Some(id) = self.cache.get(&key) {
            tracing::debug!(admission_id = %id, "admission repeated within run, skipped");
            stats.admission_duplicate();
            return Ok(id);
        }

        if self.mode == MigrationMode::Append {
            let filter = to_document(&AdmissionFilter::from(&key))?;
            if let Some(found) = store.find_one(ADMISSIONS, &filter)? {
                let id = existing_id(ADMISSIONS, &found)?;
                tracing::debug!(admission_id = %id, "admission already stored");
                stats.admission_found();
                return Ok(self.cache.insert(key, id));
            }
        }

        let document = to_document(&Admission::new(patient_id, record))?;
        let id = store.insert_one(ADMISSIONS, document)?;
        tracing::debug!(admission_id = %id, patient_id = %patient_id, "admission created");
        stats.admission_created();
        Ok(self.cache.insert(key, id))
    }

    /// Distinct admission keys seen so far
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use crate::normalize::parse_date;
    use crate::store::MemoryStore;

    fn record(date: &str, room: i64, doctor: &str) -> HealthcareRecord {
        HealthcareRecord {
            date_of_admission: parse_date(Some(date)),
            hospital: Some("Sons and Miller".into()),
            room_number: Some(room),
            doctor: Some(doctor.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_distinct_keys_create_distinct_admissions() {
        let mut store = MemoryStore::new();
        let mut stats = RunStats::default();
        let mut resolver = AdmissionResolver::new(MigrationMode::Fresh);
        let patient = RecordId::new();

        let rows = [
            (patient, record("2024-01-31", 328, "A")),
            (patient, record("2024-02-10", 328, "A")),
            (RecordId::new(), record("2024-01-31", 328, "A")),
        ];
        for (patient_id, row) in &rows {
            resolver.resolve(&mut store, *patient_id, row, &mut stats).unwrap();
        }

        assert_eq!(stats.created_admissions, 3);
        assert_eq!(store.count_documents(ADMISSIONS).unwrap(), 3);
    }

    #[test]
    fn test_same_key_different_details_is_one_admission() {
        let mut store = MemoryStore::new();
        let mut stats = RunStats::default();
        let mut resolver = AdmissionResolver::new(MigrationMode::Fresh);
        let patient = RecordId::new();

        let first = resolver
            .resolve(&mut store, patient, &record("2024-01-31", 328, "A"), &mut stats)
            .unwrap();
        let second = resolver
            .resolve(&mut store, patient, &record("2024-01-31", 328, "B"), &mut stats)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(stats.created_admissions, 1);
        assert_eq!(stats.duplicate_admissions, 1);
        assert_eq!(store.count_documents(ADMISSIONS).unwrap(), 1);
    }

    #[test]
    fn test_append_mode_finds_stored_admission() {
        let mut store = MemoryStore::new();
        let patient = RecordId::new();
        let mut stats = RunStats::default();
        let stored = AdmissionResolver::new(MigrationMode::Fresh)
            .resolve(&mut store, patient, &record("2024-01-31", 328, "A"), &mut stats)
            .unwrap();

        let mut stats = RunStats::default();
        let found = AdmissionResolver::new(MigrationMode::Append)
            .resolve(&mut store, patient, &record("2024-01-31", 328, "A"), &mut stats)
            .unwrap();

        assert_eq!(stored, found);
        assert_eq!(stats.created_admissions, 0);
        assert_eq!(stats.existing_admissions, 1);
        assert_eq!(store.count_documents(ADMISSIONS).unwrap(), 1);
    }

    #[test]
    fn test_missing_key_fields_still_deduplicate() {
        let mut store = MemoryStore::new();
        let patient = RecordId::new();
        let blank = HealthcareRecord::default();
        let mut stats = RunStats::default();
        AdmissionResolver::new(MigrationMode::Fresh)
            .resolve(&mut store, patient, &blank, &mut stats)
            .unwrap();

        let mut stats = RunStats::default();
        AdmissionResolver::new(MigrationMode::Append)
            .resolve(&mut store, patient, &blank, &mut stats)
            .unwrap();

        assert_eq!(stats.existing_admissions, 1);
        assert_eq!(store.count_documents(ADMISSIONS).unwrap(), 1);
    }
}
