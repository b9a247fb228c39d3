//! Domain models for the migration.
//!
//! - [`RecordId`] - Identifier assigned to every stored document
//! - [`HealthcareRecord`] - One typed input row
//! - [`Patient`] / [`PatientKey`] - Patient document and its identity key
//! - [`Admission`] / [`AdmissionKey`] - Admission document and its identity key

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ParseError;
use crate::normalize::{
    clean_text, format_date, is_missing, normalize_name, try_parse_date, try_parse_decimal,
    try_parse_integer,
};

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a stored document, kept in its `_id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

/// Identifier of a patient document.
pub type PatientId = RecordId;

/// Identifier of an admission document.
pub type AdmissionId = RecordId;

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// =============================================================================
// Input Columns
// =============================================================================

/// Canonical column names
pub mod columns {
    pub const NAME: &str = "name";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const BLOOD_TYPE: &str = "blood_type";
    pub const MEDICAL_CONDITION: &str = "medical_condition";
    pub const DATE_OF_ADMISSION: &str = "date_of_admission";
    pub const DOCTOR: &str = "doctor";
    pub const HOSPITAL: &str = "hospital";
    pub const INSURANCE_PROVIDER: &str = "insurance_provider";
    pub const BILLING_AMOUNT: &str = "billing_amount";
    pub const ROOM_NUMBER: &str = "room_number";
    pub const ADMISSION_TYPE: &str = "admission_type";
    pub const DISCHARGE_DATE: &str = "discharge_date";
    pub const MEDICATION: &str = "medication";
    pub const TEST_RESULTS: &str = "test_results";
}

/// Columns the resolvers read; a dataset lacking any of them is rejected.
pub const REQUIRED_COLUMNS: &[&str] = &[
    columns::NAME,
    columns::AGE,
    columns::GENDER,
    columns::BLOOD_TYPE,
    columns::MEDICAL_CONDITION,
    columns::DATE_OF_ADMISSION,
    columns::DOCTOR,
    columns::HOSPITAL,
    columns::INSURANCE_PROVIDER,
    columns::BILLING_AMOUNT,
    columns::ROOM_NUMBER,
    columns::ADMISSION_TYPE,
    columns::DISCHARGE_DATE,
    columns::MEDICATION,
    columns::TEST_RESULTS,
];

// =============================================================================
// Typed Input Row
// =============================================================================

/// One input row with every field parsed into its canonical form.
///
/// Fields that are missing or fail to parse are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthcareRecord {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub medical_condition: Option<String>,
    pub date_of_admission: Option<NaiveDateTime>,
    pub doctor: Option<String>,
    pub hospital: Option<String>,
    pub insurance_provider: Option<String>,
    pub billing_amount: Option<f64>,
    pub room_number: Option<i64>,
    pub admission_type: Option<String>,
    pub discharge_date: Option<NaiveDateTime>,
    pub medication: Option<String>,
    pub test_results: Option<String>,
}

/// Builds [`HealthcareRecord`]s from raw rows laid out under fixed headers.
#[derive(Debug, Clone)]
pub struct RecordReader {
    index: HashMap<String, usize>,
}

impl RecordReader {
    pub fn new(headers: &[String]) -> Self {
        let mut index = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            // First column wins when a header repeats
            index.entry(header.clone()).or_insert(i);
        }
        Self { index }
    }

    /// Columns from `required` that the headers lack.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.index.contains_key(**c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Parse one row. Field-level failures are returned next to the record.
    pub fn read(&self, row: &[String]) -> (HealthcareRecord, Vec<ParseError>) {
        let mut errors = Vec::new();
        let cell = |column: &str| self.cell(row, column);

        let mut integer = |column: &str| {
            cell(column).and_then(|raw| try_parse_integer(raw).map_err(|e| errors.push(e)).ok())
        };
        let age = integer(columns::AGE);
        let room_number = integer(columns::ROOM_NUMBER);

        let mut dated = |column: &str| {
            cell(column).and_then(|raw| try_parse_date(raw).map_err(|e| errors.push(e)).ok())
        };
        let date_of_admission = dated(columns::DATE_OF_ADMISSION);
        let discharge_date = dated(columns::DISCHARGE_DATE);

        let billing_amount = cell(columns::BILLING_AMOUNT)
            .and_then(|raw| try_parse_decimal(raw).map_err(|e| errors.push(e)).ok());

        let record = HealthcareRecord {
            name: normalize_name(cell(columns::NAME)),
            age,
            gender: clean_text(cell(columns::GENDER)),
            blood_type: clean_text(cell(columns::BLOOD_TYPE)),
            medical_condition: clean_text(cell(columns::MEDICAL_CONDITION)),
            date_of_admission,
            doctor: clean_text(cell(columns::DOCTOR)),
            hospital: clean_text(cell(columns::HOSPITAL)),
            insurance_provider: clean_text(cell(columns::INSURANCE_PROVIDER)),
            billing_amount,
            room_number,
            admission_type: clean_text(cell(columns::ADMISSION_TYPE)),
            discharge_date,
            medication: clean_text(cell(columns::MEDICATION)),
            test_results: clean_text(cell(columns::TEST_RESULTS)),
        };
        (record, errors)
    }

    fn cell<'r>(&self, row: &'r [String], column: &str) -> Option<&'r str> {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .map(String::as_str)
            .filter(|s| !is_missing(s))
    }
}

// =============================================================================
// Patients
// =============================================================================

/// Identity of a patient: normalized name, age, gender and blood type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientKey {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
}

impl PatientKey {
    pub fn from_record(record: &HealthcareRecord) -> Self {
        Self {
            name: record.name.clone(),
            age: record.age,
            gender: record.gender.clone(),
            blood_type: record.blood_type.clone(),
        }
    }
}

/// Patient document. Its four fields are exactly its identity key, so the
/// same serialization serves as insert body and lookup filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
}

impl From<&PatientKey> for Patient {
    fn from(key: &PatientKey) -> Self {
        Self {
            name: key.name.clone(),
            age: key.age,
            gender: key.gender.clone(),
            blood_type: key.blood_type.clone(),
        }
    }
}

// =============================================================================
// Admissions
// =============================================================================

/// Identity of an admission: owning patient, admission date, hospital, room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdmissionKey {
    pub patient_id: PatientId,
    pub date_of_admission: Option<NaiveDateTime>,
    pub hospital: Option<String>,
    pub room_number: Option<i64>,
}

impl AdmissionKey {
    pub fn new(patient_id: PatientId, record: &HealthcareRecord) -> Self {
        Self {
            patient_id,
            date_of_admission: record.date_of_admission,
            hospital: record.hospital.clone(),
            room_number: record.room_number,
        }
    }
}

/// Lookup filter matching an [`AdmissionKey`] in the admissions collection.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionFilter<'a> {
    pub patient_id: PatientId,
    #[serde(serialize_with = "serialize_opt_date")]
    pub date_of_admission: Option<NaiveDateTime>,
    pub hospital: Option<&'a str>,
    pub room_number: Option<i64>,
}

impl<'a> From<&'a AdmissionKey> for AdmissionFilter<'a> {
    fn from(key: &'a AdmissionKey) -> Self {
        Self {
            patient_id: key.patient_id,
            date_of_admission: key.date_of_admission,
            hospital: key.hospital.as_deref(),
            room_number: key.room_number,
        }
    }
}

/// Admission document referencing its owning patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Admission {
    pub patient_id: PatientId,
    pub medical_condition: Option<String>,
    #[serde(serialize_with = "serialize_opt_date")]
    pub date_of_admission: Option<NaiveDateTime>,
    pub doctor: Option<String>,
    pub hospital: Option<String>,
    pub insurance_provider: Option<String>,
    pub billing_amount: Option<f64>,
    pub room_number: Option<i64>,
    pub admission_type: Option<String>,
    #[serde(serialize_with = "serialize_opt_date")]
    pub discharge_date: Option<NaiveDateTime>,
    pub medication: Option<String>,
    pub test_results: Option<String>,
}

impl Admission {
    pub fn new(patient_id: PatientId, record: &HealthcareRecord) -> Self {
        Self {
            patient_id,
            medical_condition: record.medical_condition.clone(),
            date_of_admission: record.date_of_admission,
            doctor: record.doctor.clone(),
            hospital: record.hospital.clone(),
            insurance_provider: record.insurance_provider.clone(),
            billing_amount: record.billing_amount,
            room_number: record.room_number,
            admission_type: record.admission_type.clone(),
            discharge_date: record.discharge_date,
            medication: record.medication.clone(),
            test_results: record.test_results.clone(),
        }
    }
}

fn serialize_opt_date<S: Serializer>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(dt) => serializer.serialize_str(&format_date(dt)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> Vec<String> {
        REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn row(values: &[(&str, &str)]) -> Vec<String> {
        let mut cells = vec![String::new(); REQUIRED_COLUMNS.len()];
        for (column, value) in values {
            let i = REQUIRED_COLUMNS.iter().position(|c| c == column).unwrap();
            cells[i] = value.to_string();
        }
        cells
    }

    #[test]
    fn test_read_full_row() {
        let reader = RecordReader::new(&headers());
        let (record, errors) = reader.read(&row(&[
            ("name", "bobby JacksOn"),
            ("age", "30"),
            ("gender", "Male"),
            ("blood_type", "B-"),
            ("date_of_admission", "2024-01-31"),
            ("hospital", "Sons and Miller"),
            ("billing_amount", "18856.28"),
            ("room_number", "328"),
            ("discharge_date", "2024-02-02"),
        ]));

        assert!(errors.is_empty());
        assert_eq!(record.name.as_deref(), Some("Bobby Jackson"));
        assert_eq!(record.age, Some(30));
        assert_eq!(record.room_number, Some(328));
        assert_eq!(record.billing_amount, Some(18856.28));
        assert!(record.date_of_admission.is_some());
        assert!(record.medication.is_none());
    }

    #[test]
    fn test_read_reports_field_errors() {
        let reader = RecordReader::new(&headers());
        let (record, errors) = reader.read(&row(&[
            ("name", "Ann"),
            ("age", "old"),
            ("date_of_admission", "someday"),
        ]));

        assert_eq!(record.age, None);
        assert_eq!(record.date_of_admission, None);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_missing_columns() {
        let reader = RecordReader::new(&["name".to_string(), "age".to_string()]);
        let missing = reader.missing_columns(&["name", "age", "hospital"]);
        assert_eq!(missing, vec!["hospital"]);
    }

    #[test]
    fn test_patient_serialization() {
        let key = PatientKey {
            name: Some("Ann Lee".into()),
            age: None,
            gender: Some("Female".into()),
            blood_type: Some("O+".into()),
        };
        let value = serde_json::to_value(Patient::from(&key)).unwrap();
        assert_eq!(
            value,
            json!({"name": "Ann Lee", "age": null, "gender": "Female", "blood_type": "O+"})
        );
    }

    #[test]
    fn test_admission_filter_matches_document_encoding() {
        let patient_id = RecordId::new();
        let record = HealthcareRecord {
            date_of_admission: crate::normalize::parse_date(Some("2024-01-31")),
            hospital: Some("Sons and Miller".into()),
            room_number: Some(328),
            ..Default::default()
        };
        let key = AdmissionKey::new(patient_id, &record);

        let filter = serde_json::to_value(AdmissionFilter::from(&key)).unwrap();
        let doc = serde_json::to_value(Admission::new(patient_id, &record)).unwrap();

        for field in ["patient_id", "date_of_admission", "hospital", "room_number"] {
            assert_eq!(filter[field], doc[field], "field {field}");
        }
        assert_eq!(doc["date_of_admission"], "2024-01-31T00:00:00");
        assert_eq!(doc["patient_id"], patient_id.to_string());
    }

    #[test]
    fn test_record_id_round_trip_through_string() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
