//! Document store abstraction.
//!
//! The migration only needs five operations from a store, captured by the
//! [`DocumentStore`] trait. Two implementations ship with the crate:
//!
//! | Store | Address | Use |
//! |-------|---------|-----|
//! | [`SqliteStore`] | `sqlite://<dir>` | Durable store, one `<db_name>.sqlite` file per database |
//! | [`MemoryStore`] | `memory://` | Process-local store for tests and dry runs |
//!
//! Documents are JSON objects. Every stored document carries its
//! [`RecordId`] in the `_id` field.

pub mod memory;
pub mod sqlite;

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::StoreUri;
use crate::error::{StoreError, StoreResult};
use crate::models::RecordId;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored document or a lookup filter.
pub type Document = Map<String, Value>;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";

// =============================================================================
// Index Specification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A compound index over top-level document fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<(String, SortOrder)>,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), SortOrder::Ascending));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), SortOrder::Descending));
        self
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Operations the migration performs against a document store.
///
/// Filters match by exact equality on every listed field; a `null` filter
/// value matches both `null` and absent fields.
pub trait DocumentStore: Send {
    /// Create an index if it does not exist yet.
    fn create_index(&mut self, collection: &str, index: &IndexSpec) -> StoreResult<()>;

    /// First document matching `filter`, if any.
    fn find_one(&self, collection: &str, filter: &Document) -> StoreResult<Option<Document>>;

    /// Insert a document, assigning an `_id` when it has none.
    fn insert_one(&mut self, collection: &str, document: Document) -> StoreResult<RecordId>;

    /// Number of documents in a collection (zero if it does not exist).
    fn count_documents(&self, collection: &str) -> StoreResult<u64>;

    /// Remove a collection with all its documents and indexes.
    fn drop_collection(&mut self, collection: &str) -> StoreResult<()>;
}

/// Open the store an address points to.
pub fn open_store(
    uri: &StoreUri,
    db_name: &str,
    timeout: Duration,
) -> StoreResult<Box<dyn DocumentStore>> {
    match uri {
        StoreUri::Memory => Ok(Box::new(MemoryStore::new())),
        StoreUri::Sqlite(dir) => {
            let path = dir.join(format!("{db_name}.sqlite"));
            Ok(Box::new(SqliteStore::open(&path, timeout)?))
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Serialize a model into a document.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        )))),
    }
}

/// Identifier stored in a document's `_id` field.
pub fn document_id(document: &Document) -> Option<RecordId> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

/// Ensure `document` has an `_id`, returning it.
pub(crate) fn assign_id(document: &mut Document) -> RecordId {
    if let Some(id) = document_id(document) {
        return id;
    }
    let id = RecordId::new();
    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    id
}

/// Collection and field names are embedded in queries and must be plain identifiers.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn check_collection(name: &str) -> StoreResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}
