//! In-process document store.

use std::collections::HashMap;

use serde_json::Value;

use super::{assign_id, check_collection, Document, DocumentStore, IndexSpec};
use crate::error::StoreResult;
use crate::models::RecordId;

#[derive(Debug, Default, Clone)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

/// A store holding every collection in memory.
///
/// Lookups scan the collection; indexes are recorded but not used.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<String, Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes created on a collection, in creation order.
    pub fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    /// All documents of a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> &[Document] {
        self.collections
            .get(collection)
            .map(|c| c.documents.as_slice())
            .unwrap_or(&[])
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field).unwrap_or(&Value::Null) == expected)
}

impl DocumentStore for MemoryStore {
    fn create_index(&mut self, collection: &str, index: &IndexSpec) -> StoreResult<()> {
        check_collection(collection)?;
        let entry = self.collections.entry(collection.to_string()).or_default();
        if !entry.indexes.iter().any(|i| i.name == index.name) {
            entry.indexes.push(index.clone());
        }
        Ok(())
    }

    fn find_one(&self, collection: &str, filter: &Document) -> StoreResult<Option<Document>> {
        check_collection(collection)?;
        Ok(self
            .documents(collection)
            .iter()
            .find(|doc| matches(doc, filter))
            .cloned())
    }

    fn insert_one(&mut self, collection: &str, mut document: Document) -> StoreResult<RecordId> {
        check_collection(collection)?;
        let id = assign_id(&mut document);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .documents
            .push(document);
        Ok(id)
    }

    fn count_documents(&self, collection: &str) -> StoreResult<u64> {
        check_collection(collection)?;
        Ok(self.documents(collection).len() as u64)
    }

    fn drop_collection(&mut self, collection: &str) -> StoreResult<()> {
        check_collection(collection)?;
        self.collections.remove(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{document_id, to_document};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        to_document(&value).unwrap()
    }

    #[test]
    fn test_insert_find_count() {
        let mut store = MemoryStore::new();
        let id = store
            .insert_one("patients", doc(json!({"name": "Ann", "age": 30})))
            .unwrap();

        let found = store
            .find_one("patients", &doc(json!({"name": "Ann", "age": 30})))
            .unwrap()
            .unwrap();
        assert_eq!(document_id(&found), Some(id));
        assert_eq!(store.count_documents("patients").unwrap(), 1);
        assert!(store
            .find_one("patients", &doc(json!({"name": "Ann", "age": 31})))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_null_filter_matches_absent_field() {
        let mut store = MemoryStore::new();
        store
            .insert_one("patients", doc(json!({"name": "Ann"})))
            .unwrap();

        let found = store
            .find_one("patients", &doc(json!({"name": "Ann", "age": null})))
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_drop_collection() {
        let mut store = MemoryStore::new();
        store.insert_one("admissions", doc(json!({"a": 1}))).unwrap();
        store.drop_collection("admissions").unwrap();
        assert_eq!(store.count_documents("admissions").unwrap(), 0);
        // dropping a missing collection is fine
        store.drop_collection("admissions").unwrap();
    }

    #[test]
    fn test_create_index_is_idempotent() {
        let mut store = MemoryStore::new();
        let index = IndexSpec::new("by_name").asc("name");
        store.create_index("patients", &index).unwrap();
        store.create_index("patients", &index).unwrap();
        assert_eq!(store.indexes("patients"), vec![index]);
    }

    #[test]
    fn test_invalid_collection_name() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.count_documents("bad name"),
            Err(StoreError::InvalidCollection(_))
        ));
    }
}
