//! Identity cache - remember which natural keys already have a record.
//!
//! One cache per entity kind lives for a single migration run. Entries are
//! never evicted: there is one per distinct real-world entity, not per row.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::RecordId;

/// Maps a composite natural key to the identifier of its stored record.
#[derive(Debug, Clone)]
pub struct IdentityCache<K> {
    entries: HashMap<K, RecordId>,
    hits: usize,
}

impl<K: Hash + Eq> IdentityCache<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
        }
    }

    /// Look up a key, counting the hit.
    pub fn get(&mut self, key: &K) -> Option<RecordId> {
        let found = self.entries.get(key).copied();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remember the record for a key. The first identifier stored for a key is kept.
    pub fn insert(&mut self, key: K, id: RecordId) -> RecordId {
        *self.entries.entry(key).or_insert(id)
    }

    /// Number of distinct keys cached
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful lookups so far
    pub fn hits(&self) -> usize {
        self.hits
    }
}

impl<K: Hash + Eq> Default for IdentityCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = IdentityCache::new();
        let id = RecordId::new();

        assert_eq!(cache.get(&("Ann", 30)), None);
        cache.insert(("Ann", 30), id);
        assert_eq!(cache.get(&("Ann", 30)), Some(id));
        assert_eq!(cache.get(&("Ann", 31)), None);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_first_identifier_wins() {
        let mut cache = IdentityCache::new();
        let first = RecordId::new();
        let second = RecordId::new();

        assert_eq!(cache.insert("key", first), first);
        assert_eq!(cache.insert("key", second), first);
        assert_eq!(cache.get(&"key"), Some(first));
    }

    #[test]
    fn test_missing_fields_are_part_of_the_key() {
        let mut cache: IdentityCache<(Option<&str>, Option<i64>)> = IdentityCache::new();
        let id = RecordId::new();
        cache.insert((Some("Ann"), None), id);

        assert!(cache.contains(&(Some("Ann"), None)));
        assert!(!cache.contains(&(Some("Ann"), Some(0))));
    }
}
