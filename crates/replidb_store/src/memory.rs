//! In-memory object store for testing.

use crate::backend::ObjectStore;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory object store.
///
/// This store keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use replidb_store::{MemoryStore, ObjectStore};
///
/// let mut store = MemoryStore::new();
/// store.put("key", b"value").unwrap();
/// assert_eq!(store.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory store with pre-existing records.
    ///
    /// Useful for testing bootstrap scenarios.
    #[must_use]
    pub fn with_records(records: HashMap<String, Vec<u8>>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Returns a copy of all records in the store.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn records(&self) -> HashMap<String, Vec<u8>> {
        self.records.read().clone()
    }

    /// Clears all records from the store.
    pub fn clear(&mut self) {
        self.records.write().clear();
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.records.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.records.read().keys().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn memory_put_and_get() {
        let mut store = MemoryStore::new();

        store.put("a", b"alpha").unwrap();
        store.put("b", b"beta").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"alpha"[..]));
        assert_eq!(store.get("b").unwrap().as_deref(), Some(&b"beta"[..]));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn memory_get_missing() {
        let store = MemoryStore::new();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn memory_put_overwrites() {
        let mut store = MemoryStore::new();

        store.put("key", b"first").unwrap();
        store.put("key", b"second").unwrap();

        assert_eq!(store.get("key").unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn memory_keys_lists_all() {
        let mut store = MemoryStore::new();

        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn memory_with_records() {
        let mut seeded = HashMap::new();
        seeded.insert("preloaded".to_string(), b"data".to_vec());

        let store = MemoryStore::with_records(seeded);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.get("preloaded").unwrap().as_deref(),
            Some(&b"data"[..])
        );
    }

    #[test]
    fn memory_clear() {
        let mut store = MemoryStore::new();
        store.put("key", b"value").unwrap();
        store.clear();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn memory_empty_value() {
        let mut store = MemoryStore::new();
        store.put("empty", b"").unwrap();
        assert_eq!(store.get("empty").unwrap().as_deref(), Some(&b""[..]));
    }
}
