//! Object-store trait definition.

use crate::error::StoreResult;

/// A record-oriented object store for ReplidB.
///
/// Object stores are **opaque record stores**. They map string keys to byte
/// values and provide simple operations for reading, writing, and listing
/// records. ReplidB owns all record interpretation - stores do not
/// understand documents, revisions, or the config snapshot.
///
/// # Invariants
///
/// - `put` is durable upon return, or returns an error
/// - `get` returns exactly the bytes most recently written under that key
/// - Overwriting an existing key is permitted; mutation steps are executed
///   at-least-once and must be safe to retry
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait ObjectStore: Send + Sync {
    /// Reads the record stored under `key`.
    ///
    /// Returns `None` if no record exists under that key.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Durably stores `value` under `key`, replacing any prior record.
    ///
    /// After this returns successfully, the record is guaranteed to
    /// survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written durably.
    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Returns the keys of all stored records, in unspecified order.
    ///
    /// # Errors
    ///
    /// Returns an error if the key listing cannot be produced.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be determined.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.keys()?.len())
    }

    /// Returns true if the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be determined.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
