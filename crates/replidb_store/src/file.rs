//! File-based object store for persistent storage.
//!
//! Layout of a store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ 646f632d31.rec    # One record file per key (hex-encoded key)
//! └─ ...
//! ```

use crate::backend::ObjectStore;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const RECORD_SUFFIX: &str = ".rec";
const TEMP_SUFFIX: &str = ".tmp";

/// A file-based object store.
///
/// Each record is kept in its own file whose name is the hex encoding of
/// the record key, so any key is representable regardless of the host
/// file system's naming rules. Records survive process restarts.
///
/// # Durability
///
/// `put` writes to a temporary file, syncs it to disk, and renames it over
/// the record file, so a crash mid-write leaves the prior record intact.
///
/// # Locking
///
/// An exclusive advisory lock on the `LOCK` file ensures only one process
/// opens the store at a time. Opening a locked store returns
/// [`StoreError::Locked`].
///
/// # Example
///
/// ```no_run
/// use replidb_store::{FileStore, ObjectStore};
/// use std::path::Path;
///
/// let mut store = FileStore::open(Path::new("my_store"), true).unwrap();
/// store.put("doc-1", b"{\"x\":1}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a file store at the given directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the store directory
    /// * `create` - If true, creates the directory if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create` is false
    /// - Another process holds the lock (returns [`StoreError::Locked`])
    /// - I/O errors occur
    pub fn open(path: &Path, create: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::does_not_exist(path.display().to_string()));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::Corrupted(format!(
                "store path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key));
        }
        Ok(self.path.join(format!("{}{RECORD_SUFFIX}", encode_key(key))))
    }
}

impl ObjectStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let record_path = self.record_path(key)?;
        match fs::read(&record_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        let record_path = self.record_path(key)?;
        let temp_path = self.path.join(format!(
            "{}{RECORD_SUFFIX}{TEMP_SUFFIX}",
            encode_key(key)
        ));

        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(value)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &record_path)?;

        tracing::trace!(key, len = value.len(), "record stored");
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(encoded) = name.strip_suffix(RECORD_SUFFIX) else {
                continue;
            };
            match decode_key(encoded) {
                Some(key) => keys.push(key),
                None => {
                    return Err(StoreError::Corrupted(format!(
                        "unreadable record file name: {name}"
                    )))
                }
            }
        }
        Ok(keys)
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len() * 2);
    for byte in key.as_bytes() {
        let _ = write!(encoded, "{byte:02x}");
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(encoded.len() / 2);
    for pair in encoded.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileStore::open(&path, true).unwrap();
        assert!(store.is_empty().unwrap());
        assert!(path.join(LOCK_FILE).exists());
    }

    #[test]
    fn file_open_missing_without_create_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent");

        let result = FileStore::open(&path, false);
        assert!(matches!(result, Err(StoreError::DoesNotExist { .. })));
    }

    #[test]
    fn file_put_and_get() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), true).unwrap();

        store.put("doc-1", b"{\"x\":1}").unwrap();

        let record = store.get("doc-1").unwrap();
        assert_eq!(record.as_deref(), Some(&b"{\"x\":1}"[..]));
    }

    #[test]
    fn file_get_missing() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), true).unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn file_put_overwrites() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), true).unwrap();

        store.put("key", b"first").unwrap();
        store.put("key", b"second").unwrap();

        assert_eq!(store.get("key").unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn file_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let mut store = FileStore::open(dir.path(), true).unwrap();
            store.put("persistent", b"data").unwrap();
        }

        {
            let store = FileStore::open(dir.path(), false).unwrap();
            assert_eq!(
                store.get("persistent").unwrap().as_deref(),
                Some(&b"data"[..])
            );
        }
    }

    #[test]
    fn file_keys_roundtrip_odd_names() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), true).unwrap();

        store.put("u1db_data", b"snapshot").unwrap();
        store.put("doc/with:odd chars", b"body").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["doc/with:odd chars".to_string(), "u1db_data".to_string()]
        );
    }

    #[test]
    fn file_empty_key_rejected() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), true).unwrap();

        let result = store.put("", b"value");
        assert!(matches!(result, Err(StoreError::InvalidKey { .. })));
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = FileStore::open(dir.path(), true).unwrap();

        let result = FileStore::open(dir.path(), false);
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn key_codec_roundtrip() {
        for key in ["a", "doc-1", "u1db_data", "späce / slash"] {
            let encoded = encode_key(key);
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }
}
