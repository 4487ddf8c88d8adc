//! # ReplidB Store
//!
//! Object-store backend trait and implementations for ReplidB.
//!
//! This crate provides the lowest-level storage abstraction for ReplidB.
//! Object stores are **opaque record stores** - string keys mapped to byte
//! values. They do not interpret the records they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple record stores (get, put, keys)
//! - No knowledge of documents, revisions, or the config snapshot
//! - `put` is durable upon return, or returns an error
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryStore`] - For testing and ephemeral databases
//! - [`FileStore`] - For persistent storage using one file per record
//!
//! ## Example
//!
//! ```rust
//! use replidb_store::{MemoryStore, ObjectStore};
//!
//! let mut store = MemoryStore::new();
//! store.put("doc-1", b"{\"x\":1}").unwrap();
//! let record = store.get("doc-1").unwrap();
//! assert_eq!(record.as_deref(), Some(&b"{\"x\":1}"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::ObjectStore;
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
