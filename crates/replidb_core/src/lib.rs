//! Sync-consistent document database over an object store.
//!
//! `replidb_core` keeps a set of JSON documents, their vector-clock
//! revisions, named equality indexes, and an append-only transaction log
//! consistent with any [`replidb_store::ObjectStore`] backend. Every
//! mutation runs through one choke point that updates indexes, appends to
//! the log, persists the document record, and re-persists the metadata
//! snapshot, so a database can be reopened from the store alone.
//!
//! # Layout
//!
//! - [`Document`] / [`Revision`]: the data model
//! - [`TransactionLog`]: generations and change tracking
//! - [`Index`] / [`IndexSet`]: secondary indexes over bodies
//! - [`ConfigSnapshot`]: the persisted metadata record
//! - [`ObjectStoreDatabase`]: the database itself
//!
//! # Example
//!
//! ```rust
//! use replidb_core::{Document, ObjectStoreDatabase};
//! use replidb_store::MemoryStore;
//! use serde_json::json;
//!
//! let mut db = ObjectStoreDatabase::open(MemoryStore::new(), Some("laptop")).unwrap();
//!
//! let mut doc = Document::new("note-1", json!({"title": "groceries"}));
//! db.put_doc(&mut doc).unwrap();
//!
//! db.create_index("by-title", &["title"]).unwrap();
//! let found = db.get_from_index("by-title", &["groceries"]).unwrap();
//! assert_eq!(found.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod document;
mod error;
mod index;
mod revision;
mod snapshot;
mod state;
mod txlog;

pub use database::{DocState, ObjectStoreDatabase};
pub use document::{validate_doc_id, Document, RESERVED_PREFIX};
pub use error::{DbError, DbResult};
pub use index::{Index, IndexSet};
pub use revision::Revision;
pub use snapshot::{ConfigSnapshot, ConflictVersion, PeerState, CONFIG_DOC_ID};
pub use txlog::{allocate_transaction_id, Change, LogEntry, TransactionLog};
