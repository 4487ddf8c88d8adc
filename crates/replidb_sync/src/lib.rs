//! Sync target surface for ReplidB replicas.
//!
//! Exposes an [`ObjectStoreDatabase`](replidb_core::ObjectStoreDatabase)
//! to the sync protocol: a [`SyncTarget`] answers position queries, takes
//! batches of changed documents, and durably records how much of a peer's
//! history it has seen. Conflicting versions received during an exchange
//! are saved on the target for later resolution, never dropped.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod target;

pub use error::{SyncError, SyncResult};
pub use target::{ObjectStoreSyncTarget, SyncInfo, SyncTarget};
