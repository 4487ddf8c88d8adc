//! Persisted database metadata.

use crate::error::DbResult;
use crate::revision::Revision;
use crate::txlog::LogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved record id under which the config snapshot is stored.
pub const CONFIG_DOC_ID: &str = "u1db_data";

/// One conflicting version of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictVersion {
    /// The revision of the conflicting branch.
    pub rev: Revision,
    /// Its body, `None` for a deleted branch.
    pub body: Option<Value>,
}

/// What this replica knows about a peer replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerState {
    /// The peer's last seen generation.
    pub generation: u64,
    /// The transaction id at that generation.
    pub transaction_id: String,
}

/// The database metadata record mirrored between memory and the object
/// store.
///
/// Exactly one snapshot exists per database, stored under
/// [`CONFIG_DOC_ID`]. It is re-persisted synchronously inside every
/// metadata-mutating operation, so the stored copy is never stale
/// relative to the last acknowledged mutation: a crash between an
/// in-memory change and the persistence call leaves the store describing
/// the pre-mutation state, which is a valid recovery point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// This replica's uid.
    pub replica_uid: String,
    /// Number of mutations applied by this replica.
    pub generation: u64,
    /// Transaction id of the latest mutation, empty at generation zero.
    pub transaction_id: String,
    /// Index definitions: name to expressions.
    pub indexes: BTreeMap<String, Vec<String>>,
    /// Full transaction log, needed to answer change queries after reopen.
    pub transaction_log: Vec<LogEntry>,
    /// Unresolved conflict versions per document.
    pub conflicts: BTreeMap<String, Vec<ConflictVersion>>,
    /// Known peer replica positions.
    pub peers: BTreeMap<String, PeerState>,
}

impl ConfigSnapshot {
    /// Serializes the snapshot for storage.
    ///
    /// # Errors
    ///
    /// Returns a codec error if serialization fails.
    pub fn encode(&self) -> DbResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a snapshot fetched from storage.
    ///
    /// # Errors
    ///
    /// Returns a codec error on malformed input.
    pub fn decode(bytes: &[u8]) -> DbResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
