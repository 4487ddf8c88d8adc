//! In-memory replica state.
//!
//! Holds the document map, index set, transaction log, conflict sets, and
//! peer positions that [`crate::ObjectStoreDatabase`] keeps consistent
//! with the object store. This is the pure in-memory half of the design;
//! the database wraps it and adds the persistence protocol.

use crate::document::Document;
use crate::index::{Index, IndexSet};
use crate::snapshot::{ConfigSnapshot, ConflictVersion, PeerState};
use crate::txlog::TransactionLog;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct ReplicaState {
    replica_uid: String,
    docs: BTreeMap<String, Document>,
    indexes: IndexSet,
    log: TransactionLog,
    conflicts: BTreeMap<String, Vec<ConflictVersion>>,
    peers: BTreeMap<String, PeerState>,
}

impl ReplicaState {
    pub(crate) fn new(replica_uid: impl Into<String>) -> Self {
        Self {
            replica_uid: replica_uid.into(),
            ..Self::default()
        }
    }

    /// Restores metadata from a fetched snapshot. Documents are loaded
    /// separately from their own records.
    pub(crate) fn from_snapshot(snapshot: ConfigSnapshot) -> Self {
        let mut indexes = IndexSet::new();
        for (name, expressions) in snapshot.indexes {
            indexes.insert(Index::new(name, expressions));
        }

        Self {
            replica_uid: snapshot.replica_uid,
            docs: BTreeMap::new(),
            indexes,
            log: TransactionLog::from_entries(snapshot.transaction_log),
            conflicts: snapshot.conflicts,
            peers: snapshot.peers,
        }
    }

    /// Produces the snapshot describing the current metadata.
    pub(crate) fn snapshot(&self) -> ConfigSnapshot {
        let (generation, transaction_id) = self.log.generation_and_transaction_id();
        ConfigSnapshot {
            replica_uid: self.replica_uid.clone(),
            generation,
            transaction_id,
            indexes: self.indexes.definitions(),
            transaction_log: self.log.entries().to_vec(),
            conflicts: self.conflicts.clone(),
            peers: self.peers.clone(),
        }
    }

    pub(crate) fn replica_uid(&self) -> &str {
        &self.replica_uid
    }

    pub(crate) fn set_replica_uid(&mut self, replica_uid: impl Into<String>) {
        self.replica_uid = replica_uid.into();
    }

    pub(crate) fn doc(&self, doc_id: &str) -> Option<&Document> {
        self.docs.get(doc_id)
    }

    pub(crate) fn docs(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    pub(crate) fn insert_doc(&mut self, doc: Document) {
        self.docs.insert(doc.doc_id().to_string(), doc);
    }

    pub(crate) fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    pub(crate) fn indexes_mut(&mut self) -> &mut IndexSet {
        &mut self.indexes
    }

    pub(crate) fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut TransactionLog {
        &mut self.log
    }

    pub(crate) fn has_conflicts(&self, doc_id: &str) -> bool {
        self.conflicts.get(doc_id).is_some_and(|c| !c.is_empty())
    }

    pub(crate) fn conflicts_for(&self, doc_id: &str) -> &[ConflictVersion] {
        self.conflicts.get(doc_id).map_or(&[], Vec::as_slice)
    }

    /// Replaces a document's conflict set; an empty set clears it.
    pub(crate) fn set_conflicts(&mut self, doc_id: &str, versions: Vec<ConflictVersion>) {
        if versions.is_empty() {
            self.conflicts.remove(doc_id);
        } else {
            self.conflicts.insert(doc_id.to_string(), versions);
        }
    }

    pub(crate) fn add_conflict(&mut self, doc_id: &str, version: ConflictVersion) {
        self.conflicts.entry(doc_id.to_string()).or_default().push(version);
    }

    pub(crate) fn peer(&self, replica_uid: &str) -> PeerState {
        self.peers.get(replica_uid).cloned().unwrap_or_default()
    }

    pub(crate) fn record_peer(
        &mut self,
        replica_uid: &str,
        generation: u64,
        transaction_id: impl Into<String>,
    ) {
        self.peers.insert(
            replica_uid.to_string(),
            PeerState {
                generation,
                transaction_id: transaction_id.into(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::Revision;
    use serde_json::json;

    #[test]
    fn snapshot_roundtrip_restores_metadata() {
        let mut state = ReplicaState::new("replica-a");
        state.indexes_mut().insert(Index::new("by-name", vec!["name".into()]));
        state.log_mut().append("doc-1", "T-1");
        state.record_peer("replica-b", 4, "T-b4");
        state.add_conflict(
            "doc-1",
            ConflictVersion {
                rev: Revision::parse("other:1").unwrap(),
                body: Some(json!({"x": 2})),
            },
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.transaction_id, "T-1");

        let restored = ReplicaState::from_snapshot(snapshot.clone());
        assert_eq!(restored.replica_uid(), "replica-a");
        assert_eq!(restored.log().generation(), 1);
        assert!(restored.indexes().get("by-name").is_some());
        assert!(restored.has_conflicts("doc-1"));
        assert_eq!(restored.peer("replica-b").generation, 4);
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn clearing_conflicts_removes_entry() {
        let mut state = ReplicaState::new("r");
        state.add_conflict(
            "doc-1",
            ConflictVersion {
                rev: Revision::parse("other:1").unwrap(),
                body: None,
            },
        );
        assert!(state.has_conflicts("doc-1"));

        state.set_conflicts("doc-1", Vec::new());
        assert!(!state.has_conflicts("doc-1"));
        assert!(state.conflicts_for("doc-1").is_empty());
    }

    #[test]
    fn unknown_peer_defaults_to_zero() {
        let state = ReplicaState::new("r");
        let peer = state.peer("unknown");
        assert_eq!(peer.generation, 0);
        assert_eq!(peer.transaction_id, "");
    }
}
