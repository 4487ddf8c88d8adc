//! The receiving surface a replica exposes to sync exchanges.

use crate::error::{SyncError, SyncResult};
use replidb_core::{Change, Document, ObjectStoreDatabase};
use replidb_store::ObjectStore;
use tracing::debug;

/// The positions exchanged when a sync begins.
///
/// Tells the source where this target stands and how much of the source's
/// history the target has already seen, so the source can send only the
/// changes the target is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInfo {
    /// The target replica's uid.
    pub target_replica_uid: String,
    /// The target's current generation.
    pub target_generation: u64,
    /// The transaction id at that generation.
    pub target_trans_id: String,
    /// The source generation the target last saw.
    pub source_generation: u64,
    /// The transaction id at that source generation.
    pub source_trans_id: String,
}

/// The sync protocol's view of a replica.
///
/// A sync exchange is driven by a source replica against a target: the
/// source asks for [`SyncTarget::sync_info`], sends the documents the
/// target is missing through [`SyncTarget::receive_docs`], and records the
/// target's resulting position on its own side. Implementors guarantee
/// that a position handed back by any of these operations is durable.
pub trait SyncTarget {
    /// Reports both replicas' known positions at the start of a sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the target's state cannot be read.
    fn sync_info(&self, source_replica_uid: &str) -> SyncResult<SyncInfo>;

    /// Durably records how far the target has seen the source's history.
    ///
    /// # Errors
    ///
    /// Returns an error if the position moves backwards or cannot be
    /// persisted.
    fn record_sync_info(
        &mut self,
        source_replica_uid: &str,
        generation: u64,
        transaction_id: &str,
    ) -> SyncResult<()>;

    /// Applies a batch of documents sent by the source.
    ///
    /// Each document arrives with the source generation and transaction id
    /// at which it changed; conflicts are saved for later resolution, never
    /// silently dropped. `last_known_generation` is the target generation
    /// the source saw at its previous sync. Returns the target's
    /// post-apply position.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidGeneration`] if `last_known_generation`
    /// exceeds the target's actual generation.
    fn receive_docs(
        &mut self,
        source_replica_uid: &str,
        docs: Vec<(Document, u64, String)>,
        last_known_generation: u64,
    ) -> SyncResult<(u64, String)>;

    /// Returns the changes the named replica is missing.
    ///
    /// The send half of an exchange: the target's position plus the latest
    /// change per document after `since_generation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target's state cannot be read.
    fn changes_for(
        &self,
        source_replica_uid: &str,
        since_generation: u64,
    ) -> SyncResult<(u64, String, Vec<Change>)>;
}

/// A [`SyncTarget`] serving an [`ObjectStoreDatabase`].
#[derive(Debug)]
pub struct ObjectStoreSyncTarget<S: ObjectStore> {
    db: ObjectStoreDatabase<S>,
}

impl<S: ObjectStore> ObjectStoreSyncTarget<S> {
    /// Wraps a database as a sync target.
    #[must_use]
    pub fn new(db: ObjectStoreDatabase<S>) -> Self {
        Self { db }
    }

    /// Returns the wrapped database.
    #[must_use]
    pub fn db(&self) -> &ObjectStoreDatabase<S> {
        &self.db
    }

    /// Returns the wrapped database mutably.
    pub fn db_mut(&mut self) -> &mut ObjectStoreDatabase<S> {
        &mut self.db
    }

    /// Consumes the target and returns the wrapped database.
    #[must_use]
    pub fn into_db(self) -> ObjectStoreDatabase<S> {
        self.db
    }
}

impl<S: ObjectStore> SyncTarget for ObjectStoreSyncTarget<S> {
    fn sync_info(&self, source_replica_uid: &str) -> SyncResult<SyncInfo> {
        let (target_generation, target_trans_id) = self.db.generation_and_transaction_id();
        let (source_generation, source_trans_id) =
            self.db.replica_gen_and_trans_id(source_replica_uid);
        Ok(SyncInfo {
            target_replica_uid: self.db.replica_uid().to_string(),
            target_generation,
            target_trans_id,
            source_generation,
            source_trans_id,
        })
    }

    fn record_sync_info(
        &mut self,
        source_replica_uid: &str,
        generation: u64,
        transaction_id: &str,
    ) -> SyncResult<()> {
        self.db
            .set_replica_gen_and_trans_id(source_replica_uid, generation, transaction_id)?;
        Ok(())
    }

    fn receive_docs(
        &mut self,
        source_replica_uid: &str,
        docs: Vec<(Document, u64, String)>,
        last_known_generation: u64,
    ) -> SyncResult<(u64, String)> {
        let actual = self.db.generation();
        if last_known_generation > actual {
            return Err(SyncError::InvalidGeneration {
                source_replica_uid: source_replica_uid.to_string(),
                claimed: last_known_generation,
                actual,
            });
        }

        let received = docs.len();
        let mut final_position: Option<(u64, String)> = None;
        for (doc, source_gen, source_trans_id) in docs {
            self.db.put_doc_if_newer(
                doc,
                true,
                source_replica_uid,
                source_gen,
                &source_trans_id,
            )?;
            final_position = Some((source_gen, source_trans_id));
        }

        // Superseded documents at the tail do not advance the recorded
        // position inside put_doc_if_newer; pin it explicitly.
        if let Some((source_gen, source_trans_id)) = final_position {
            self.db
                .set_replica_gen_and_trans_id(source_replica_uid, source_gen, &source_trans_id)?;
        }

        let position = self.db.generation_and_transaction_id();
        debug!(
            source = source_replica_uid,
            received,
            generation = position.0,
            "batch applied"
        );
        Ok(position)
    }

    fn changes_for(
        &self,
        source_replica_uid: &str,
        since_generation: u64,
    ) -> SyncResult<(u64, String, Vec<Change>)> {
        let (generation, transaction_id, changes) = self.db.whats_changed(since_generation);
        debug!(
            source = source_replica_uid,
            since_generation,
            count = changes.len(),
            "changes collected"
        );
        Ok((generation, transaction_id, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replidb_store::MemoryStore;
    use serde_json::json;

    fn target(uid: &str) -> ObjectStoreSyncTarget<MemoryStore> {
        let db = ObjectStoreDatabase::open(MemoryStore::new(), Some(uid)).unwrap();
        ObjectStoreSyncTarget::new(db)
    }

    #[test]
    fn sync_info_reports_both_positions() {
        let mut t = target("replica-b");
        let mut doc = Document::new("doc-1", json!({}));
        t.db_mut().put_doc(&mut doc).unwrap();
        t.record_sync_info("replica-a", 3, "T-a3").unwrap();

        let info = t.sync_info("replica-a").unwrap();
        assert_eq!(info.target_replica_uid, "replica-b");
        assert_eq!(info.target_generation, 1);
        assert_eq!(info.source_generation, 3);
        assert_eq!(info.source_trans_id, "T-a3");
    }

    #[test]
    fn sync_info_for_unknown_source_is_zero() {
        let t = target("replica-b");
        let info = t.sync_info("stranger").unwrap();
        assert_eq!(info.target_generation, 0);
        assert_eq!(info.source_generation, 0);
        assert_eq!(info.source_trans_id, "");
    }

    #[test]
    fn receive_docs_applies_and_records_position() {
        let mut t = target("replica-b");

        let mut rev = replidb_core::Revision::new();
        rev.increment("replica-a");
        let doc = Document::with_rev("doc-1", rev, Some(json!({"v": 1})));

        let (generation, _) = t
            .receive_docs("replica-a", vec![(doc, 1, "T-a1".into())], 0)
            .unwrap();
        assert_eq!(generation, 1);
        assert!(t.db().get_doc("doc-1", false).is_some());
        assert_eq!(
            t.db().replica_gen_and_trans_id("replica-a"),
            (1, "T-a1".into())
        );
    }

    #[test]
    fn receive_docs_rejects_stale_claim() {
        let mut t = target("replica-b");

        let result = t.receive_docs("replica-a", Vec::new(), 5);
        assert!(matches!(
            result,
            Err(SyncError::InvalidGeneration {
                claimed: 5,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn empty_batch_returns_current_position() {
        let mut t = target("replica-b");
        let mut doc = Document::new("doc-1", json!({}));
        t.db_mut().put_doc(&mut doc).unwrap();

        let (generation, _) = t.receive_docs("replica-a", Vec::new(), 1).unwrap();
        assert_eq!(generation, 1);
    }

    #[test]
    fn changes_for_reports_missing_documents() {
        let mut t = target("replica-b");
        let mut a = Document::new("a", json!({}));
        let mut b = Document::new("b", json!({}));
        t.db_mut().put_doc(&mut a).unwrap();
        t.db_mut().put_doc(&mut b).unwrap();

        let (generation, _, changes) = t.changes_for("replica-a", 1).unwrap();
        assert_eq!(generation, 2);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].doc_id, "b");
    }
}
