//! The object-store-backed database.

use crate::document::{validate_doc_id, Document, RESERVED_PREFIX};
use crate::error::{DbError, DbResult};
use crate::index::Index;
use crate::revision::Revision;
use crate::snapshot::{ConfigSnapshot, ConflictVersion, CONFIG_DOC_ID};
use crate::state::ReplicaState;
use crate::txlog::{allocate_transaction_id, Change};
use replidb_store::ObjectStore;
use tracing::{debug, trace};
use uuid::Uuid;

/// Outcome of applying a document received from another replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    /// The incoming version was newer and is now current.
    Inserted,
    /// The stored version is newer; the incoming one was ignored.
    Superseded,
    /// Both replicas already hold the same revision.
    Converged,
    /// The versions are concurrent edits of the same lineage.
    Conflicted,
}

/// A document database backed by an object store.
///
/// The database keeps an in-memory replica of documents, indexes, the
/// transaction log, conflict sets, and peer positions, and keeps the
/// object store consistent with it: every mutation persists the changed
/// document record and re-persists the [`ConfigSnapshot`] before
/// returning. All writes funnel through a single choke point so the
/// ordering discipline (index update, log append, document persist,
/// snapshot persist) is uniform.
///
/// # Concurrency
///
/// One logical writer per instance; operations are synchronous and
/// serialized by the caller. Cross-replica concurrency is handled by the
/// optimistic revision checks and the transaction log's generations, not
/// by locking at this layer.
///
/// # Example
///
/// ```rust
/// use replidb_core::{Document, ObjectStoreDatabase};
/// use replidb_store::MemoryStore;
/// use serde_json::json;
///
/// let mut db = ObjectStoreDatabase::open(MemoryStore::new(), Some("replica-a")).unwrap();
/// let mut doc = Document::new("doc-1", json!({"x": 1}));
/// let rev = db.put_doc(&mut doc).unwrap();
/// let fetched = db.get_doc("doc-1", false).unwrap();
/// assert_eq!(fetched.rev(), &rev);
/// ```
pub struct ObjectStoreDatabase<S: ObjectStore> {
    store: S,
    state: ReplicaState,
}

impl<S: ObjectStore> ObjectStoreDatabase<S> {
    /// Opens a database over the given store.
    ///
    /// If the store holds no config snapshot, one is initialized with the
    /// supplied replica uid (or a generated one). Otherwise the snapshot
    /// is fetched, every stored document record is loaded, and indexes
    /// are rebuilt, so the instance converges to the store's last
    /// persisted state before serving any operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or a stored record is
    /// malformed.
    pub fn open(store: S, replica_uid: Option<&str>) -> DbResult<Self> {
        let mut db = match store.get(CONFIG_DOC_ID)? {
            None => {
                let uid = replica_uid
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
                let mut db = Self {
                    store,
                    state: ReplicaState::new(uid),
                };
                db.store_config_data()?;
                debug!(replica_uid = db.state.replica_uid(), "initialized database");
                db
            }
            Some(bytes) => {
                let snapshot = ConfigSnapshot::decode(&bytes)?;
                let db = Self {
                    store,
                    state: ReplicaState::from_snapshot(snapshot),
                };
                debug!(
                    replica_uid = db.state.replica_uid(),
                    generation = db.state.log().generation(),
                    "opened existing database"
                );
                db
            }
        };
        db.load_documents()?;
        Ok(db)
    }

    /// Returns this replica's uid.
    #[must_use]
    pub fn replica_uid(&self) -> &str {
        self.state.replica_uid()
    }

    /// Returns the current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.log().generation()
    }

    /// Returns the current generation and its transaction id.
    #[must_use]
    pub fn generation_and_transaction_id(&self) -> (u64, String) {
        self.state.log().generation_and_transaction_id()
    }

    /// Returns the definitions of all registered indexes.
    #[must_use]
    pub fn index_definitions(&self) -> std::collections::BTreeMap<String, Vec<String>> {
        self.state.indexes().definitions()
    }

    /// Returns a reference to the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the database and returns the backing store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Stores a new document or a new version of an existing one.
    ///
    /// The caller's revision must match the stored revision (a new
    /// document must carry the empty revision); a fresh revision is
    /// allocated, written back into `doc`, and returned.
    ///
    /// # Errors
    ///
    /// - [`DbError::InvalidDocId`] on an unusable id
    /// - [`DbError::ConflictedDoc`] while unresolved conflicts exist
    /// - [`DbError::RevisionConflict`] on a revision mismatch
    pub fn put_doc(&mut self, doc: &mut Document) -> DbResult<Revision> {
        validate_doc_id(doc.doc_id())?;

        let old = self.state.doc(doc.doc_id()).cloned();
        match &old {
            Some(cur) => {
                if self.state.has_conflicts(doc.doc_id()) {
                    return Err(DbError::conflicted_doc(doc.doc_id()));
                }
                if doc.rev() != cur.rev() {
                    return Err(DbError::revision_conflict(
                        doc.doc_id(),
                        cur.rev().to_string(),
                        doc.rev().to_string(),
                    ));
                }
            }
            None => {
                if !doc.rev().is_empty() {
                    return Err(DbError::revision_conflict(
                        doc.doc_id(),
                        "",
                        doc.rev().to_string(),
                    ));
                }
            }
        }

        let mut new_rev = old.as_ref().map(|d| d.rev().clone()).unwrap_or_default();
        new_rev.increment(self.state.replica_uid());
        doc.set_rev(new_rev.clone());

        self.put_and_update_indexes(old.as_ref(), doc)?;
        self.state.insert_doc(doc.clone());
        debug!(doc_id = doc.doc_id(), rev = %new_rev, "document stored");
        Ok(new_rev)
    }

    /// Marks a document as deleted.
    ///
    /// The document keeps its id and revision history as a tombstone
    /// carrying the newly allocated revision, which is written back into
    /// `doc` and returned.
    ///
    /// # Errors
    ///
    /// - [`DbError::DocumentDoesNotExist`] if no stored version exists
    /// - [`DbError::RevisionConflict`] if `doc.rev()` does not match the
    ///   stored revision
    /// - [`DbError::DocumentAlreadyDeleted`] on a tombstone
    /// - [`DbError::ConflictedDoc`] while unresolved conflicts exist
    pub fn delete_doc(&mut self, doc: &mut Document) -> DbResult<Revision> {
        let Some(old) = self.state.doc(doc.doc_id()).cloned() else {
            return Err(DbError::document_does_not_exist(doc.doc_id()));
        };
        if doc.rev() != old.rev() {
            return Err(DbError::revision_conflict(
                doc.doc_id(),
                old.rev().to_string(),
                doc.rev().to_string(),
            ));
        }
        if old.is_tombstone() {
            return Err(DbError::document_already_deleted(doc.doc_id()));
        }
        if self.state.has_conflicts(doc.doc_id()) {
            return Err(DbError::conflicted_doc(doc.doc_id()));
        }

        let mut new_rev = old.rev().clone();
        new_rev.increment(self.state.replica_uid());
        doc.set_rev(new_rev.clone());
        doc.make_tombstone();

        self.put_and_update_indexes(Some(&old), doc)?;
        self.state.insert_doc(doc.clone());
        debug!(doc_id = doc.doc_id(), rev = %new_rev, "document deleted");
        Ok(new_rev)
    }

    /// Fetches the current version of a document.
    ///
    /// Tombstones are returned only when `include_deleted` is set. The
    /// returned document reports whether unresolved conflicts exist.
    #[must_use]
    pub fn get_doc(&self, doc_id: &str, include_deleted: bool) -> Option<Document> {
        let doc = self.state.doc(doc_id)?;
        if doc.is_tombstone() && !include_deleted {
            return None;
        }
        let mut doc = doc.clone();
        doc.set_has_conflicts(self.state.has_conflicts(doc_id));
        Some(doc)
    }

    /// Returns all versions of a conflicted document, current first.
    ///
    /// Returns an empty list for documents without conflicts.
    #[must_use]
    pub fn get_doc_conflicts(&self, doc_id: &str) -> Vec<Document> {
        let versions = self.state.conflicts_for(doc_id);
        if versions.is_empty() {
            return Vec::new();
        }
        let mut docs = Vec::with_capacity(versions.len() + 1);
        if let Some(cur) = self.state.doc(doc_id) {
            let mut cur = cur.clone();
            cur.set_has_conflicts(true);
            docs.push(cur);
        }
        for version in versions {
            docs.push(Document::with_rev(
                doc_id,
                version.rev.clone(),
                version.body.clone(),
            ));
        }
        docs
    }

    /// Returns the generation and all documents, ordered by doc id.
    ///
    /// Tombstones are included only when `include_deleted` is set.
    #[must_use]
    pub fn get_all_docs(&self, include_deleted: bool) -> (u64, Vec<Document>) {
        let docs = self
            .state
            .docs()
            .filter(|doc| include_deleted || !doc.is_tombstone())
            .map(|doc| {
                let mut doc = doc.clone();
                doc.set_has_conflicts(self.state.has_conflicts(doc.doc_id()));
                doc
            })
            .collect();
        (self.generation(), docs)
    }

    /// Creates a named index and backfills it from existing documents.
    ///
    /// Re-creating an index with identical expressions is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::IndexDefinitionMismatch`] if the name is taken
    /// with different expressions.
    pub fn create_index(&mut self, name: &str, expressions: &[&str]) -> DbResult<()> {
        let expressions: Vec<String> = expressions.iter().map(|e| (*e).to_string()).collect();

        if let Some(existing) = self.state.indexes().get(name) {
            if existing.expressions() == expressions.as_slice() {
                return Ok(());
            }
            return Err(DbError::IndexDefinitionMismatch { name: name.into() });
        }

        let mut index = Index::new(name, expressions);
        for doc in self.state.docs() {
            if let Some(body) = doc.body() {
                index.add(doc.doc_id(), body);
            }
        }
        self.state.indexes_mut().insert(index);
        self.store_config_data()?;
        debug!(name, "index created");
        Ok(())
    }

    /// Removes a named index.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::IndexDoesNotExist`] for an unknown name.
    pub fn delete_index(&mut self, name: &str) -> DbResult<()> {
        if self.state.indexes_mut().remove(name).is_none() {
            return Err(DbError::index_does_not_exist(name));
        }
        self.store_config_data()?;
        debug!(name, "index deleted");
        Ok(())
    }

    /// Returns the live documents whose indexed fields equal `values`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::IndexDoesNotExist`] for an unknown name.
    pub fn get_from_index(&self, name: &str, values: &[&str]) -> DbResult<Vec<Document>> {
        let index = self
            .state
            .indexes()
            .get(name)
            .ok_or_else(|| DbError::index_does_not_exist(name))?;
        Ok(index
            .lookup(values)
            .iter()
            .filter_map(|doc_id| self.get_doc(doc_id, false))
            .collect())
    }

    /// Replaces this replica's uid and persists the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn set_replica_uid(&mut self, replica_uid: &str) -> DbResult<()> {
        self.state.set_replica_uid(replica_uid);
        self.store_config_data()
    }

    /// Records another replica's position and persists the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidGeneration`] if `generation` is lower
    /// than the generation already recorded for that replica.
    pub fn set_replica_gen_and_trans_id(
        &mut self,
        other_replica_uid: &str,
        generation: u64,
        transaction_id: &str,
    ) -> DbResult<()> {
        let recorded = self.state.peer(other_replica_uid).generation;
        if generation < recorded {
            return Err(DbError::InvalidGeneration {
                replica_uid: other_replica_uid.into(),
                recorded,
                requested: generation,
            });
        }
        self.state
            .record_peer(other_replica_uid, generation, transaction_id);
        self.store_config_data()
    }

    /// Returns the recorded position of another replica, zero if unknown.
    #[must_use]
    pub fn replica_gen_and_trans_id(&self, other_replica_uid: &str) -> (u64, String) {
        let peer = self.state.peer(other_replica_uid);
        (peer.generation, peer.transaction_id)
    }

    /// Reports what changed after `since_generation`.
    ///
    /// Returns the current generation, its transaction id, and the
    /// latest change per document, ordered by generation.
    #[must_use]
    pub fn whats_changed(&self, since_generation: u64) -> (u64, String, Vec<Change>) {
        let (generation, transaction_id) = self.state.log().generation_and_transaction_id();
        (
            generation,
            transaction_id,
            self.state.log().changes_since(since_generation),
        )
    }

    /// Applies a document version received from another replica.
    ///
    /// Compares the incoming revision against the stored one: equal
    /// revisions converge, a dominating incoming revision is inserted
    /// (pruning any conflict versions it supersedes), a dominated one is
    /// ignored, and concurrent revisions conflict. With `save_conflict`
    /// set, a conflicting incoming version becomes current and the prior
    /// current version joins the conflict set, to be resolved later.
    ///
    /// When the version was applied (or already held), the source
    /// replica's position is recorded. Returns the outcome and this
    /// replica's resulting generation.
    ///
    /// # Errors
    ///
    /// - [`DbError::InvalidDocId`] / [`DbError::InvalidRevision`] on a
    ///   malformed incoming document
    /// - [`DbError::InvalidGeneration`] if the source's generation moves
    ///   backwards
    pub fn put_doc_if_newer(
        &mut self,
        doc: Document,
        save_conflict: bool,
        replica_uid: &str,
        replica_gen: u64,
        replica_trans_id: &str,
    ) -> DbResult<(DocState, u64)> {
        validate_doc_id(doc.doc_id())?;
        if doc.rev().is_empty() {
            return Err(DbError::invalid_revision(""));
        }
        if !replica_uid.is_empty() {
            let recorded = self.state.peer(replica_uid).generation;
            if replica_gen < recorded {
                return Err(DbError::InvalidGeneration {
                    replica_uid: replica_uid.into(),
                    recorded,
                    requested: replica_gen,
                });
            }
        }

        let cur = self.state.doc(doc.doc_id()).cloned();
        let outcome = match &cur {
            None => {
                self.apply_incoming(None, doc, replica_uid, replica_gen, replica_trans_id)?;
                DocState::Inserted
            }
            Some(cur_doc) if cur_doc.rev() == doc.rev() => {
                self.record_source(replica_uid, replica_gen, replica_trans_id)?;
                DocState::Converged
            }
            Some(cur_doc) if doc.rev().supersedes(cur_doc.rev()) => {
                let remaining: Vec<ConflictVersion> = self
                    .state
                    .conflicts_for(doc.doc_id())
                    .iter()
                    .filter(|v| !doc.rev().supersedes(&v.rev) && &v.rev != doc.rev())
                    .cloned()
                    .collect();
                self.state.set_conflicts(doc.doc_id(), remaining);
                self.apply_incoming(
                    Some(cur_doc.clone()),
                    doc,
                    replica_uid,
                    replica_gen,
                    replica_trans_id,
                )?;
                DocState::Inserted
            }
            Some(cur_doc) if cur_doc.rev().supersedes(doc.rev()) => DocState::Superseded,
            Some(cur_doc) => {
                if save_conflict {
                    self.state.add_conflict(
                        doc.doc_id(),
                        ConflictVersion {
                            rev: cur_doc.rev().clone(),
                            body: cur_doc.body().cloned(),
                        },
                    );
                    self.apply_incoming(
                        Some(cur_doc.clone()),
                        doc,
                        replica_uid,
                        replica_gen,
                        replica_trans_id,
                    )?;
                }
                DocState::Conflicted
            }
        };

        trace!(?outcome, source = replica_uid, "incoming document processed");
        Ok((outcome, self.generation()))
    }

    /// Resolves a document's conflicts.
    ///
    /// `doc` carries the content chosen by the caller; `conflicted_revs`
    /// names the branches it supersedes. The new revision merges all
    /// superseded clocks, so it dominates every listed branch. If the
    /// current revision is among those superseded, the resolved content
    /// becomes current; otherwise the current version stays and the
    /// resolved content is parked in the conflict set.
    ///
    /// Returns the resolved revision and whether conflicts remain.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DocumentDoesNotExist`] if no stored version
    /// exists.
    pub fn resolve_doc(
        &mut self,
        doc: &mut Document,
        conflicted_revs: &[Revision],
    ) -> DbResult<(Revision, bool)> {
        let Some(cur) = self.state.doc(doc.doc_id()).cloned() else {
            return Err(DbError::document_does_not_exist(doc.doc_id()));
        };

        let mut new_rev = conflicted_revs
            .iter()
            .fold(Revision::new(), |acc, rev| acc.merge(rev));
        new_rev.increment(self.state.replica_uid());
        doc.set_rev(new_rev.clone());

        let remaining: Vec<ConflictVersion> = self
            .state
            .conflicts_for(doc.doc_id())
            .iter()
            .filter(|v| !conflicted_revs.contains(&v.rev))
            .cloned()
            .collect();

        if conflicted_revs.contains(cur.rev()) {
            self.state.set_conflicts(doc.doc_id(), remaining);
            self.put_and_update_indexes(Some(&cur), doc)?;
            self.state.insert_doc(doc.clone());
            doc.set_has_conflicts(self.state.has_conflicts(doc.doc_id()));
        } else {
            // The current version was not superseded: park the resolved
            // content as a conflict version of its own.
            let mut versions = remaining;
            versions.insert(
                0,
                ConflictVersion {
                    rev: new_rev.clone(),
                    body: doc.body().cloned(),
                },
            );
            self.state.set_conflicts(doc.doc_id(), versions);
            self.store_config_data()?;
            doc.set_has_conflicts(true);
        }

        debug!(doc_id = doc.doc_id(), rev = %new_rev, "conflicts resolved");
        Ok((new_rev, doc.has_conflicts()))
    }

    /// The single choke point for all document writes.
    ///
    /// Ordering: index update, transaction-log append, document record
    /// persist, config snapshot persist. The store steps are idempotent,
    /// so an at-least-once retry by a concrete backend is safe.
    fn put_and_update_indexes(
        &mut self,
        old_doc: Option<&Document>,
        new_doc: &Document,
    ) -> DbResult<()> {
        let doc_id = new_doc.doc_id();

        if let Some(old) = old_doc {
            if let Some(body) = old.body() {
                self.state.indexes_mut().remove_doc(doc_id, body);
            }
        }
        if let Some(body) = new_doc.body() {
            self.state.indexes_mut().add_doc(doc_id, body);
        }

        let transaction_id = allocate_transaction_id();
        self.state.log_mut().append(doc_id, transaction_id.clone());

        self.store.put(doc_id, &serde_json::to_vec(new_doc)?)?;
        self.store_config_data()?;

        trace!(doc_id, transaction_id, "mutation applied");
        Ok(())
    }

    fn apply_incoming(
        &mut self,
        old_doc: Option<Document>,
        doc: Document,
        replica_uid: &str,
        replica_gen: u64,
        replica_trans_id: &str,
    ) -> DbResult<()> {
        if !replica_uid.is_empty() {
            self.state
                .record_peer(replica_uid, replica_gen, replica_trans_id);
        }
        self.put_and_update_indexes(old_doc.as_ref(), &doc)?;
        self.state.insert_doc(doc);
        Ok(())
    }

    fn record_source(
        &mut self,
        replica_uid: &str,
        replica_gen: u64,
        replica_trans_id: &str,
    ) -> DbResult<()> {
        if replica_uid.is_empty() {
            return Ok(());
        }
        self.state
            .record_peer(replica_uid, replica_gen, replica_trans_id);
        self.store_config_data()
    }

    /// Persists the config snapshot to the object store.
    fn store_config_data(&mut self) -> DbResult<()> {
        let snapshot = self.state.snapshot();
        self.store.put(CONFIG_DOC_ID, &snapshot.encode()?)?;
        Ok(())
    }

    fn load_documents(&mut self) -> DbResult<()> {
        for key in self.store.keys()? {
            if key.starts_with(RESERVED_PREFIX) {
                continue;
            }
            let Some(bytes) = self.store.get(&key)? else {
                continue;
            };
            let doc: Document = serde_json::from_slice(&bytes)?;
            if let Some(body) = doc.body() {
                self.state.indexes_mut().add_doc(doc.doc_id(), body);
            }
            self.state.insert_doc(doc);
        }
        Ok(())
    }
}

impl<S: ObjectStore> std::fmt::Debug for ObjectStoreDatabase<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreDatabase")
            .field("replica_uid", &self.replica_uid())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
