//! Error types for ReplidB core.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in ReplidB database operations.
///
/// All errors are raised synchronously to the immediate caller. This layer
/// performs no retries; retry policy on transient store failures belongs to
/// the concrete [`replidb_store::ObjectStore`] implementation.
#[derive(Debug, Error)]
pub enum DbError {
    /// Object-store backend error.
    #[error("object store error: {0}")]
    Store(#[from] replidb_store::StoreError),

    /// JSON codec error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The target document does not exist.
    #[error("document does not exist: {doc_id}")]
    DocumentDoesNotExist {
        /// The document id that was not found.
        doc_id: String,
    },

    /// The caller's revision does not match the stored revision.
    #[error("revision conflict on document {doc_id}: stored {stored:?}, got {given:?}")]
    RevisionConflict {
        /// The document being mutated.
        doc_id: String,
        /// The revision currently stored.
        stored: String,
        /// The revision supplied by the caller.
        given: String,
    },

    /// The document is already a tombstone.
    #[error("document already deleted: {doc_id}")]
    DocumentAlreadyDeleted {
        /// The document id.
        doc_id: String,
    },

    /// The document has unresolved conflicts.
    #[error("document has unresolved conflicts: {doc_id}")]
    ConflictedDoc {
        /// The document id.
        doc_id: String,
    },

    /// The document id is not valid.
    #[error("invalid document id: {doc_id:?}")]
    InvalidDocId {
        /// The offending id.
        doc_id: String,
    },

    /// A revision string could not be parsed.
    #[error("invalid revision: {rev:?}")]
    InvalidRevision {
        /// The offending revision string.
        rev: String,
    },

    /// The named index does not exist.
    #[error("index does not exist: {name}")]
    IndexDoesNotExist {
        /// The index name.
        name: String,
    },

    /// An index already exists under this name with different expressions.
    #[error("index {name} already exists with different expressions")]
    IndexDefinitionMismatch {
        /// The index name.
        name: String,
    },

    /// A replica generation would move backwards.
    #[error(
        "invalid generation for replica {replica_uid}: recorded {recorded}, got {requested}"
    )]
    InvalidGeneration {
        /// The replica whose state was being recorded.
        replica_uid: String,
        /// The generation already recorded.
        recorded: u64,
        /// The generation that was requested.
        requested: u64,
    },
}

impl DbError {
    /// Creates a document-does-not-exist error.
    pub fn document_does_not_exist(doc_id: impl Into<String>) -> Self {
        Self::DocumentDoesNotExist {
            doc_id: doc_id.into(),
        }
    }

    /// Creates a revision-conflict error.
    pub fn revision_conflict(
        doc_id: impl Into<String>,
        stored: impl Into<String>,
        given: impl Into<String>,
    ) -> Self {
        Self::RevisionConflict {
            doc_id: doc_id.into(),
            stored: stored.into(),
            given: given.into(),
        }
    }

    /// Creates an already-deleted error.
    pub fn document_already_deleted(doc_id: impl Into<String>) -> Self {
        Self::DocumentAlreadyDeleted {
            doc_id: doc_id.into(),
        }
    }

    /// Creates a conflicted-document error.
    pub fn conflicted_doc(doc_id: impl Into<String>) -> Self {
        Self::ConflictedDoc {
            doc_id: doc_id.into(),
        }
    }

    /// Creates an invalid-doc-id error.
    pub fn invalid_doc_id(doc_id: impl Into<String>) -> Self {
        Self::InvalidDocId {
            doc_id: doc_id.into(),
        }
    }

    /// Creates an invalid-revision error.
    pub fn invalid_revision(rev: impl Into<String>) -> Self {
        Self::InvalidRevision { rev: rev.into() }
    }

    /// Creates an index-does-not-exist error.
    pub fn index_does_not_exist(name: impl Into<String>) -> Self {
        Self::IndexDoesNotExist { name: name.into() }
    }
}
