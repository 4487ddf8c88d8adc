//! Document model.

use crate::error::{DbError, DbResult};
use crate::revision::Revision;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of document ids reserved for internal records.
pub const RESERVED_PREFIX: &str = "u1db_";

/// A JSON document tracked by the database.
///
/// A document is identified by its `doc_id`, carries a vector-clock
/// [`Revision`], and holds an optional JSON body. A document without a
/// body is a **tombstone**: it records a deletion while keeping the
/// id and revision history alive for sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    doc_id: String,
    rev: Revision,
    body: Option<Value>,
    /// True when unresolved conflict versions exist for this document.
    ///
    /// Derived by the database when the document is fetched; not part of
    /// the stored record.
    #[serde(skip)]
    has_conflicts: bool,
}

impl Document {
    /// Creates a new document with no revision (never written).
    #[must_use]
    pub fn new(doc_id: impl Into<String>, body: Value) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev: Revision::new(),
            body: Some(body),
            has_conflicts: false,
        }
    }

    /// Creates a document with an explicit revision.
    ///
    /// Used when materializing documents received from another replica.
    #[must_use]
    pub fn with_rev(doc_id: impl Into<String>, rev: Revision, body: Option<Value>) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev,
            body,
            has_conflicts: false,
        }
    }

    /// Returns the document id.
    #[must_use]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Returns the current revision.
    #[must_use]
    pub fn rev(&self) -> &Revision {
        &self.rev
    }

    /// Replaces the revision.
    pub fn set_rev(&mut self, rev: Revision) {
        self.rev = rev;
    }

    /// Returns the JSON body, `None` for tombstones.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Replaces the JSON body.
    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Returns true if this document is a deletion marker.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.body.is_none()
    }

    /// Turns this document into a tombstone, dropping its body.
    pub fn make_tombstone(&mut self) {
        self.body = None;
    }

    /// Returns true if unresolved conflict versions exist.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        self.has_conflicts
    }

    pub(crate) fn set_has_conflicts(&mut self, has_conflicts: bool) {
        self.has_conflicts = has_conflicts;
    }
}

/// Checks that a document id is usable for user data.
///
/// Ids must be non-empty, free of whitespace and control characters, and
/// must not start with the reserved `u1db_` prefix.
///
/// # Errors
///
/// Returns [`DbError::InvalidDocId`] when the id violates any rule.
pub fn validate_doc_id(doc_id: &str) -> DbResult<()> {
    if doc_id.is_empty()
        || doc_id.starts_with(RESERVED_PREFIX)
        || doc_id.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(DbError::invalid_doc_id(doc_id));
    }
    Ok(())
}
