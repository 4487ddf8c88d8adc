//! Vector-clock document revisions.
//!
//! A revision records, per replica, how many times that replica has
//! mutated the document's lineage. Two revisions are comparable when one
//! dominates the other; concurrent revisions from different replicas are
//! the source of sync conflicts.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A document revision.
///
/// Revisions are vector clocks keyed by replica uid, rendered as
/// `replica:counter|replica:counter` with replica uids in sorted order.
/// The empty revision (no counters) denotes a document that has never
/// been written.
///
/// # Invariants
///
/// - Counters are allocated once per mutation and only ever increase
/// - A revision allocated from a prior revision supersedes it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Revision {
    counters: BTreeMap<String, u64>,
}

impl Revision {
    /// Creates the empty revision.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a revision from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRevision`] on malformed input: missing
    /// separators, unparsable or zero counters, or duplicate replica uids.
    pub fn parse(rev: &str) -> DbResult<Self> {
        if rev.is_empty() {
            return Ok(Self::new());
        }

        let mut counters = BTreeMap::new();
        for part in rev.split('|') {
            let Some((replica, count)) = part.rsplit_once(':') else {
                return Err(DbError::invalid_revision(rev));
            };
            let count: u64 = count
                .parse()
                .map_err(|_| DbError::invalid_revision(rev))?;
            if replica.is_empty() || count == 0 {
                return Err(DbError::invalid_revision(rev));
            }
            if counters.insert(replica.to_string(), count).is_some() {
                return Err(DbError::invalid_revision(rev));
            }
        }
        Ok(Self { counters })
    }

    /// Returns true if this is the empty (never-written) revision.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns the counter recorded for a replica, zero if absent.
    #[must_use]
    pub fn counter(&self, replica_uid: &str) -> u64 {
        self.counters.get(replica_uid).copied().unwrap_or(0)
    }

    /// Bumps the counter for `replica_uid`.
    ///
    /// This is the revision allocator: the database calls it exactly once
    /// per mutation, so the result supersedes the prior revision.
    pub fn increment(&mut self, replica_uid: &str) {
        *self.counters.entry(replica_uid.to_string()).or_insert(0) += 1;
    }

    /// Returns true if this revision strictly dominates `other`.
    ///
    /// Every counter in `other` must be present with an equal or greater
    /// value here, and the two revisions must differ.
    #[must_use]
    pub fn supersedes(&self, other: &Revision) -> bool {
        if self == other {
            return false;
        }
        other
            .counters
            .iter()
            .all(|(replica, &count)| self.counter(replica) >= count)
    }

    /// Returns true if neither revision supersedes the other.
    #[must_use]
    pub fn concurrent_with(&self, other: &Revision) -> bool {
        self != other && !self.supersedes(other) && !other.supersedes(self)
    }

    /// Returns the pointwise maximum of two revisions.
    ///
    /// Used by conflict resolution to build a revision that supersedes
    /// all merged branches.
    #[must_use]
    pub fn merge(&self, other: &Revision) -> Revision {
        let mut counters = self.counters.clone();
        for (replica, &count) in &other.counters {
            let entry = counters.entry(replica.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
        Revision { counters }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (replica, count) in &self.counters {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{replica}:{count}")?;
            first = false;
        }
        Ok(())
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.to_string()
    }
}

impl TryFrom<String> for Revision {
    type Error = DbError;

    fn try_from(rev: String) -> DbResult<Self> {
        Self::parse(&rev)
    }
}
