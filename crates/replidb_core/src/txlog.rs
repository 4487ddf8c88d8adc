//! Append-only transaction log.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One entry in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The mutated document.
    pub doc_id: String,
    /// The transaction id allocated for the mutation.
    pub transaction_id: String,
}

/// A change reported by [`TransactionLog::changes_since`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The changed document.
    pub doc_id: String,
    /// The generation at which the latest change happened.
    pub generation: u64,
    /// The transaction id of the latest change.
    pub transaction_id: String,
}

/// The ordered record of every mutation applied by this replica.
///
/// One entry is appended per successful mutation and entries are never
/// removed. The **generation** of the database is the length of the log;
/// peers use generations to ask "what changed since I last looked".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionLog {
    entries: Vec<LogEntry>,
}

impl TransactionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from persisted entries.
    #[must_use]
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    /// Appends a mutation record.
    pub fn append(&mut self, doc_id: impl Into<String>, transaction_id: impl Into<String>) {
        self.entries.push(LogEntry {
            doc_id: doc_id.into(),
            transaction_id: transaction_id.into(),
        });
    }

    /// Returns the current generation (number of mutations applied).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Returns the transaction id of the latest mutation.
    ///
    /// The empty string denotes generation zero, before any mutation.
    #[must_use]
    pub fn last_transaction_id(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.transaction_id.as_str())
            .unwrap_or("")
    }

    /// Returns the current generation together with its transaction id.
    #[must_use]
    pub fn generation_and_transaction_id(&self) -> (u64, String) {
        (self.generation(), self.last_transaction_id().to_string())
    }

    /// Returns each document changed after `generation`, with the position
    /// of its latest change, ordered by generation.
    #[must_use]
    pub fn changes_since(&self, generation: u64) -> Vec<Change> {
        let mut latest: HashMap<&str, (u64, &str)> = HashMap::new();
        for (offset, entry) in self.entries.iter().enumerate().skip(generation as usize) {
            latest.insert(
                entry.doc_id.as_str(),
                (offset as u64 + 1, entry.transaction_id.as_str()),
            );
        }

        let mut changes: Vec<Change> = latest
            .into_iter()
            .map(|(doc_id, (generation, transaction_id))| Change {
                doc_id: doc_id.to_string(),
                generation,
                transaction_id: transaction_id.to_string(),
            })
            .collect();
        changes.sort_by_key(|c| c.generation);
        changes
    }

    /// Returns all entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Returns true if no mutation has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Allocates a fresh opaque transaction id.
#[must_use]
pub fn allocate_transaction_id() -> String {
    format!("T-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log() {
        let log = TransactionLog::new();
        assert_eq!(log.generation(), 0);
        assert_eq!(log.last_transaction_id(), "");
        assert!(log.changes_since(0).is_empty());
    }

    #[test]
    fn append_advances_generation() {
        let mut log = TransactionLog::new();

        log.append("a", "T-1");
        log.append("b", "T-2");

        assert_eq!(log.generation(), 2);
        assert_eq!(log.last_transaction_id(), "T-2");
        assert_eq!(log.generation_and_transaction_id(), (2, "T-2".to_string()));
    }

    #[test]
    fn changes_since_reports_latest_per_doc() {
        let mut log = TransactionLog::new();
        log.append("a", "T-1");
        log.append("b", "T-2");
        log.append("a", "T-3");

        let changes = log.changes_since(0);
        assert_eq!(changes.len(), 2);
        // "b" changed at generation 2, "a" last changed at generation 3
        assert_eq!(changes[0].doc_id, "b");
        assert_eq!(changes[0].generation, 2);
        assert_eq!(changes[1].doc_id, "a");
        assert_eq!(changes[1].generation, 3);
        assert_eq!(changes[1].transaction_id, "T-3");
    }

    #[test]
    fn changes_since_skips_old_generations() {
        let mut log = TransactionLog::new();
        log.append("a", "T-1");
        log.append("b", "T-2");

        let changes = log.changes_since(1);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].doc_id, "b");

        assert!(log.changes_since(2).is_empty());
    }

    #[test]
    fn from_entries_restores_position() {
        let entries = vec![
            LogEntry {
                doc_id: "a".into(),
                transaction_id: "T-1".into(),
            },
            LogEntry {
                doc_id: "b".into(),
                transaction_id: "T-2".into(),
            },
        ];

        let log = TransactionLog::from_entries(entries);
        assert_eq!(log.generation(), 2);
        assert_eq!(log.last_transaction_id(), "T-2");
    }

    #[test]
    fn allocated_ids_are_unique_and_prefixed() {
        let a = allocate_transaction_id();
        let b = allocate_transaction_id();
        assert!(a.starts_with("T-"));
        assert_ne!(a, b);
    }
}
