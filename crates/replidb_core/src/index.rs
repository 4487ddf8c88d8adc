//! Named secondary indexes over document bodies.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A named equality index over JSON document bodies.
///
/// An index is defined by an ordered list of **expressions**: dotted field
/// paths into the body (`"name"`, `"address.city"`). A document
/// contributes one entry to the index when every expression resolves to a
/// scalar value in its body; documents missing any indexed field are
/// simply not indexed.
///
/// # Invariants
///
/// - A live document's indexed fields appear in the index exactly once
/// - Tombstones contribute nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    expressions: Vec<String>,
    entries: HashMap<Vec<String>, BTreeSet<String>>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new(name: impl Into<String>, expressions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            expressions,
            entries: HashMap::new(),
        }
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the index expressions.
    #[must_use]
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    /// Adds a document's field contributions.
    ///
    /// Returns true if the document was indexed (all expressions resolved).
    pub fn add(&mut self, doc_id: &str, body: &Value) -> bool {
        match self.key_for(body) {
            Some(key) => {
                self.entries.entry(key).or_default().insert(doc_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Removes a document's field contributions.
    ///
    /// Returns true if an entry was removed.
    pub fn remove(&mut self, doc_id: &str, body: &Value) -> bool {
        let Some(key) = self.key_for(body) else {
            return false;
        };
        if let Some(ids) = self.entries.get_mut(&key) {
            let removed = ids.remove(doc_id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
            removed
        } else {
            false
        }
    }

    /// Looks up the doc ids matching the given field values, sorted.
    #[must_use]
    pub fn lookup(&self, values: &[&str]) -> Vec<String> {
        let key: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        match self.entries.get(&key) {
            Some(ids) => ids.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Returns the number of distinct key tuples present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no document is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key_for(&self, body: &Value) -> Option<Vec<String>> {
        self.expressions
            .iter()
            .map(|expr| extract_field(body, expr))
            .collect()
    }
}

/// Resolves a dotted field path to its scalar value, stringified.
fn extract_field(body: &Value, expression: &str) -> Option<String> {
    let mut current = body;
    for segment in expression.split('.') {
        current = current.get(segment)?;
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The set of indexes maintained by a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    indexes: HashMap<String, Index>,
}

impl IndexSet {
    /// Creates an empty index set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Registers an index, replacing any prior index of the same name.
    pub fn insert(&mut self, index: Index) {
        self.indexes.insert(index.name().to_string(), index);
    }

    /// Removes the index registered under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Index> {
        self.indexes.remove(name)
    }

    /// Adds a document's contributions to every index.
    pub fn add_doc(&mut self, doc_id: &str, body: &Value) {
        for index in self.indexes.values_mut() {
            index.add(doc_id, body);
        }
    }

    /// Removes a document's contributions from every index.
    pub fn remove_doc(&mut self, doc_id: &str, body: &Value) {
        for index in self.indexes.values_mut() {
            index.remove(doc_id, body);
        }
    }

    /// Returns the definitions (name to expressions) of all indexes.
    #[must_use]
    pub fn definitions(&self) -> BTreeMap<String, Vec<String>> {
        self.indexes
            .iter()
            .map(|(name, index)| (name.clone(), index.expressions().to_vec()))
            .collect()
    }

    /// Returns the number of registered indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns true if no index is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
