//! Ordered, first-wins record registry shared by every record kind.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use mikro_core::{ConfigIssue, RecordKind};

use crate::loader::LoadResult;

/// A named configuration record with load provenance.
pub trait Record {
    const KIND: RecordKind;

    fn name(&self) -> &str;

    fn source(&self) -> &Path;

    /// Load-order index within the record's directory.
    fn order(&self) -> usize;

    /// Normalize a name into a registry key. Exact match unless overridden.
    fn key_for(name: &str) -> String {
        name.to_string()
    }
}

/// Records of one kind, keyed by name, kept in load order.
///
/// A record whose key is already present is rejected with a conflict and the
/// earlier definition is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry<T> {
    records: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding exactly `record`.
    pub fn single(record: T) -> Self {
        let index = HashMap::from([(T::key_for(record.name()), 0)]);
        Self {
            records: vec![record],
            index,
        }
    }

    /// Build a registry from loaded fragments, returning every issue seen
    /// (parse failures first, then conflicts in load order).
    pub fn from_load<F>(
        loaded: LoadResult<F>,
        mut build: impl FnMut(F, &Path, usize) -> T,
    ) -> (Self, Vec<ConfigIssue>) {
        let mut registry = Self::new();
        let mut issues = loaded.issues;
        for fragment in loaded.fragments {
            let record = build(fragment.value, &fragment.source, fragment.order);
            if let Err(conflict) = registry.register(record) {
                issues.push(conflict);
            }
        }
        (registry, issues)
    }

    /// Add a record. A duplicate key is reported and the record discarded.
    pub fn register(&mut self, record: T) -> Result<(), ConfigIssue> {
        let key = T::key_for(record.name());
        if let Some(&existing) = self.index.get(&key) {
            let kept = &self.records[existing];
            warn!(
                kind = %T::KIND,
                name = record.name(),
                file = %record.source().display(),
                kept = %kept.source().display(),
                "duplicate record ignored"
            );
            return Err(ConfigIssue::conflict(
                T::KIND,
                record.name(),
                record.source(),
                kept.source(),
            ));
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index
            .get(&T::key_for(name))
            .and_then(|&i| self.records.get(i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&T::key_for(name))
    }

    /// The record with the smallest load-order index.
    pub fn first(&self) -> Option<&T> {
        self.records.iter().min_by_key(|r| r.order())
    }

    /// Records in load order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
