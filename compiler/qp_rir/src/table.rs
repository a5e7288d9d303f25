// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_data_structures::fingerprint::Fingerprint;
use qp_data_structures::index_map::{Index, IndexMap};
use rustc_hash::FxHashMap;

/// A fingerprint-deduplicated table: every entry appears exactly once even
/// if inserted many times, indexed in first-insertion order (spec §3.6.4,
/// §6.2 "index assignment is by fingerprint insertion order").
pub struct DedupTable<K: Index, V> {
    by_fingerprint: FxHashMap<Fingerprint, K>,
    entries: IndexMap<K, V>,
}

impl<K: Index, V> Default for DedupTable<K, V> {
    fn default() -> Self {
        Self {
            by_fingerprint: FxHashMap::default(),
            entries: IndexMap::new(),
        }
    }
}

impl<K: Index, V> DedupTable<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for `fingerprint` if present, otherwise
    /// inserts `value` under a freshly-allocated id.
    pub fn insert_or_reuse(&mut self, fingerprint: Fingerprint, value: V) -> K {
        if let Some(id) = self.by_fingerprint.get(&fingerprint) {
            return *id;
        }
        let id = self.entries.next_key();
        self.entries.insert(id, value);
        self.by_fingerprint.insert(fingerprint, id);
        id
    }

    #[must_use]
    pub fn get(&self, id: K) -> Option<&V> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order, i.e. fingerprint-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    qp_data_structures::index_type! {
        struct TestId(u32);
    }

    #[test]
    fn repeated_fingerprint_reuses_id() {
        let mut table: DedupTable<TestId, &'static str> = DedupTable::new();
        let a = table.insert_or_reuse(Fingerprint(1), "first");
        let b = table.insert_or_reuse(Fingerprint(1), "duplicate-not-stored");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(a), Some(&"first"));
    }

    #[test]
    fn distinct_fingerprints_get_distinct_ids() {
        let mut table: DedupTable<TestId, u32> = DedupTable::new();
        let a = table.insert_or_reuse(Fingerprint(1), 10);
        let b = table.insert_or_reuse(Fingerprint(2), 20);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }
}
