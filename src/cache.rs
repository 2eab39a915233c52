//! Memo table for simplification results.
//!
//! Every memoized node (`NodeKey`) maps to its last classification together
//! with the versions of the meta-variables read while computing it. An entry
//! is valid only while all observed versions are still current; binding or
//! unbinding any of them bumps the version and the next lookup recomputes.
//!
//! # References
//! - *Version-vector invalidation*: [Salsa: incremental recomputation, red-green algorithm]
//! - *Self-adjusting computation*: [Acar, "Self-Adjusting Computation", CMU 2005]

use crate::core::{MetaId, NodeKey};
use crate::domain::Term;
use crate::normalize::Simplification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Memoized classification of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoEntry {
    /// The cached classification.
    pub value: Simplification<Term>,
    /// Meta-variables read during computation and their versions at the time.
    pub observed_versions: BTreeMap<MetaId, u64>,
    /// Number of times this node was computed.
    pub compute_count: u64,
}

impl MemoEntry {
    /// Returns `true` if every observed version is still current.
    pub fn is_valid(&self, current_version: impl Fn(MetaId) -> u64) -> bool {
        self.observed_versions
            .iter()
            .all(|(id, version)| current_version(*id) == *version)
    }
}

/// Storage of memo entries keyed by node.
#[derive(Debug, Clone, Default)]
pub struct MemoTable {
    entries: BTreeMap<NodeKey, MemoEntry>,
}

impl MemoTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry of `key`, valid or not.
    pub fn get(&self, key: NodeKey) -> Option<&MemoEntry> {
        self.entries.get(&key)
    }

    /// Stores a freshly computed classification, keeping the compute count.
    pub fn insert(
        &mut self,
        key: NodeKey,
        value: Simplification<Term>,
        observed_versions: BTreeMap<MetaId, u64>,
    ) {
        let compute_count = self.entries.get(&key).map_or(0, |e| e.compute_count) + 1;
        self.entries.insert(
            key,
            MemoEntry {
                value,
                observed_versions,
                compute_count,
            },
        );
    }

    /// Removes the entry of `key`. Returns `true` if one existed.
    pub fn remove(&mut self, key: NodeKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Why a memo entry was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// An observed meta-variable changed version.
    VersionMismatch,
    /// The snapshot that created the entry was undone.
    SnapshotUndone,
}

/// Engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Simplifications served from the memo table.
    pub memo_hits: u64,
    /// Simplifications that had to be computed.
    pub memo_misses: u64,
    /// Memo entries discarded.
    pub invalidations: u64,
    /// Breakdown of invalidations.
    pub invalidation_reasons: BTreeMap<InvalidationReason, u64>,
    /// Meta-variables bound.
    pub bindings: u64,
    /// Mutations reverted by snapshot undo.
    pub undone_mutations: u64,
}

impl Metrics {
    /// Records a memo hit.
    pub fn record_hit(&mut self) {
        self.memo_hits += 1;
    }

    /// Records a memo miss.
    pub fn record_miss(&mut self) {
        self.memo_misses += 1;
    }

    /// Records a discarded memo entry.
    pub fn record_invalidation(&mut self, reason: InvalidationReason) {
        self.invalidations += 1;
        *self.invalidation_reasons.entry(reason).or_insert(0) += 1;
    }

    /// Records a binding.
    pub fn record_binding(&mut self) {
        self.bindings += 1;
    }

    /// Records `count` reverted mutations.
    pub fn record_undo(&mut self, count: usize) {
        self.undone_mutations += count as u64;
    }

    /// Memo hit rate in `[0, 1]`, or `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.memo_hits + self.memo_misses;
        if total == 0 {
            None
        } else {
            Some(self.memo_hits as f64 / total as f64)
        }
    }
}
