//! Arena storage for meta-variables.
//!
//! Provides `MetaArena`, contiguous storage for every meta-variable a
//! `Context` has created. A meta-variable normally lives as long as its
//! context, and undo only clears its binding. The one exception is a rule
//! preview, whose meta-variables never escape it: `truncate` drops them.
//!
//! # Determinism
//! - `MetaId` ordering is by slot index, which is allocation order.
//! - Display indices are assigned per symbol class in allocation order and
//!   only reused after `truncate`.
//! - Every write to a binding bumps the slot's version; memo entries compare
//!   versions to decide validity.

use crate::core::{MetaId, SymbolClass};
use crate::domain::Term;
use std::collections::BTreeMap;

/// Slot in the meta-variable arena.
#[derive(Debug, Clone, PartialEq)]
struct MetaSlot {
    class: SymbolClass,
    index: u32,
    binding: Option<Term>,
    version: u64,
}

/// Contiguous storage for meta-variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaArena {
    slots: Vec<MetaSlot>,
    /// Next display index per symbol class (indices start at 1).
    counters: BTreeMap<SymbolClass, u32>,
}

impl MetaArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh, unbound meta-variable of the given class.
    pub fn allocate(&mut self, class: SymbolClass) -> MetaId {
        let counter = self.counters.entry(class).or_insert(0);
        *counter += 1;
        let id = MetaId::new(self.slots.len() as u32);
        self.slots.push(MetaSlot {
            class,
            index: *counter,
            binding: None,
            version: 0,
        });
        id
    }

    /// Returns the binding of `id`, if bound.
    pub fn binding(&self, id: MetaId) -> Option<&Term> {
        self.slot(id).and_then(|slot| slot.binding.as_ref())
    }

    /// Returns the current version of `id` (0 for unknown ids).
    pub fn version(&self, id: MetaId) -> u64 {
        self.slot(id).map_or(0, |slot| slot.version)
    }

    /// Returns the symbol class of `id`.
    pub fn class(&self, id: MetaId) -> Option<SymbolClass> {
        self.slot(id).map(|slot| slot.class)
    }

    /// Returns the display label of `id`, e.g. `v3`.
    pub fn label(&self, id: MetaId) -> String {
        match self.slot(id) {
            Some(slot) => format!("{}{}", slot.class.symbol(), slot.index),
            None => format!("?{}", id.as_u32()),
        }
    }

    /// Replaces the binding of `id` and bumps its version.
    ///
    /// Returns the previous binding. Callers go through the context so the
    /// write is journaled.
    pub(crate) fn replace(&mut self, id: MetaId, binding: Option<Term>) -> Option<Term> {
        match self.slots.get_mut(id.as_u32() as usize) {
            Some(slot) => {
                slot.version += 1;
                std::mem::replace(&mut slot.binding, binding)
            }
            None => None,
        }
    }

    /// Drops every slot from `len` on, newest first, and hands their
    /// display indices back to their classes.
    pub(crate) fn truncate(&mut self, len: usize) {
        while self.slots.len() > len {
            let Some(slot) = self.slots.pop() else {
                break;
            };
            if let Some(counter) = self.counters.get_mut(&slot.class) {
                *counter -= 1;
            }
        }
    }

    /// Returns the number of meta-variables.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no meta-variable was created yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of currently bound meta-variables.
    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.binding.is_some()).count()
    }

    fn slot(&self, id: MetaId) -> Option<&MetaSlot> {
        self.slots.get(id.as_u32() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Term;
    use crate::domain::ty::Type;

    #[test]
    fn indices_are_per_class() {
        let mut arena = MetaArena::new();
        let v1 = arena.allocate(SymbolClass::Value);
        let t1 = arena.allocate(SymbolClass::Type);
        let v2 = arena.allocate(SymbolClass::Value);
        assert_eq!(arena.label(v1), "v1");
        assert_eq!(arena.label(t1), "τ1");
        assert_eq!(arena.label(v2), "v2");
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn truncate_reuses_indices() {
        let mut arena = MetaArena::new();
        arena.allocate(SymbolClass::Value);
        let mark = arena.len();
        arena.allocate(SymbolClass::Value);
        arena.allocate(SymbolClass::Type);
        arena.truncate(mark);
        assert_eq!(arena.len(), 1);
        let v = arena.allocate(SymbolClass::Value);
        assert_eq!(arena.label(v), "v2");
        let t = arena.allocate(SymbolClass::Type);
        assert_eq!(arena.label(t), "τ1");
    }

    /// Every write bumps the version, including clearing a binding.
    #[test]
    fn replace_bumps_version() {
        let mut arena = MetaArena::new();
        let t = arena.allocate(SymbolClass::Type);
        assert_eq!(arena.version(t), 0);
        let old = arena.replace(t, Some(Term::Type(Type::Nat)));
        assert!(old.is_none());
        assert_eq!(arena.version(t), 1);
        assert_eq!(arena.bound_count(), 1);
        let old = arena.replace(t, None);
        assert_eq!(old, Some(Term::Type(Type::Nat)));
        assert_eq!(arena.version(t), 2);
        assert_eq!(arena.bound_count(), 0);
    }
}
