//! Core identifiers for meta-variables, memoized nodes and derivation steps.
//!
//! Every handle in the engine is a transparent integer wrapper: cheap to copy,
//! totally ordered, and hashed by its inner value only. Typed handles
//! (`MetaVar<T>`) carry their domain as a phantom parameter so that a
//! meta-variable over types can never be bound to a value.
//!
//! # Citations
//! - Logic variables: Warren, "An abstract Prolog instruction set" (1983)
//! - Typed handles over untyped storage: Reynolds, "Types, abstraction and parametric polymorphism" (1983)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of a meta-variable within a `Context`.
///
/// # Invariant
/// - `MetaId`s are dense indices into the context's meta-variable arena.
/// - Equality and hash are based solely on the inner `u32`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaId(u32);

impl MetaId {
    /// Creates a new `MetaId` from a raw index.
    ///
    /// Prefer `Context::fresh`, which registers the variable.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MetaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaId({})", self.0)
    }
}

/// Rendering class of a meta-variable.
///
/// Each class has its own symbol and its own index sequence, so the third
/// value variable renders as `v3` regardless of how many types were created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymbolClass {
    Expression,
    Declaration,
    Type,
    Value,
    Effect,
    Environment,
    Store,
    Signature,
}

impl SymbolClass {
    /// Returns the display symbol of this class.
    pub const fn symbol(self) -> &'static str {
        match self {
            SymbolClass::Expression => "e",
            SymbolClass::Declaration => "d",
            SymbolClass::Type => "τ",
            SymbolClass::Value => "v",
            SymbolClass::Effect => "ε",
            SymbolClass::Environment => "E",
            SymbolClass::Store => "S",
            SymbolClass::Signature => "Γ",
        }
    }
}

/// Typed handle to a meta-variable over the domain `T`.
///
/// The handle is `Copy` regardless of `T`; the phantom parameter only fixes
/// which kind of term the variable may be bound to.
pub struct MetaVar<T> {
    id: MetaId,
    _domain: PhantomData<fn() -> T>,
}

impl<T> MetaVar<T> {
    /// Wraps a raw id. Only the context hands out ids.
    #[inline]
    pub(crate) const fn from_id(id: MetaId) -> Self {
        Self {
            id,
            _domain: PhantomData,
        }
    }

    /// Returns the untyped identifier.
    #[inline]
    pub const fn id(&self) -> MetaId {
        self.id
    }
}

impl<T> Clone for MetaVar<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MetaVar<T> {}

impl<T> PartialEq for MetaVar<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for MetaVar<T> {}

impl<T> Hash for MetaVar<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for MetaVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaVar({})", self.id.0)
    }
}

/// Key of a node whose simplification is memoized.
///
/// Keys are process-unique so that a memo entry can never be confused with
/// the entry of a structurally equal but distinct node.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(u64);

static NEXT_NODE_KEY: AtomicU64 = AtomicU64::new(0);

impl NodeKey {
    /// Allocates a fresh key.
    pub fn fresh() -> Self {
        Self(NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw key.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A node paired with its memo key.
///
/// Equality ignores the key: two separately built `2 + 3` nodes are the same
/// term even though their simplifications are cached independently.
#[derive(Clone)]
pub struct Keyed<T> {
    key: NodeKey,
    node: T,
}

impl<T> Keyed<T> {
    /// Wraps `node` under a fresh key.
    pub fn new(node: T) -> Self {
        Self {
            key: NodeKey::fresh(),
            node,
        }
    }

    /// Returns the memo key.
    #[inline]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Returns the wrapped node.
    #[inline]
    pub fn node(&self) -> &T {
        &self.node
    }
}

impl<T: PartialEq> PartialEq for Keyed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<T: fmt::Debug> fmt::Debug for Keyed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}

/// Identifier of a semantic rule.
///
/// Used to find the rule again when a step is redone after an undo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    /// Creates a rule identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a registered constraint.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(u64);

impl ConstraintId {
    /// Creates a constraint id from a raw counter value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a node of a derivation tree.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u32);

impl StepId {
    /// Creates a step id from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_keys_are_unique() {
        let a = NodeKey::fresh();
        let b = NodeKey::fresh();
        assert_ne!(a, b);
    }

    /// Keyed equality looks through the key.
    #[test]
    fn keyed_equality_ignores_key() {
        let a = Keyed::new((1, 2));
        let b = Keyed::new((1, 2));
        assert_ne!(a.key(), b.key());
        assert_eq!(a, b);
    }

    #[test]
    fn meta_var_is_copy_for_any_domain() {
        struct NotClone;
        let v: MetaVar<NotClone> = MetaVar::from_id(MetaId::new(4));
        let w = v;
        assert_eq!(v, w);
        assert_eq!(w.id().as_u32(), 4);
    }

    #[test]
    fn symbols_are_distinct() {
        let classes = [
            SymbolClass::Expression,
            SymbolClass::Declaration,
            SymbolClass::Type,
            SymbolClass::Value,
            SymbolClass::Effect,
            SymbolClass::Environment,
            SymbolClass::Store,
            SymbolClass::Signature,
        ];
        let mut symbols: Vec<_> = classes.iter().map(|c| c.symbol()).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), classes.len());
    }
}
