//! The engine context: meta-variables, journals and the memo table.
//!
//! A `Context` owns every piece of mutable engine state. All methods take
//! `&self` and use interior mutability, so simplification callbacks, domain
//! callbacks and constraint checks can all share one context without
//! threading `&mut` through the whole engine.
//!
//! # Invariants
//! - A meta-variable is bound at most once between undos.
//! - Every binding and every fulfilment is appended to the innermost active
//!   journal, if any.
//! - A memo entry is returned only while every meta-variable version it
//!   observed is current.
//! - The context is `!Send` and `!Sync`.
//!
//! # References
//! - *Interior mutability for query engines*: [Salsa, "Database" design]
//! - *Dependency recording with a stack of accumulators*: [Adapton, PLDI 2014]

use crate::arena::MetaArena;
use crate::cache::{InvalidationReason, MemoTable, Metrics};
use crate::config::EngineConfig;
use crate::constraint::Constraint;
use crate::core::{ConstraintId, MetaId, MetaVar, NodeKey};
use crate::domain::{Domain, Term};
use crate::error::{EngineError, Result};
use crate::normalize::Simplification;
use crate::snapshot::{Journal, Mutation, Snapshot};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::{debug, trace};

/// Mutable engine state shared by every operation.
pub struct Context {
    config: EngineConfig,
    metas: RefCell<MetaArena>,
    /// Stack of active journals; the innermost receives mutations.
    journals: RefCell<Vec<Journal>>,
    memo: RefCell<MemoTable>,
    /// Stack of dependency accumulators, one per memoized computation in flight.
    observers: RefCell<Vec<BTreeMap<MetaId, u64>>>,
    metrics: RefCell<Metrics>,
    next_constraint: Cell<u64>,
    _not_send_sync: PhantomData<*const ()>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a context with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            metas: RefCell::new(MetaArena::new()),
            journals: RefCell::new(Vec::new()),
            memo: RefCell::new(MemoTable::new()),
            observers: RefCell::new(Vec::new()),
            metrics: RefCell::new(Metrics::default()),
            next_constraint: Cell::new(0),
            _not_send_sync: PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a copy of the current counters.
    pub fn metrics(&self) -> Metrics {
        self.metrics.borrow().clone()
    }

    /// Number of meta-variables created so far.
    pub fn meta_count(&self) -> usize {
        self.metas.borrow().len()
    }

    /// Frees every meta-variable created after `mark`, a previous
    /// `meta_count()`. They must be unbound and unreachable.
    pub(crate) fn reclaim(&self, mark: usize) {
        let mut metas = self.metas.borrow_mut();
        let freed = metas.len().saturating_sub(mark);
        if freed > 0 {
            metas.truncate(mark);
            trace!(freed, "reclaimed meta-variables");
        }
    }

    /// Number of currently bound meta-variables.
    pub fn bound_count(&self) -> usize {
        self.metas.borrow().bound_count()
    }

    /// Number of bindings ever made, including undone ones.
    pub fn bindings_made(&self) -> u64 {
        self.metrics.borrow().bindings
    }

    // ------------------------------------------------------------------
    // Meta-variables
    // ------------------------------------------------------------------

    /// Creates a fresh, unbound meta-variable over `T`.
    pub fn fresh<T: Domain>(&self) -> MetaVar<T> {
        let id = self.metas.borrow_mut().allocate(T::CLASS);
        MetaVar::from_id(id)
    }

    /// Creates a fresh meta-variable and wraps it as a term of `T`.
    pub fn fresh_term<T: Domain>(&self) -> T {
        T::from_meta(self.fresh())
    }

    /// Display label of a meta-variable, e.g. `τ2`.
    pub fn label<T>(&self, var: MetaVar<T>) -> String {
        self.metas.borrow().label(var.id())
    }

    /// Returns the binding of `var`, recording the read for memoization.
    pub fn lookup<T: Domain>(&self, var: MetaVar<T>) -> Option<T> {
        let (binding, version) = {
            let metas = self.metas.borrow();
            (metas.binding(var.id()).cloned(), metas.version(var.id()))
        };
        self.observe(var.id(), version);
        binding.and_then(T::from_term)
    }

    /// Returns `true` if `var` is bound. Does not record a read.
    pub fn is_bound<T>(&self, var: MetaVar<T>) -> bool {
        self.metas.borrow().binding(var.id()).is_some()
    }

    /// Binds `var` to `value`.
    ///
    /// # Errors
    /// Binding an already bound variable is an invariant violation.
    pub fn bind<T: Domain>(&self, var: MetaVar<T>, value: T) -> Result<()> {
        if self.is_bound(var) {
            return Err(EngineError::invariant(format!(
                "meta-variable {} is already bound",
                self.label(var)
            )));
        }
        let new = value.into_term();
        let old = self.metas.borrow_mut().replace(var.id(), Some(new.clone()));
        self.metrics.borrow_mut().record_binding();
        debug!(meta = %self.label(var), "bound meta-variable");
        self.log(Mutation::Bind {
            meta: var.id(),
            old,
            new,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Runs `f` under a fresh journal.
    ///
    /// On success returns the result together with the snapshot of every
    /// mutation `f` made. On failure the mutations are undone before the
    /// error is returned.
    pub fn transaction<R>(&self, f: impl FnOnce(&Context) -> Result<R>) -> Result<(R, Snapshot)> {
        self.push_journal(Journal::default());
        let result = f(self);
        let journal = self.pop_journal().unwrap_or_default();
        match result {
            Ok(value) => Ok((value, Snapshot::from_journal(journal))),
            Err(err) => {
                self.revert(journal);
                Err(err)
            }
        }
    }

    pub(crate) fn push_journal(&self, journal: Journal) {
        self.journals.borrow_mut().push(journal);
    }

    pub(crate) fn pop_journal(&self) -> Option<Journal> {
        self.journals.borrow_mut().pop()
    }

    fn log(&self, mutation: Mutation) {
        if let Some(journal) = self.journals.borrow_mut().last_mut() {
            journal.mutations.push(mutation);
        }
    }

    /// Reverts a journal newest-first. Returns the number of mutations.
    pub(crate) fn revert(&self, journal: Journal) -> usize {
        let count = journal.mutations.len();
        for mutation in journal.mutations.into_iter().rev() {
            match mutation {
                Mutation::Bind { meta, old, .. } => {
                    self.metas.borrow_mut().replace(meta, old);
                    debug!(meta = %self.metas.borrow().label(meta), "unbound meta-variable");
                }
                Mutation::Fulfil(constraint) => constraint.reset(),
            }
        }
        {
            let mut memo = self.memo.borrow_mut();
            let mut metrics = self.metrics.borrow_mut();
            for key in journal.scope {
                if memo.remove(key) {
                    metrics.record_invalidation(InvalidationReason::SnapshotUndone);
                }
            }
            metrics.record_undo(count);
        }
        debug!(mutations = count, "snapshot undone");
        count
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    pub(crate) fn next_constraint_id(&self) -> ConstraintId {
        let raw = self.next_constraint.get();
        self.next_constraint.set(raw + 1);
        ConstraintId::new(raw)
    }

    /// Marks `constraint` fulfilled through the active journal.
    pub(crate) fn fulfil(&self, constraint: &Rc<Constraint>) {
        constraint.mark_fulfilled();
        self.log(Mutation::Fulfil(Rc::clone(constraint)));
    }

    // ------------------------------------------------------------------
    // Memoization
    // ------------------------------------------------------------------

    fn observe(&self, id: MetaId, version: u64) {
        if let Some(top) = self.observers.borrow_mut().last_mut() {
            top.entry(id).or_insert(version);
        }
    }

    /// Starts recording reads for a memoized computation.
    pub(crate) fn observation(&self) -> ObservationGuard<'_> {
        self.observers.borrow_mut().push(BTreeMap::new());
        ObservationGuard {
            ctx: self,
            active: true,
        }
    }

    /// Returns the valid memo entry of `key`, if any.
    ///
    /// A hit propagates the entry's dependencies to the computation in
    /// flight, so enclosing entries are invalidated by the same bindings.
    pub(crate) fn memo_lookup(&self, key: NodeKey) -> Option<Simplification<Term>> {
        let entry = self.memo.borrow().get(key).cloned();
        let entry = match entry {
            Some(entry) => entry,
            None => {
                self.metrics.borrow_mut().record_miss();
                trace!(key = key.as_u64(), "memo miss");
                return None;
            }
        };
        let valid = {
            let metas = self.metas.borrow();
            entry.is_valid(|id| metas.version(id))
        };
        if !valid {
            let mut metrics = self.metrics.borrow_mut();
            metrics.record_invalidation(InvalidationReason::VersionMismatch);
            metrics.record_miss();
            trace!(key = key.as_u64(), "memo entry invalidated");
            return None;
        }
        if let Some(top) = self.observers.borrow_mut().last_mut() {
            for (id, version) in &entry.observed_versions {
                top.entry(*id).or_insert(*version);
            }
        }
        self.metrics.borrow_mut().record_hit();
        trace!(key = key.as_u64(), "memo hit");
        Some(entry.value)
    }

    /// Stores a computed classification and scopes it to the active journal.
    pub(crate) fn memo_store(
        &self,
        key: NodeKey,
        value: Simplification<Term>,
        observed: BTreeMap<MetaId, u64>,
    ) {
        self.memo.borrow_mut().insert(key, value, observed);
        if let Some(journal) = self.journals.borrow_mut().last_mut() {
            journal.scope.push(key);
        }
    }

    /// Meta-variables among `reads` that are bound now by something other
    /// than `own`: the bindings a computation relied on from outside.
    pub(crate) fn dependencies(&self, reads: &BTreeMap<MetaId, u64>, own: &Snapshot) -> BTreeSet<MetaId> {
        let own: BTreeSet<MetaId> = own.bindings().map(|(meta, _)| meta).collect();
        let metas = self.metas.borrow();
        reads
            .keys()
            .copied()
            .filter(|id| metas.binding(*id).is_some() && !own.contains(id))
            .collect()
    }

    /// Number of memo entries.
    pub fn memo_len(&self) -> usize {
        self.memo.borrow().len()
    }

    /// How often the node under `key` has been computed.
    pub fn compute_count(&self, key: NodeKey) -> u64 {
        self.memo.borrow().get(key).map_or(0, |e| e.compute_count)
    }
}

/// RAII guard for a dependency accumulator.
///
/// Pops the accumulator on drop if `finish` was not called, so an early
/// return cannot leave a stale accumulator on the stack.
pub(crate) struct ObservationGuard<'a> {
    ctx: &'a Context,
    active: bool,
}

impl ObservationGuard<'_> {
    /// Pops the accumulator and returns the reads it recorded.
    ///
    /// The reads are also merged into the enclosing accumulator.
    pub(crate) fn finish(mut self) -> BTreeMap<MetaId, u64> {
        self.active = false;
        let mut observers = self.ctx.observers.borrow_mut();
        let observed = observers.pop().unwrap_or_default();
        if let Some(parent) = observers.last_mut() {
            for (id, version) in &observed {
                parent.entry(*id).or_insert(*version);
            }
        }
        observed
    }
}

impl Drop for ObservationGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            self.ctx.observers.borrow_mut().pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ty::Type;

    /// Binding a bound variable is an invariant violation.
    #[test]
    fn bind_then_rebind() {
        let ctx = Context::new();
        let t = ctx.fresh::<Type>();
        ctx.bind(t, Type::Nat).unwrap();
        let err = ctx.bind(t, Type::Bool).unwrap_err();
        assert!(matches!(err, EngineError::Invariant(_)));
        assert_eq!(ctx.lookup(t), Some(Type::Nat));
    }

    #[test]
    fn reads_are_recorded_while_observing() {
        let ctx = Context::new();
        let t = ctx.fresh::<Type>();
        let guard = ctx.observation();
        assert_eq!(ctx.lookup(t), None);
        let observed = guard.finish();
        assert_eq!(observed.get(&t.id()), Some(&0));
    }

    /// Only outside bindings count as dependencies.
    #[test]
    fn dependencies_skip_own_and_unbound_reads() {
        let ctx = Context::new();
        let outside = ctx.fresh::<Type>();
        let own = ctx.fresh::<Type>();
        let unbound = ctx.fresh::<Type>();
        ctx.bind(outside, Type::Nat).unwrap();
        let guard = ctx.observation();
        let ((), snapshot) = ctx
            .transaction(|ctx| {
                ctx.lookup(outside);
                ctx.lookup(unbound);
                ctx.bind(own, Type::Bool)?;
                ctx.lookup(own);
                Ok(())
            })
            .unwrap();
        let reads = guard.finish();
        assert_eq!(reads.len(), 3);
        assert_eq!(ctx.dependencies(&reads, &snapshot), BTreeSet::from([outside.id()]));
    }

    #[test]
    fn constraint_ids_increase() {
        let ctx = Context::new();
        assert!(ctx.next_constraint_id() < ctx.next_constraint_id());
    }
}
