//! Deferred constraints.
//!
//! A constraint is a predicate that could not be decided when a rule was
//! applied, usually because part of a judgment was still unknown. Its check
//! is retried whenever the derivation changes; it may bind meta-variables
//! while doing so.
//!
//! # Invariants
//! - A freshly built constraint is never fulfilled.
//! - `fulfilled` only flips from `false` to `true`, through the active
//!   journal, so undoing the snapshot that fulfilled it resets it.
//! - A check either decides (`Ok(true)`), waits (`Ok(false)`), or fails with
//!   a mismatch that is propagated unchanged.
//! - Inside a `ConstraintSet`, every check runs in its own transaction. A
//!   failing check leaves no binding behind; a successful one is appended to
//!   the constraint's trail together with the bound meta-variables it read.
//! - Unbinding any meta-variable a trail depends on reopens the constraint:
//!   its trail is undone and it is pending again.
//!
//! # Citations
//! - Suspended goals: Colmerauer, "Prolog II" (1982), `freeze/2`
//! - Constraint stores: Jaffar & Maher, "Constraint logic programming: a survey" (1994)

pub mod arith;

use crate::context::Context;
use crate::core::{ConstraintId, MetaId, StepId};
use crate::error::{EngineError, Result};
use crate::snapshot::Snapshot;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// The predicate of a constraint.
pub type CheckFn = dyn Fn(&Context) -> Result<bool>;

/// Recipe for a constraint, as returned by matching and by rules.
///
/// Factories are cheap to clone; `build` instantiates a fresh, unfulfilled
/// constraint.
#[derive(Clone)]
pub struct ConstraintFactory {
    description: String,
    check: Rc<CheckFn>,
}

impl ConstraintFactory {
    pub fn new(description: impl Into<String>, check: impl Fn(&Context) -> Result<bool> + 'static) -> Self {
        Self {
            description: description.into(),
            check: Rc::new(check),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Instantiates a fresh constraint.
    pub fn build(&self, ctx: &Context) -> Rc<Constraint> {
        Rc::new(Constraint {
            id: ctx.next_constraint_id(),
            description: self.description.clone(),
            check: Rc::clone(&self.check),
            fulfilled: Cell::new(false),
        })
    }
}

impl fmt::Debug for ConstraintFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintFactory")
            .field("description", &self.description)
            .finish()
    }
}

/// A live constraint.
pub struct Constraint {
    id: ConstraintId,
    description: String,
    check: Rc<CheckFn>,
    fulfilled: Cell<bool>,
}

impl Constraint {
    pub fn id(&self) -> ConstraintId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled.get()
    }

    /// Runs the check unless already fulfilled.
    ///
    /// # Errors
    /// Propagates the mismatch raised by the predicate.
    pub fn check(self: &Rc<Self>, ctx: &Context) -> Result<bool> {
        if self.fulfilled.get() {
            return Ok(true);
        }
        if (self.check)(ctx)? {
            trace!(constraint = %self.id, "constraint fulfilled");
            ctx.fulfil(self);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn mark_fulfilled(&self) {
        self.fulfilled.set(true);
    }

    pub(crate) fn reset(&self) {
        self.fulfilled.set(false);
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("fulfilled", &self.fulfilled.get())
            .finish()
    }
}

/// A deferred constraint that turned out to be violated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("constraint {constraint} failed: {error}")]
pub struct ConstraintFailure {
    pub constraint: ConstraintId,
    /// The derivation step that produced the constraint.
    pub origin: Option<StepId>,
    pub error: EngineError,
}

/// Summary of a re-validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub passes: usize,
    pub newly_fulfilled: usize,
    pub pending: usize,
}

#[derive(Debug)]
struct Registered {
    constraint: Rc<Constraint>,
    origin: Option<StepId>,
    /// Mutations made by successful checks, fulfilment included.
    trail: Snapshot,
    /// Meta-variables bound elsewhere that those checks read.
    deps: BTreeSet<MetaId>,
}

impl Registered {
    /// Undoes the trail, adding whatever it had bound to `unbound`.
    fn reopen(&mut self, ctx: &Context, unbound: &mut BTreeSet<MetaId>) {
        let trail = std::mem::take(&mut self.trail);
        unbound.extend(trail.bindings().map(|(meta, _)| meta));
        let mutations = trail.undo(ctx);
        self.deps.clear();
        debug!(constraint = %self.constraint.id(), mutations, "constraint reopened");
    }
}

/// Registry of every live constraint of a derivation.
#[derive(Debug, Default)]
pub struct ConstraintSet {
    entries: Vec<Registered>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, constraint: Rc<Constraint>, origin: Option<StepId>) {
        self.entries.push(Registered {
            constraint,
            origin,
            trail: Snapshot::default(),
            deps: BTreeSet::new(),
        });
    }

    /// Builds and registers every factory. Returns the new ids.
    pub fn register_all(
        &mut self,
        ctx: &Context,
        factories: &[ConstraintFactory],
        origin: Option<StepId>,
    ) -> Vec<ConstraintId> {
        factories
            .iter()
            .map(|factory| {
                let constraint = factory.build(ctx);
                let id = constraint.id();
                self.register(constraint, origin);
                id
            })
            .collect()
    }

    /// Drops every constraint produced by `origin`, undoing their trails.
    ///
    /// Meta-variables the trails had bound are added to `unbound`. Returns
    /// how many constraints were dropped.
    pub fn remove_origin(&mut self, ctx: &Context, origin: StepId, unbound: &mut BTreeSet<MetaId>) -> usize {
        let (mut removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.origin == Some(origin));
        self.entries = kept;
        for entry in removed.iter_mut().rev() {
            entry.reopen(ctx, unbound);
        }
        removed.len()
    }

    /// Reopens every constraint whose checks read a meta-variable in
    /// `unbound`, until no more are affected.
    ///
    /// Bindings undone on the way are added to `unbound`, so constraints
    /// depending on them are reopened too. Returns how many were reopened.
    pub fn release(&mut self, ctx: &Context, unbound: &mut BTreeSet<MetaId>) -> usize {
        let mut reopened = 0;
        loop {
            let Some(entry) = self
                .entries
                .iter_mut()
                .find(|entry| !entry.deps.is_disjoint(&*unbound))
            else {
                return reopened;
            };
            entry.reopen(ctx, unbound);
            reopened += 1;
        }
    }

    /// Re-checks every unfulfilled constraint until nothing changes.
    ///
    /// A pass makes progress if it fulfilled a constraint or bound a
    /// meta-variable; the run stops after a pass without progress or after
    /// `max_check_passes` passes.
    ///
    /// # Errors
    /// The first failing constraint, together with its origin. Bindings made
    /// by that check are rolled back; earlier successful checks are kept.
    pub fn check_all(&mut self, ctx: &Context) -> std::result::Result<CheckReport, ConstraintFailure> {
        let mut report = CheckReport::default();
        for _ in 0..ctx.config().max_check_passes {
            report.passes += 1;
            let bindings_before = ctx.bindings_made();
            let mut progress = false;
            for entry in &mut self.entries {
                if entry.constraint.is_fulfilled() {
                    continue;
                }
                let guard = ctx.observation();
                let attempt = ctx.transaction(|ctx| entry.constraint.check(ctx));
                let reads = guard.finish();
                match attempt {
                    Ok((fulfilled, snapshot)) => {
                        entry.trail.absorb(snapshot);
                        let deps = ctx.dependencies(&reads, &entry.trail);
                        entry.deps.extend(deps);
                        if fulfilled {
                            report.newly_fulfilled += 1;
                            progress = true;
                        }
                    }
                    Err(error) => {
                        warn!(
                            constraint = %entry.constraint.id(),
                            origin = ?entry.origin,
                            error = %error,
                            "deferred constraint failed"
                        );
                        return Err(ConstraintFailure {
                            constraint: entry.constraint.id(),
                            origin: entry.origin,
                            error,
                        });
                    }
                }
            }
            if ctx.bindings_made() != bindings_before {
                progress = true;
            }
            if !progress {
                break;
            }
        }
        report.pending = self.pending_count();
        Ok(report)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.constraint.is_fulfilled()).count()
    }

    pub fn all_fulfilled(&self) -> bool {
        self.pending_count() == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every constraint with its origin, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<Constraint>, Option<StepId>)> {
        self.entries.iter().map(|entry| (&entry.constraint, entry.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value::Value;
    use crate::error::{Mismatch, MismatchKind};
    use crate::matching::must_match;

    #[test]
    fn fresh_constraints_are_unfulfilled() {
        let ctx = Context::new();
        let factory = ConstraintFactory::new("always", |_| Ok(true));
        let constraint = factory.build(&ctx);
        assert!(!constraint.is_fulfilled());
        assert!(constraint.check(&ctx).unwrap());
        assert!(constraint.is_fulfilled());
        assert!(!factory.build(&ctx).is_fulfilled());
    }

    /// Undoing the snapshot that fulfilled a constraint resets it.
    #[test]
    fn fulfilment_is_journaled() {
        let ctx = Context::new();
        let constraint = ConstraintFactory::new("always", |_| Ok(true)).build(&ctx);
        let (fulfilled, snapshot) = ctx.transaction(|ctx| constraint.check(ctx)).unwrap();
        assert!(fulfilled);
        snapshot.undo(&ctx);
        assert!(!constraint.is_fulfilled());
    }

    /// Chained deferrals resolve within one `check_all`.
    #[test]
    fn check_all_reaches_fixpoint() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let c = ctx.fresh::<Value>();
        let mut set = ConstraintSet::new();
        // 5 = a + b and 3 = b + c, with c unknown until later.
        let first = must_match(&ctx, &Value::Nat(5), &Value::addition(Value::Var(a), Value::Var(b)), None).unwrap();
        let second = must_match(&ctx, &Value::Nat(3), &Value::addition(Value::Var(b), Value::Var(c)), None).unwrap();
        set.register_all(&ctx, &first, Some(StepId::new(0)));
        set.register_all(&ctx, &second, Some(StepId::new(1)));
        assert_eq!(set.check_all(&ctx).unwrap().pending, 2);

        ctx.bind(c, Value::Nat(1)).unwrap();
        let report = set.check_all(&ctx).unwrap();
        assert_eq!(report.pending, 0);
        assert!(set.all_fulfilled());
        assert_eq!(ctx.lookup(a), Some(Value::Nat(3)));
    }

    #[test]
    fn failure_reports_origin() {
        let ctx = Context::new();
        let mut set = ConstraintSet::new();
        let failing = ConstraintFactory::new("never", |_| {
            Err(Mismatch::message(MismatchKind::Value, "no").into())
        });
        set.register_all(&ctx, &[failing], Some(StepId::new(7)));
        let failure = set.check_all(&ctx).unwrap_err();
        assert_eq!(failure.origin, Some(StepId::new(7)));
        assert_eq!(set.remove_origin(&ctx, StepId::new(7), &mut BTreeSet::new()), 1);
        assert!(set.is_empty());
    }

    /// A check that binds and then fails leaves nothing bound.
    #[test]
    fn failed_check_rolls_back_its_bindings() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        let mut set = ConstraintSet::new();
        let half_done = ConstraintFactory::new("binds then fails", move |ctx| {
            ctx.bind(v, Value::Nat(1))?;
            Err(Mismatch::message(MismatchKind::Value, "too late").into())
        });
        set.register_all(&ctx, &[half_done], None);
        let failure = set.check_all(&ctx).unwrap_err();
        assert_eq!(failure.origin, None);
        assert!(!ctx.is_bound(v));
        assert_eq!(ctx.bound_count(), 0);
    }

    /// Unbinding an input reopens the constraint that read it, and the
    /// constraints that read what it bound.
    #[test]
    fn release_reopens_dependents() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let c = ctx.fresh::<Value>();
        let mut set = ConstraintSet::new();
        let first = must_match(&ctx, &Value::Nat(5), &Value::addition(Value::Var(a), Value::Var(b)), None).unwrap();
        let second = must_match(&ctx, &Value::Nat(3), &Value::addition(Value::Var(b), Value::Var(c)), None).unwrap();
        set.register_all(&ctx, &first, Some(StepId::new(0)));
        set.register_all(&ctx, &second, Some(StepId::new(1)));

        let ((), input) = ctx.transaction(|ctx| ctx.bind(c, Value::Nat(1))).unwrap();
        assert_eq!(set.check_all(&ctx).unwrap().pending, 0);
        assert_eq!(ctx.lookup(a), Some(Value::Nat(3)));

        input.undo(&ctx);
        let mut unbound = BTreeSet::from([c.id()]);
        assert_eq!(set.release(&ctx, &mut unbound), 2);
        assert!(unbound.contains(&a.id()) && unbound.contains(&b.id()));
        assert_eq!(ctx.bound_count(), 0);
        assert_eq!(set.pending_count(), 2);

        // Checking again with a different input gives a different answer.
        ctx.bind(c, Value::Nat(2)).unwrap();
        assert!(set.check_all(&ctx).unwrap().pending == 0);
        assert_eq!(ctx.lookup(a), Some(Value::Nat(4)));
    }

    /// Removing an origin undoes what its constraints bound.
    #[test]
    fn remove_origin_undoes_trails() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let mut set = ConstraintSet::new();
        let factory = ConstraintFactory::new("a = 4", move |ctx| {
            ctx.bind(a, Value::Nat(4))?;
            Ok(true)
        });
        set.register_all(&ctx, &[factory], Some(StepId::new(2)));
        set.check_all(&ctx).unwrap();
        assert!(ctx.is_bound(a));

        let mut unbound = BTreeSet::new();
        assert_eq!(set.remove_origin(&ctx, StepId::new(2), &mut unbound), 1);
        assert!(!ctx.is_bound(a));
        assert_eq!(unbound, BTreeSet::from([a.id()]));
    }
}
