//! Snapshots: undoable logs of engine mutations.
//!
//! Every write the engine performs (binding a meta-variable, fulfilling a
//! constraint) goes through `Context`, which appends it to the journal of the
//! innermost active transaction. A finished transaction hands its journal
//! out as a `Snapshot`; undoing the snapshot replays the log backwards and
//! drops every memo entry created while it was active.
//!
//! # Invariants
//! - `undo` restores exactly the state before the first logged mutation.
//! - Mutations made while no journal is active are permanent.
//! - A snapshot can be resumed any number of times; later mutations are
//!   appended to the same log and undone together with the earlier ones.
//!
//! # Citations
//! - Trail-based backtracking: Aït-Kaci, "Warren's Abstract Machine: A Tutorial Reconstruction" (1991), §5.3
//! - Undo logs: Gray & Reuter, "Transaction Processing: Concepts and Techniques" (1992), ch. 10

use crate::constraint::Constraint;
use crate::context::Context;
use crate::core::{MetaId, NodeKey};
use crate::domain::Term;
use std::rc::Rc;

/// One logged mutation.
#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    /// A meta-variable binding.
    Bind {
        meta: MetaId,
        old: Option<Term>,
        new: Term,
    },
    /// A constraint flipped to fulfilled.
    Fulfil(Rc<Constraint>),
}

/// Mutation log plus the memo keys created under it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    pub(crate) mutations: Vec<Mutation>,
    pub(crate) scope: Vec<NodeKey>,
}

/// A finished, undoable transaction.
#[derive(Debug, Default)]
pub struct Snapshot {
    journal: Journal,
}

impl Snapshot {
    pub(crate) fn from_journal(journal: Journal) -> Self {
        Self { journal }
    }

    /// Number of logged mutations.
    pub fn len(&self) -> usize {
        self.journal.mutations.len()
    }

    /// Returns `true` if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.journal.mutations.is_empty()
    }

    /// Bindings made under this snapshot, in binding order.
    pub fn bindings(&self) -> impl Iterator<Item = (MetaId, &Term)> + '_ {
        self.journal.mutations.iter().filter_map(|m| match m {
            Mutation::Bind { meta, new, .. } => Some((*meta, new)),
            Mutation::Fulfil(_) => None,
        })
    }

    /// Runs `f` with this snapshot's log active again.
    ///
    /// Mutations made by `f` are appended to this snapshot whether `f`
    /// succeeds or not; the caller decides whether to undo.
    pub fn resume<R>(&mut self, ctx: &Context, f: impl FnOnce(&Context) -> R) -> R {
        ctx.push_journal(std::mem::take(&mut self.journal));
        let result = f(ctx);
        self.journal = ctx.pop_journal().unwrap_or_default();
        result
    }

    /// Appends the log of a later snapshot, so both are undone together.
    pub(crate) fn absorb(&mut self, later: Snapshot) {
        self.journal.mutations.extend(later.journal.mutations);
        self.journal.scope.extend(later.journal.scope);
    }

    /// Reverts every logged mutation, newest first, and disposes the memo
    /// entries created under this snapshot.
    ///
    /// Returns the number of reverted mutations.
    pub fn undo(self, ctx: &Context) -> usize {
        ctx.revert(self.journal)
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::domain::Term;
    use crate::domain::ty::Type;
    use crate::domain::value::Value;

    /// Undo restores exactly the pre-snapshot bindings.
    #[test]
    fn undo_restores_bindings() {
        let ctx = Context::new();
        let permanent = ctx.fresh::<Type>();
        ctx.bind(permanent, Type::Bool).unwrap();

        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let ((), snapshot) = ctx
            .transaction(|ctx| {
                ctx.bind(a, Value::Nat(1))?;
                ctx.bind(b, Value::Nat(2))
            })
            .unwrap();
        assert_eq!(snapshot.len(), 2);
        let bound: Vec<_> = snapshot.bindings().map(|(meta, term)| (meta, term.clone())).collect();
        assert_eq!(
            bound,
            vec![(a.id(), Term::Value(Value::Nat(1))), (b.id(), Term::Value(Value::Nat(2)))]
        );

        assert_eq!(snapshot.undo(&ctx), 2);
        assert_eq!(ctx.lookup(a), None);
        assert_eq!(ctx.lookup(b), None);
        assert_eq!(ctx.lookup(permanent), Some(Type::Bool));
    }

    /// Two snapshots are independent: undoing one keeps the other.
    #[test]
    fn undo_isolation_between_snapshots() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let ((), first) = ctx.transaction(|ctx| ctx.bind(a, Value::Unit)).unwrap();
        let ((), second) = ctx.transaction(|ctx| ctx.bind(b, Value::Bool(true))).unwrap();

        first.undo(&ctx);
        assert_eq!(ctx.lookup(a), None);
        assert_eq!(ctx.lookup(b), Some(Value::Bool(true)));
        second.undo(&ctx);
        assert_eq!(ctx.lookup(b), None);
    }

    #[test]
    fn resume_appends_to_log() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let ((), mut snapshot) = ctx.transaction(|ctx| ctx.bind(a, Value::Nat(0))).unwrap();
        snapshot.resume(&ctx, |ctx| ctx.bind(b, Value::Nat(1))).unwrap();
        assert_eq!(snapshot.len(), 2);
        snapshot.undo(&ctx);
        assert!(!ctx.is_bound(a));
        assert!(!ctx.is_bound(b));
    }

    #[test]
    fn absorbed_snapshots_undo_together() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let ((), mut first) = ctx.transaction(|ctx| ctx.bind(a, Value::Nat(0))).unwrap();
        let ((), second) = ctx.transaction(|ctx| ctx.bind(b, Value::Nat(1))).unwrap();
        first.absorb(second);
        assert_eq!(first.bindings().count(), 2);
        assert_eq!(first.undo(&ctx), 2);
        assert_eq!(ctx.bound_count(), 0);
    }

    /// A failing transaction leaves no trace.
    #[test]
    fn failed_transaction_rolls_back() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let result = ctx.transaction(|ctx| {
            ctx.bind(a, Value::Nat(3))?;
            ctx.bind(a, Value::Nat(4))
        });
        assert!(result.is_err());
        assert!(!ctx.is_bound(a));
    }
}
