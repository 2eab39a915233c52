//! Derivator: an engine for building derivation trees interactively.
//!
//! The engine constructs proofs of typing judgments (`Γ ⊢ e : τ`) and
//! big-step evaluation judgments (`E, S ⊢ e ⇓ v, S', ε`) for a small
//! functional language. A learner picks a rule for an open goal; the rule is
//! matched against the goal, producing premises to prove next. Parts of a
//! judgment that are not known yet are meta-variables, resolved by later
//! steps, and checks that cannot be decided yet are deferred as constraints.
//!
//! # Architecture
//!
//! - [`context`], [`arena`], [`snapshot`]: write-once meta-variables and
//!   undoable journals of every mutation.
//! - [`normalize`], [`cache`]: lazy, memoized simplification whose entries are
//!   invalidated by meta-variable version counters.
//! - [`matching`]: one structural unification algorithm for every domain.
//! - [`mapping`]: layered finite maps (signatures, environments, stores).
//! - [`constraint`]: deferred checks, re-validated to a fixpoint.
//! - [`rule`], [`statement`]: rules built from a constructor and a callback.
//! - [`tree`]: apply, undo and redo steps of a derivation.
//! - [`catalog`]: a small reference chapter of rules.
//!
//! # References
//!
//! - Kahn, G. "Natural semantics" (1987) – big-step judgments
//! - Pierce, B. "Types and Programming Languages" (2002), ch. 22 – constraint-based typing
//! - Aït-Kaci, H. "Warren's Abstract Machine: A Tutorial Reconstruction" (1991) – trails
//!
//! # Example
//!
//! ```
//! use derivator::prelude::*;
//!
//! let ctx = Context::new();
//! let rules = derivator::catalog::ruleset();
//! let goal = Statement::typing(Expression::nat(3), Mapping::empty(), ctx.fresh_term());
//! let mut tree = DerivationTree::new(goal);
//! let t_nat = rules.find(&RuleId::new("T-Nat")).unwrap();
//! tree.apply(&ctx, tree.root(), t_nat, &mut NoPrompt).unwrap();
//! assert!(tree.is_proved());
//! ```

pub mod annotate;
pub mod arena;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod constraint;
pub mod context;
pub mod core;
pub mod domain;
pub mod error;
pub mod mapping;
pub mod matching;
pub mod normalize;
pub mod rule;
pub mod snapshot;
pub mod statement;
pub mod tree;

pub use crate::config::EngineConfig;
pub use crate::context::Context;
pub use crate::error::{EngineError, Mismatch, MismatchKind, Result};
pub use crate::rule::{Rule, Ruleset};
pub use crate::statement::Statement;
pub use crate::tree::DerivationTree;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::constraint::{ConstraintFactory, ConstraintSet};
    pub use crate::context::Context;
    pub use crate::core::{MetaVar, RuleId, StepId};
    pub use crate::domain::ast::{BinOp, Datum, Declaration, Expression, Identifier, Literal};
    pub use crate::domain::effect::{Effect, Event};
    pub use crate::domain::ty::Type;
    pub use crate::domain::value::Value;
    pub use crate::domain::Render;
    pub use crate::error::{EngineError, Mismatch, MismatchKind, Result};
    pub use crate::mapping::{Environment, Mapping, Signature, Store};
    pub use crate::matching::must_match;
    pub use crate::normalize::simplify;
    pub use crate::rule::{NoPrompt, Prompt, Rule, Ruleset, ScriptedPrompt};
    pub use crate::snapshot::Snapshot;
    pub use crate::statement::{Evaluation, JudgmentKind, Statement};
    pub use crate::tree::DerivationTree;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn closed(expr: Expression, value: Value) -> Statement {
        Statement::evaluation(
            expr,
            Evaluation {
                env: Mapping::empty(),
                store: Mapping::empty(),
                effect: Effect::empty(),
                value,
                result_store: Mapping::empty(),
            },
        )
    }

    fn rule<'r>(rules: &'r Ruleset, id: &str) -> &'r Rule {
        rules.find(&RuleId::new(id)).unwrap()
    }

    /// `5 ∸ ?e ⇓ 0`: the unknown operand is chosen by the learner, and the
    /// arithmetic decomposition solves the remaining addend.
    #[test]
    fn monus2_end_to_end() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let e = ctx.fresh::<Expression>();
        let expr = Expression::binary(BinOp::Monus, Expression::nat(5), Expression::Var(e));
        let mut tree = DerivationTree::new(closed(expr, Value::Nat(0)));

        let report = tree
            .apply(&ctx, tree.root(), rule(&rules, "E-Monus2"), &mut NoPrompt)
            .unwrap();
        assert_eq!(report.premises.len(), 2);
        assert!(report.check.pending == 0);

        tree.apply(&ctx, report.premises[0], rule(&rules, "E-Nat"), &mut NoPrompt)
            .unwrap();
        assert_eq!(
            tree.node(report.premises[1]).unwrap().statement.render(&ctx),
            "[], [] ⊢ e1 ⇓ 5 + v2, [], ∅"
        );

        let mut prompt = ScriptedPrompt::new([Literal::Nat(Datum::Known(5))]);
        tree.apply(&ctx, report.premises[1], rule(&rules, "E-Nat"), &mut prompt)
            .unwrap();
        assert_eq!(ctx.lookup(e), Some(Expression::nat(5)));
        assert!(tree.constraints().is_empty());
        assert!(tree.is_proved());
    }

    /// Multiplication waits for both operands and binds the result once
    /// re-validation sees them.
    #[test]
    fn deferred_product_resolves() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let v = ctx.fresh::<Value>();
        let expr = Expression::binary(BinOp::Times, Expression::nat(2), Expression::nat(3));
        let mut tree = DerivationTree::new(closed(expr, Value::Var(v)));

        let report = tree
            .apply(&ctx, tree.root(), rule(&rules, "E-Times"), &mut NoPrompt)
            .unwrap();
        assert_eq!(report.check.pending, 1);
        assert!(!tree.is_proved());
        for premise in report.premises {
            tree.apply(&ctx, premise, rule(&rules, "E-Nat"), &mut NoPrompt).unwrap();
        }
        assert_eq!(ctx.lookup(v), Some(Value::Nat(6)));
        assert!(tree.is_proved());
    }

    /// `let val x = 2 in x + x end ⇓ 4`, looking `x` up through a layered
    /// environment.
    #[test]
    fn let_binding_evaluates() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let v = ctx.fresh::<Value>();
        let x = Identifier::new("x");
        let expr = Expression::let_in(
            Declaration::val(x.clone(), Expression::nat(2)),
            Expression::binary(BinOp::Plus, Expression::Ident(x.clone()), Expression::Ident(x)),
        );
        let mut tree = DerivationTree::new(closed(expr, Value::Var(v)));

        let root = tree.apply(&ctx, tree.root(), rule(&rules, "E-Let"), &mut NoPrompt).unwrap();
        let val = tree.apply(&ctx, root.premises[0], rule(&rules, "E-Val"), &mut NoPrompt).unwrap();
        tree.apply(&ctx, val.premises[0], rule(&rules, "E-Nat"), &mut NoPrompt).unwrap();
        let plus = tree.apply(&ctx, root.premises[1], rule(&rules, "E-Plus"), &mut NoPrompt).unwrap();
        for premise in plus.premises {
            tree.apply(&ctx, premise, rule(&rules, "E-Ident"), &mut NoPrompt).unwrap();
        }
        assert!(tree.is_proved());
        assert_eq!(Value::Var(v).render(&ctx), "4");
    }

    /// Typing `let val x = 'a' in (x, 1) end` infers a pair type.
    #[test]
    fn let_binding_types() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let t = ctx.fresh::<Type>();
        let x = Identifier::new("x");
        let expr = Expression::let_in(
            Declaration::val(x.clone(), Expression::char('a')),
            Expression::pair(Expression::Ident(x), Expression::nat(1)),
        );
        let mut tree = DerivationTree::new(Statement::typing(expr, Mapping::empty(), Type::Var(t)));

        let root = tree.apply(&ctx, tree.root(), rule(&rules, "T-Let"), &mut NoPrompt).unwrap();
        let val = tree.apply(&ctx, root.premises[0], rule(&rules, "T-Val"), &mut NoPrompt).unwrap();
        let pair = tree.apply(&ctx, root.premises[1], rule(&rules, "T-Pair"), &mut NoPrompt).unwrap();
        tree.apply(&ctx, pair.premises[0], rule(&rules, "T-Ident"), &mut NoPrompt).unwrap();
        tree.apply(&ctx, pair.premises[1], rule(&rules, "T-Nat"), &mut NoPrompt).unwrap();
        assert_eq!(tree.open_goals(), val.premises);

        // `'a'` has no rule in the reference chapters; its type is still
        // pinned down by the use of `x`.
        assert_eq!(Type::Var(t).render(&ctx), "τ2 * nat");
        assert!(!tree.is_proved());
    }

    /// Undoing the left branch of a pair also undoes the right branch,
    /// whose store was threaded through the left one.
    #[test]
    fn undo_cascades_through_store() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let v = ctx.fresh::<Value>();
        let expr = Expression::pair(Expression::nat(1), Expression::nat(2));
        let mut tree = DerivationTree::new(closed(expr, Value::Var(v)));
        let root = tree.apply(&ctx, tree.root(), rule(&rules, "E-Pair"), &mut NoPrompt).unwrap();
        tree.apply(&ctx, root.premises[0], rule(&rules, "E-Nat"), &mut NoPrompt).unwrap();
        tree.apply(&ctx, root.premises[1], rule(&rules, "E-Nat"), &mut NoPrompt).unwrap();
        assert_eq!(Value::Var(v).render(&ctx), "(1, 2)");

        assert_eq!(tree.undo(&ctx, root.premises[0]).unwrap(), 2);
        assert_eq!(Value::Var(v).render(&ctx), "(v2, v3)");
        assert_eq!(tree.open_goals(), root.premises);
        for premise in &root.premises {
            assert!(tree.node(*premise).unwrap().can_redo());
            tree.redo(&ctx, *premise, &rules, &mut NoPrompt).unwrap();
        }
        assert_eq!(Value::Var(v).render(&ctx), "(1, 2)");
        assert!(tree.is_proved());
    }

    /// `?e * 3 ⇓ v` with `?e` chosen as 2, then undone and chosen as 5: the
    /// product bound during re-validation must follow the new operand.
    fn product_with_unknown_left(ctx: &Context, rules: &Ruleset, v: MetaVar<Value>) -> (DerivationTree, Vec<StepId>) {
        let e = ctx.fresh::<Expression>();
        let expr = Expression::binary(BinOp::Times, Expression::Var(e), Expression::nat(3));
        let mut tree = DerivationTree::new(closed(expr, Value::Var(v)));
        let root = tree.apply(ctx, tree.root(), rule(rules, "E-Times"), &mut NoPrompt).unwrap();
        let mut two = ScriptedPrompt::new([Literal::Nat(Datum::Known(2))]);
        tree.apply(ctx, root.premises[0], rule(rules, "E-Nat"), &mut two).unwrap();
        tree.apply(ctx, root.premises[1], rule(rules, "E-Nat"), &mut NoPrompt).unwrap();
        assert_eq!(ctx.lookup(v), Some(Value::Nat(6)));
        assert!(tree.is_proved());
        (tree, root.premises)
    }

    #[test]
    fn undone_operand_reopens_product() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let v = ctx.fresh::<Value>();
        let (mut tree, premises) = product_with_unknown_left(&ctx, &rules, v);
        let (left, right) = (premises[0], premises[1]);

        // The right premise read the store the left one bound.
        assert_eq!(tree.undo(&ctx, left).unwrap(), 2);
        assert!(!ctx.is_bound(v));
        assert!(!tree.constraints().all_fulfilled());
        assert_eq!(tree.open_goals(), vec![left, right]);

        let mut five = ScriptedPrompt::new([Literal::Nat(Datum::Known(5))]);
        tree.apply(&ctx, left, rule(&rules, "E-Nat"), &mut five).unwrap();
        assert!(!ctx.is_bound(v));
        tree.redo(&ctx, right, &rules, &mut NoPrompt).unwrap();
        assert_eq!(ctx.lookup(v), Some(Value::Nat(15)));
        assert_eq!(
            tree.node(tree.root()).unwrap().statement.render(&ctx),
            "[], [] ⊢ 5 * 3 ⇓ 15, [], ∅"
        );
        assert!(tree.is_proved());
    }

    /// Redoing both branches replays the chosen operand and the product.
    #[test]
    fn redo_restores_product() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let v = ctx.fresh::<Value>();
        let (mut tree, premises) = product_with_unknown_left(&ctx, &rules, v);
        tree.undo(&ctx, premises[0]).unwrap();
        for premise in &premises {
            tree.redo(&ctx, *premise, &rules, &mut NoPrompt).unwrap();
        }
        assert_eq!(ctx.lookup(v), Some(Value::Nat(6)));
        assert!(tree.is_proved());
    }

    /// Undoing the right operand reopens the product but leaves the left
    /// branch, which never read anything from the right one.
    #[test]
    fn undo_right_operand_keeps_left() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let v = ctx.fresh::<Value>();
        let (mut tree, premises) = product_with_unknown_left(&ctx, &rules, v);
        let (left, right) = (premises[0], premises[1]);

        assert_eq!(tree.undo(&ctx, right).unwrap(), 1);
        assert!(!ctx.is_bound(v));
        assert!(tree.node(left).unwrap().is_applied());
        assert_eq!(tree.open_goals(), vec![right]);

        tree.redo(&ctx, right, &rules, &mut NoPrompt).unwrap();
        assert_eq!(ctx.lookup(v), Some(Value::Nat(6)));
        assert!(tree.is_proved());
    }

    #[test]
    fn render_tree() {
        let ctx = Context::new();
        let rules = crate::catalog::ruleset();
        let goal = Statement::typing(
            Expression::binary(BinOp::Plus, Expression::nat(1), Expression::nat(2)),
            Mapping::empty(),
            Type::Nat,
        );
        let mut tree = DerivationTree::new(goal);
        tree.apply(&ctx, tree.root(), rule(&rules, "T-Plus"), &mut NoPrompt).unwrap();
        assert_eq!(
            tree.render(&ctx),
            "[] ⊢ 1 + 2 : nat [T-Plus]\n  [] ⊢ 1 : nat [?]\n  [] ⊢ 2 : nat [?]\n"
        );
    }
}
