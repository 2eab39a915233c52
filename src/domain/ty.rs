//! Types of the object language.

use super::{term_domain, Render};
use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::{MetaId, MetaVar, SymbolClass};
use crate::error::{MismatchKind, Result};
use crate::matching::{must_match, MatchOutcome, Unify};
use crate::normalize::{simplify, Simplifiable, Simplification};
use std::rc::Rc;

/// A type, possibly containing meta-variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Var(MetaVar<Type>),
    Bool,
    Nat,
    Char,
    Unit,
    Pair(Rc<(Type, Type)>),
    Arrow(Rc<(Type, Type)>),
    Ref(Rc<Type>),
}

term_domain!(Type, Type, SymbolClass::Type);

impl Type {
    /// `left * right`
    pub fn pair(left: Type, right: Type) -> Self {
        Type::Pair(Rc::new((left, right)))
    }

    /// `param → result`
    pub fn arrow(param: Type, result: Type) -> Self {
        Type::Arrow(Rc::new((param, result)))
    }

    /// `inner ref`
    pub fn reference(inner: Type) -> Self {
        Type::Ref(Rc::new(inner))
    }

    fn render_prec(&self, ctx: &Context, prec: u8) -> String {
        let (text, own) = match simplify(ctx, self) {
            Type::Var(var) => (ctx.label(var), 3),
            Type::Bool => ("bool".to_owned(), 3),
            Type::Nat => ("nat".to_owned(), 3),
            Type::Char => ("char".to_owned(), 3),
            Type::Unit => ("unit".to_owned(), 3),
            Type::Ref(inner) => (format!("{} ref", inner.render_prec(ctx, 3)), 2),
            Type::Pair(parts) => (
                format!("{} * {}", parts.0.render_prec(ctx, 2), parts.1.render_prec(ctx, 2)),
                1,
            ),
            Type::Arrow(parts) => (
                format!("{} → {}", parts.0.render_prec(ctx, 1), parts.1.render_prec(ctx, 0)),
                0,
            ),
        };
        if own < prec {
            format!("({})", text)
        } else {
            text
        }
    }
}

impl Render for Type {
    fn render(&self, ctx: &Context) -> String {
        self.render_prec(ctx, 0)
    }
}

impl Simplifiable for Type {
    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self> {
        match self {
            Type::Var(var) => match ctx.lookup(*var) {
                Some(bound) => Simplification::success(bound),
                None => Simplification::Pending,
            },
            _ => Simplification::Atomic,
        }
    }
}

impl Unify for Type {
    const KIND: MismatchKind = MismatchKind::Type;

    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome> {
        match (expected, actual) {
            (Type::Bool, Type::Bool)
            | (Type::Nat, Type::Nat)
            | (Type::Char, Type::Char)
            | (Type::Unit, Type::Unit) => Ok(MatchOutcome::matched()),
            (Type::Pair(e), Type::Pair(a)) | (Type::Arrow(e), Type::Arrow(a)) => {
                let mut constraints: Vec<ConstraintFactory> = must_match(ctx, &e.0, &a.0, None)?;
                constraints.extend(must_match(ctx, &e.1, &a.1, None)?);
                Ok(MatchOutcome::Matched(constraints))
            }
            (Type::Ref(e), Type::Ref(a)) => Ok(MatchOutcome::Matched(must_match(ctx, &**e, &**a, None)?)),
            _ => Ok(MatchOutcome::Mismatch),
        }
    }

    fn occurs(ctx: &Context, var: MetaId, term: &Self) -> bool {
        match simplify(ctx, term) {
            Type::Var(other) => other.id() == var,
            Type::Pair(parts) | Type::Arrow(parts) => {
                Self::occurs(ctx, var, &parts.0) || Self::occurs(ctx, var, &parts.1)
            }
            Type::Ref(inner) => Self::occurs(ctx, var, &inner),
            Type::Bool | Type::Nat | Type::Char | Type::Unit => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_respects_precedence() {
        let ctx = Context::new();
        let t = Type::arrow(
            Type::arrow(Type::Nat, Type::Bool),
            Type::pair(Type::reference(Type::Nat), Type::arrow(Type::Unit, Type::Char)),
        );
        assert_eq!(t.render(&ctx), "(nat → bool) → nat ref * (unit → char)");
    }

    #[test]
    fn render_follows_bindings() {
        let ctx = Context::new();
        let t = ctx.fresh::<Type>();
        assert_eq!(Type::pair(Type::Var(t), Type::Nat).render(&ctx), "τ1 * nat");
        ctx.bind(t, Type::arrow(Type::Nat, Type::Nat)).unwrap();
        assert_eq!(Type::pair(Type::Var(t), Type::Nat).render(&ctx), "(nat → nat) * nat");
    }

    /// Unification binds through constructors.
    #[test]
    fn arrow_unification_binds_components() {
        let ctx = Context::new();
        let a = ctx.fresh::<Type>();
        let b = ctx.fresh::<Type>();
        let constraints = must_match(
            &ctx,
            &Type::arrow(Type::Var(a), Type::Bool),
            &Type::arrow(Type::Nat, Type::Var(b)),
            None,
        )
        .unwrap();
        assert!(constraints.is_empty());
        assert_eq!(ctx.lookup(a), Some(Type::Nat));
        assert_eq!(ctx.lookup(b), Some(Type::Bool));
    }

    #[test]
    fn constructor_mismatch() {
        let ctx = Context::new();
        let err = must_match(&ctx, &Type::Nat, &Type::reference(Type::Nat), Some("result type")).unwrap_err();
        let mismatch = err.as_mismatch().unwrap();
        assert_eq!(mismatch.kind, MismatchKind::Type);
        assert_eq!(mismatch.expected, "nat");
        assert_eq!(mismatch.actual, "nat ref");
    }

    /// `τ1 = τ1 → nat` has no finite solution.
    #[test]
    fn occurs_check() {
        let ctx = Context::new();
        let a = ctx.fresh::<Type>();
        let err = must_match(&ctx, &Type::Var(a), &Type::arrow(Type::Var(a), Type::Nat), None).unwrap_err();
        assert!(err.is_recoverable());
        assert!(!ctx.is_bound(a));
    }
}
