//! Structural matching with meta-variable unification.
//!
//! `must_match` is one algorithm shared by every domain. A domain plugs in
//! through `Unify`: how to compare two atomic terms, and optionally how to
//! make progress when one side is still pending. Whatever cannot be decided
//! now is returned as constraint factories that retry the whole match later.
//!
//! # Algorithm
//! 1. Simplify both sides.
//! 2. Identical ⇒ success, no constraints.
//! 3. Either side an unbound meta-variable ⇒ bind it to the other.
//! 4. Both atomic ⇒ `Unify::match_atomic`.
//! 5. Otherwise `Unify::match_pending`; if it declines, defer one
//!    constraint whose check re-invokes `must_match`.
//!
//! # Citations
//! - First-order unification: Robinson, "A machine-oriented logic based on the resolution principle" (1965)
//! - Delayed goals: Naish, "Negation and control in Prolog" (1986), ch. 4

use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::{MetaId, MetaVar};
use crate::domain::ast::{Declaration, Expression, Identifier};
use crate::domain::Render;
use crate::error::{EngineError, Mismatch, MismatchKind, Result};
use crate::normalize::{get_simplification, try_simplify, Simplifiable, Simplification};

/// Result of comparing two atomic terms.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Mismatch,
    /// Matched, possibly with deferred sub-matches.
    Matched(Vec<ConstraintFactory>),
}

impl MatchOutcome {
    /// Matched with nothing left to check.
    pub fn matched() -> Self {
        MatchOutcome::Matched(Vec::new())
    }

    pub fn from_bool(equal: bool) -> Self {
        if equal {
            Self::matched()
        } else {
            MatchOutcome::Mismatch
        }
    }
}

/// Domain callbacks for `must_match`.
pub trait Unify: Simplifiable {
    /// Kind reported in mismatches.
    const KIND: MismatchKind;

    /// Compares two atomic terms.
    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome>;

    /// Tries to make progress when a side is pending. `None` declines.
    fn match_pending(_ctx: &Context, _expected: &Self, _actual: &Self) -> Result<Option<Vec<ConstraintFactory>>> {
        Ok(None)
    }

    /// Does `var` occur inside `term`?
    fn occurs(_ctx: &Context, _var: MetaId, _term: &Self) -> bool {
        false
    }
}

/// Matches `expected` against `actual`, binding meta-variables as needed.
///
/// Returns the constraints that must still hold for the match to succeed;
/// an empty list means the match is fully decided.
///
/// # Errors
/// `EngineError::Mismatch` if the terms cannot match.
pub fn must_match<T: Unify>(
    ctx: &Context,
    expected: &T,
    actual: &T,
    object: Option<&str>,
) -> Result<Vec<ConstraintFactory>> {
    let expected = try_simplify(ctx, expected)?;
    let actual = try_simplify(ctx, actual)?;
    if expected == actual {
        return Ok(Vec::new());
    }
    if let Some(var) = expected.as_meta() {
        return bind_meta(ctx, var, actual, object);
    }
    if let Some(var) = actual.as_meta() {
        return bind_meta(ctx, var, expected, object);
    }

    let expected_class = get_simplification(ctx, &expected);
    let actual_class = get_simplification(ctx, &actual);
    for class in [&expected_class, &actual_class] {
        if let Simplification::Failure { message, .. } = class {
            return Err(Mismatch::message(T::KIND, message.clone()).with_object(object).into());
        }
    }

    if expected_class.is_atomic() && actual_class.is_atomic() {
        return match T::match_atomic(ctx, &expected, &actual)? {
            MatchOutcome::Matched(constraints) => Ok(constraints),
            MatchOutcome::Mismatch => Err(mismatch_error(ctx, &expected, &actual, object)),
        };
    }
    if let Some(constraints) = T::match_pending(ctx, &expected, &actual)? {
        return Ok(constraints);
    }
    Ok(vec![defer(ctx, expected, actual, object)])
}

fn bind_meta<T: Unify>(ctx: &Context, var: MetaVar<T>, value: T, object: Option<&str>) -> Result<Vec<ConstraintFactory>> {
    if T::occurs(ctx, var.id(), &value) {
        return Err(Mismatch {
            kind: T::KIND,
            expected: ctx.label(var),
            actual: value.render(ctx),
            object: object.map(str::to_owned),
            message: Some(format!("{} occurs in {}", ctx.label(var), value.render(ctx))),
        }
        .into());
    }
    ctx.bind(var, value)?;
    Ok(Vec::new())
}

/// One constraint that retries the whole match.
pub fn defer<T: Unify>(ctx: &Context, expected: T, actual: T, object: Option<&str>) -> ConstraintFactory {
    let description = format!("{} = {}", expected.render(ctx), actual.render(ctx));
    let object = object.map(str::to_owned);
    ConstraintFactory::new(description, move |ctx| {
        Ok(must_match(ctx, &expected, &actual, object.as_deref())?.is_empty())
    })
}

/// Builds the mismatch error for two terms of `T`.
pub fn mismatch_error<T: Unify>(ctx: &Context, expected: &T, actual: &T, object: Option<&str>) -> EngineError {
    Mismatch::new(T::KIND, expected.render(ctx), actual.render(ctx))
        .with_object(object)
        .into()
}

/// Structural equality of expressions, binding expression meta-variables.
pub fn expressions_must_match(ctx: &Context, expected: &Expression, actual: &Expression) -> Result<()> {
    decided(must_match(ctx, expected, actual, None)?)
}

/// Structural equality of declarations, binding declaration meta-variables.
pub fn declarations_must_match(ctx: &Context, expected: &Declaration, actual: &Declaration) -> Result<()> {
    decided(must_match(ctx, expected, actual, None)?)
}

/// Identifiers match only when equal.
pub fn identifiers_must_match(expected: &Identifier, actual: &Identifier) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Mismatch::new(MismatchKind::Identifier, expected.as_str(), actual.as_str()).into())
    }
}

/// Syntax never simplifies past a meta-variable, so a structural match is
/// always decided immediately.
fn decided(constraints: Vec<ConstraintFactory>) -> Result<()> {
    if constraints.is_empty() {
        Ok(())
    } else {
        Err(EngineError::invariant("structural match left deferred constraints"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ty::Type;
    use crate::domain::value::Value;

    #[test]
    fn identical_terms_match_without_binding() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        assert!(must_match(&ctx, &Value::Var(v), &Value::Var(v), None).unwrap().is_empty());
        assert!(!ctx.is_bound(v));
    }

    /// Binding goes through simplification: a bound variable is seen through.
    #[test]
    fn binds_after_simplifying() {
        let ctx = Context::new();
        let a = ctx.fresh::<Type>();
        let b = ctx.fresh::<Type>();
        ctx.bind(a, Type::Var(b)).unwrap();
        must_match(&ctx, &Type::Var(a), &Type::Char, None).unwrap();
        assert_eq!(ctx.lookup(b), Some(Type::Char));
    }

    #[test]
    fn mismatch_carries_object() {
        let ctx = Context::new();
        let err = must_match(&ctx, &Value::Nat(1), &Value::Bool(false), Some("result value")).unwrap_err();
        assert_eq!(err.to_string(), "value mismatch in result value: expected `1`, found `false`");
    }

    #[test]
    fn identifier_mismatch() {
        let err = identifiers_must_match(&Identifier::new("x"), &Identifier::new("y")).unwrap_err();
        assert_eq!(err.as_mismatch().unwrap().kind, MismatchKind::Identifier);
        assert!(identifiers_must_match(&Identifier::new("x"), &Identifier::new("x")).is_ok());
    }

    #[test]
    fn deferred_constraint_describes_itself() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        let factories = must_match(&ctx, &Value::Nat(3), &Value::addition(Value::Var(a), Value::Var(b)), None).unwrap();
        assert_eq!(factories.len(), 1);
        assert_eq!(factories[0].description(), "3 = v1 + v2");
    }
}
