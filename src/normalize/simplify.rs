//! Memoized classification and the simplification loop.
//!
//! # Algorithm
//! `get_simplification` consults the memo table for keyed nodes and
//! otherwise computes directly. `simplify` follows successes until it
//! reaches an atomic or pending term, or a failure (whose partial result is
//! returned when present).
//!
//! # Termination
//! Every success yields a strictly different term, but nothing bounds the
//! length of a chain in general, so the loop is capped by
//! `EngineConfig::max_simplify_steps`.

use super::{Simplifiable, Simplification};
use crate::context::Context;
use crate::error::{EngineError, Result};
use tracing::{trace, warn};

/// Returns the (memoized) classification of `term`.
pub fn get_simplification<T: Simplifiable>(ctx: &Context, term: &T) -> Simplification<T> {
    let Some(key) = term.memo_key() else {
        return term.compute_simplification(ctx);
    };
    if let Some(cached) = ctx.memo_lookup(key) {
        if let Some(value) = cached.try_map(T::from_term) {
            return value;
        }
    }
    let guard = ctx.observation();
    let value = term.compute_simplification(ctx);
    let observed = guard.finish();
    trace!(key = key.as_u64(), reads = observed.len(), "computed simplification");
    ctx.memo_store(key, value.clone().map(T::into_term), observed);
    value
}

/// Follows successes from `term` for at most `max_simplify_steps` steps.
/// Returns the last term reached and whether it is final.
fn follow<T: Simplifiable>(ctx: &Context, term: &T) -> (T, bool) {
    let mut current = term.clone();
    for _ in 0..ctx.config().max_simplify_steps {
        match get_simplification(ctx, &current) {
            Simplification::Success { result, .. } => current = result,
            Simplification::Failure { partial, .. } => return (partial.unwrap_or(current), true),
            Simplification::Atomic | Simplification::Pending => return (current, true),
        }
    }
    (current, false)
}

/// Simplifies `term` as far as possible.
///
/// # Errors
/// Exceeding the configured step limit is an invariant violation.
pub fn try_simplify<T: Simplifiable>(ctx: &Context, term: &T) -> Result<T> {
    match follow(ctx, term) {
        (result, true) => Ok(result),
        (_, false) => Err(step_limit(ctx)),
    }
}

/// Simplifies `term` for display and classification.
///
/// Stops at the last term reached if the step limit is exceeded.
pub fn simplify<T: Simplifiable>(ctx: &Context, term: &T) -> T {
    let (result, finished) = follow(ctx, term);
    if !finished {
        warn!(error = %step_limit(ctx), "simplification stopped");
    }
    result
}

fn step_limit(ctx: &Context) -> EngineError {
    EngineError::invariant(format!(
        "simplification exceeded {} steps",
        ctx.config().max_simplify_steps
    ))
}

/// Returns `true` if `term` classifies as atomic.
pub fn is_atomic<T: Simplifiable>(ctx: &Context, term: &T) -> bool {
    get_simplification(ctx, term).is_atomic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::value::Value;
    use proptest::prelude::*;

    /// A bound variable simplifies to its binding; an unbound one is pending.
    #[test]
    fn variables_follow_bindings() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        assert_eq!(get_simplification(&ctx, &Value::Var(v)), Simplification::Pending);
        ctx.bind(v, Value::Nat(4)).unwrap();
        assert_eq!(simplify(&ctx, &Value::Var(v)), Value::Nat(4));
        assert!(is_atomic(&ctx, &Value::Nat(4)));
    }

    /// A memoized node is computed once while its inputs are unchanged.
    #[test]
    fn memoization_across_calls() {
        let ctx = Context::new();
        let sum = Value::addition(Value::Nat(2), Value::Nat(3));
        let key = sum.memo_key().unwrap();
        assert_eq!(simplify(&ctx, &sum), Value::Nat(5));
        assert_eq!(simplify(&ctx, &sum), Value::Nat(5));
        assert_eq!(ctx.compute_count(key), 1);
        assert!(ctx.metrics().memo_hits >= 1);
    }

    /// Binding an observed variable invalidates the cached classification.
    #[test]
    fn binding_invalidates_memo() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        let sum = Value::addition(Value::Var(v), Value::Nat(1));
        let key = sum.memo_key().unwrap();
        assert_eq!(get_simplification(&ctx, &sum), Simplification::Pending);
        ctx.bind(v, Value::Nat(1)).unwrap();
        assert_eq!(simplify(&ctx, &sum), Value::Nat(2));
        assert_eq!(ctx.compute_count(key), 2);
    }

    /// Undo restores the pending classification.
    #[test]
    fn undo_invalidates_memo() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        let sum = Value::addition(Value::Nat(1), Value::Var(v));
        let ((), snapshot) = ctx.transaction(|ctx| ctx.bind(v, Value::Nat(6))).unwrap();
        assert_eq!(simplify(&ctx, &sum), Value::Nat(7));
        snapshot.undo(&ctx);
        assert_eq!(get_simplification(&ctx, &sum), Simplification::Pending);
    }

    #[test]
    fn step_limit_is_reported() {
        let ctx = Context::with_config(EngineConfig {
            max_simplify_steps: 1,
            ..EngineConfig::default()
        });
        let a = ctx.fresh::<Value>();
        let b = ctx.fresh::<Value>();
        ctx.bind(a, Value::Var(b)).unwrap();
        ctx.bind(b, Value::Unit).unwrap();
        let err = try_simplify(&ctx, &Value::Var(a)).unwrap_err();
        assert!(!err.is_recoverable());
        // The last term reached, not the starting one.
        assert_eq!(simplify(&ctx, &Value::Var(a)), Value::Var(b));
    }

    fn nested_sum(leaves: &[u32]) -> Value {
        leaves
            .iter()
            .map(|n| Value::Nat(u64::from(*n)))
            .reduce(Value::addition)
            .unwrap_or(Value::Nat(0))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// simplify(simplify(x)) == simplify(x)
        #[test]
        fn simplify_is_idempotent(leaves in prop::collection::vec(0u32..1000, 1..8)) {
            let ctx = Context::new();
            let sum = nested_sum(&leaves);
            let once = simplify(&ctx, &sum);
            let twice = simplify(&ctx, &once);
            prop_assert_eq!(&once, &twice);
            let total: u64 = leaves.iter().map(|n| u64::from(*n)).sum();
            prop_assert_eq!(once, Value::Nat(total));
        }
    }
}
