//! Arithmetic constraints over natural-number values.
//!
//! Each factory waits until the operands it needs are naturals, then either
//! matches the result or raises an arithmetic mismatch.

use super::ConstraintFactory;
use crate::context::Context;
use crate::domain::value::Value;
use crate::domain::Render;
use crate::error::{Mismatch, MismatchKind, Result};
use crate::matching::must_match;
use crate::normalize::simplify;

/// The natural `value` stands for, `None` while unknown.
///
/// # Errors
/// A value that can no longer become a natural.
fn natural(ctx: &Context, value: &Value) -> Result<Option<u64>> {
    match simplify(ctx, value) {
        Value::Nat(n) => Ok(Some(n)),
        Value::Var(_) | Value::Addition(_) => Ok(None),
        other => Err(Mismatch::message(
            MismatchKind::Arithmetic,
            format!("{} is not a natural number", other.render(ctx)),
        )
        .into()),
    }
}

/// `sum = left + right`
pub fn addition(ctx: &Context, sum: Value, left: Value, right: Value) -> ConstraintFactory {
    let description = format!("{} = {} + {}", sum.render(ctx), left.render(ctx), right.render(ctx));
    let total = Value::addition(left, right);
    ConstraintFactory::new(description, move |ctx| {
        Ok(must_match(ctx, &sum, &total, Some("sum"))?.is_empty())
    })
}

/// `product = left * right`
pub fn multiplication(ctx: &Context, product: Value, left: Value, right: Value) -> ConstraintFactory {
    let description = format!("{} = {} * {}", product.render(ctx), left.render(ctx), right.render(ctx));
    ConstraintFactory::new(description, move |ctx| {
        let (Some(l), Some(r)) = (natural(ctx, &left)?, natural(ctx, &right)?) else {
            return Ok(false);
        };
        let value = l
            .checked_mul(r)
            .ok_or_else(|| Mismatch::message(MismatchKind::Arithmetic, "natural number overflow"))?;
        Ok(must_match(ctx, &product, &Value::Nat(value), Some("product"))?.is_empty())
    })
}

/// `quotient = dividend / divisor`, rounding down.
///
/// A divisor known to be zero fails immediately, even before the dividend
/// is known.
pub fn division(ctx: &Context, quotient: Value, dividend: Value, divisor: Value) -> ConstraintFactory {
    let description = format!(
        "{} = {} / {}",
        quotient.render(ctx),
        dividend.render(ctx),
        divisor.render(ctx)
    );
    ConstraintFactory::new(description, move |ctx| {
        let d = natural(ctx, &divisor)?;
        if d == Some(0) {
            return Err(Mismatch::message(MismatchKind::Arithmetic, "division by zero").into());
        }
        let (Some(n), Some(d)) = (natural(ctx, &dividend)?, d) else {
            return Ok(false);
        };
        Ok(must_match(ctx, &quotient, &Value::Nat(n / d), Some("quotient"))?.is_empty())
    })
}

/// `left ≤ right`
pub fn less_or_equal(ctx: &Context, left: Value, right: Value) -> ConstraintFactory {
    let description = format!("{} ≤ {}", left.render(ctx), right.render(ctx));
    ConstraintFactory::new(description, move |ctx| {
        let (Some(l), Some(r)) = (natural(ctx, &left)?, natural(ctx, &right)?) else {
            return Ok(false);
        };
        if l <= r {
            Ok(true)
        } else {
            Err(Mismatch::message(MismatchKind::Arithmetic, format!("{} is greater than {}", l, r)).into())
        }
    })
}

/// `result = (left = right)` for naturals.
pub fn equality(ctx: &Context, result: Value, left: Value, right: Value) -> ConstraintFactory {
    let description = format!("{} = ({} = {})", result.render(ctx), left.render(ctx), right.render(ctx));
    ConstraintFactory::new(description, move |ctx| {
        let (Some(l), Some(r)) = (natural(ctx, &left)?, natural(ctx, &right)?) else {
            return Ok(false);
        };
        Ok(must_match(ctx, &result, &Value::Bool(l == r), Some("comparison"))?.is_empty())
    })
}
