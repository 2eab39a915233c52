//! Runtime values of the object language.
//!
//! Besides the usual values, the domain has a symbolic `Addition(v, v)`,
//! introduced by arithmetic rules before the operands are known. It
//! simplifies to a natural once both sides are naturals, and matching a
//! known natural against it can solve for one unknown addend.

use super::ast::{Datum, Expression, Identifier};
use super::{render_var, term_domain, Render};
use crate::annotate::Annotated;
use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::{Keyed, MetaId, MetaVar, NodeKey, SymbolClass};
use crate::error::{EngineError, Mismatch, MismatchKind, Result};
use crate::mapping::Environment;
use crate::matching::{expressions_must_match, must_match, MatchOutcome, Unify};
use crate::normalize::{simplify, Simplifiable, Simplification};
use std::rc::Rc;

/// A value, possibly containing meta-variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Var(MetaVar<Value>),
    Bool(bool),
    Nat(u64),
    Char(char),
    Unit,
    Pair(Rc<(Value, Value)>),
    Closure(Rc<Closure>),
    RecClosure(Rc<RecClosure>),
    /// A store location.
    Address(u32),
    /// `left + right`, not yet computed.
    Addition(Rc<Keyed<(Value, Value)>>),
}

term_domain!(Value, Value, SymbolClass::Value);

/// `⟨x, e, E⟩`
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub param: Identifier,
    pub body: Expression,
    pub env: Environment,
}

/// `⟨f, x, e, E⟩`: a closure that can refer to itself as `f`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecClosure {
    pub name: Identifier,
    pub param: Identifier,
    pub body: Expression,
    pub env: Environment,
}

impl Value {
    pub fn pair(left: Value, right: Value) -> Self {
        Value::Pair(Rc::new((left, right)))
    }

    pub fn addition(left: Value, right: Value) -> Self {
        Value::Addition(Rc::new(Keyed::new((left, right))))
    }

    pub fn closure(param: Identifier, body: Expression, env: Environment) -> Self {
        Value::Closure(Rc::new(Closure { param, body, env }))
    }

    /// # Errors
    /// A recursive closure whose name equals its parameter is an invariant
    /// violation: the parameter would shadow the recursive binding.
    pub fn rec_closure(name: Identifier, param: Identifier, body: Expression, env: Environment) -> Result<Self> {
        if name == param {
            return Err(EngineError::invariant(format!(
                "recursive closure name `{}` collides with its parameter",
                name
            )));
        }
        Ok(Value::RecClosure(Rc::new(RecClosure {
            name,
            param,
            body,
            env,
        })))
    }

    /// The value of a natural literal; a placeholder becomes a fresh variable.
    pub fn numeral(ctx: &Context, datum: &Datum<u64>) -> Self {
        match datum {
            Datum::Known(n) => Value::Nat(*n),
            Datum::Placeholder(_) => ctx.fresh_term(),
        }
    }

    /// The value of a character literal; a placeholder becomes a fresh variable.
    pub fn character(ctx: &Context, datum: &Datum<char>) -> Self {
        match datum {
            Datum::Known(c) => Value::Char(*c),
            Datum::Placeholder(_) => ctx.fresh_term(),
        }
    }

    pub fn as_nat(&self) -> Option<u64> {
        match self {
            Value::Nat(n) => Some(*n),
            _ => None,
        }
    }

    /// Could this term still become a natural?
    fn may_be_nat(&self) -> bool {
        matches!(self, Value::Nat(_) | Value::Var(_) | Value::Addition(_))
    }
}

impl Render for Value {
    fn render(&self, ctx: &Context) -> String {
        match simplify(ctx, self) {
            Value::Var(var) => render_var(ctx, var),
            Value::Bool(b) => b.to_string(),
            Value::Nat(n) => n.to_string(),
            Value::Char(c) => format!("'{}'", c),
            Value::Unit => "()".to_owned(),
            Value::Pair(parts) => format!("({}, {})", parts.0.render(ctx), parts.1.render(ctx)),
            Value::Closure(c) => format!("⟨{}, {}, {}⟩", c.param, c.body.render(ctx), c.env.render(ctx)),
            Value::RecClosure(c) => format!(
                "⟨{}, {}, {}, {}⟩",
                c.name,
                c.param,
                c.body.render(ctx),
                c.env.render(ctx)
            ),
            Value::Address(a) => format!("ℓ{}", a),
            Value::Addition(sum) => {
                let (left, right) = sum.node();
                format!("{} + {}", left.render(ctx), right.render(ctx))
            }
        }
    }
}

impl Simplifiable for Value {
    fn memo_key(&self) -> Option<NodeKey> {
        match self {
            Value::Addition(sum) => Some(sum.key()),
            _ => None,
        }
    }

    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self> {
        match self {
            Value::Var(var) => match ctx.lookup(*var) {
                Some(bound) => Simplification::success(bound),
                None => Simplification::Pending,
            },
            Value::Addition(sum) => {
                let (left, right) = sum.node();
                let l = simplify(ctx, left);
                let r = simplify(ctx, right);
                if let (Value::Nat(a), Value::Nat(b)) = (&l, &r) {
                    return match a.checked_add(*b) {
                        Some(total) => Simplification::Success {
                            result: Value::Nat(total),
                            before: Some(Annotated::new(self.clone())),
                        },
                        None => Simplification::failure("natural number overflow"),
                    };
                }
                for operand in [&l, &r] {
                    if !operand.may_be_nat() {
                        return Simplification::Failure {
                            message: format!("{} is not a natural number", operand.render(ctx)),
                            partial: None,
                        };
                    }
                }
                if l != *left || r != *right {
                    Simplification::success(Value::addition(l, r))
                } else {
                    Simplification::Pending
                }
            }
            _ => Simplification::Atomic,
        }
    }
}

impl Unify for Value {
    const KIND: MismatchKind = MismatchKind::Value;

    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome> {
        let constraints: Vec<ConstraintFactory> = match (expected, actual) {
            (Value::Bool(e), Value::Bool(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (Value::Nat(e), Value::Nat(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (Value::Char(e), Value::Char(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (Value::Address(e), Value::Address(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (Value::Unit, Value::Unit) => Vec::new(),
            (Value::Pair(e), Value::Pair(a)) => {
                let mut constraints = must_match(ctx, &e.0, &a.0, None)?;
                constraints.extend(must_match(ctx, &e.1, &a.1, None)?);
                constraints
            }
            (Value::Closure(e), Value::Closure(a)) => {
                if e.param != a.param {
                    return Ok(MatchOutcome::Mismatch);
                }
                expressions_must_match(ctx, &e.body, &a.body)?;
                must_match(ctx, &e.env, &a.env, Some("closure environment"))?
            }
            (Value::RecClosure(e), Value::RecClosure(a)) => {
                if e.name != a.name || e.param != a.param {
                    return Ok(MatchOutcome::Mismatch);
                }
                expressions_must_match(ctx, &e.body, &a.body)?;
                must_match(ctx, &e.env, &a.env, Some("closure environment"))?
            }
            _ => return Ok(MatchOutcome::Mismatch),
        };
        Ok(MatchOutcome::Matched(constraints))
    }

    /// Solves `c = a + b` for one level of addition.
    fn match_pending(ctx: &Context, expected: &Self, actual: &Self) -> Result<Option<Vec<ConstraintFactory>>> {
        match (expected, actual) {
            (Value::Nat(total), Value::Addition(sum)) | (Value::Addition(sum), Value::Nat(total)) => {
                decompose(ctx, *total, sum)
            }
            _ => Ok(None),
        }
    }

    fn occurs(ctx: &Context, var: MetaId, term: &Self) -> bool {
        match simplify(ctx, term) {
            Value::Var(other) => other.id() == var,
            Value::Pair(parts) => Self::occurs(ctx, var, &parts.0) || Self::occurs(ctx, var, &parts.1),
            Value::Addition(sum) => {
                let (left, right) = sum.node();
                Self::occurs(ctx, var, left) || Self::occurs(ctx, var, right)
            }
            Value::Closure(c) => <Environment as Unify>::occurs(ctx, var, &c.env),
            Value::RecClosure(c) => <Environment as Unify>::occurs(ctx, var, &c.env),
            Value::Bool(_) | Value::Nat(_) | Value::Char(_) | Value::Unit | Value::Address(_) => false,
        }
    }
}

fn decompose(ctx: &Context, total: u64, sum: &Keyed<(Value, Value)>) -> Result<Option<Vec<ConstraintFactory>>> {
    let (left, right) = sum.node();
    if total == 0 {
        let mut constraints = must_match(ctx, &Value::Nat(0), left, None)?;
        constraints.extend(must_match(ctx, &Value::Nat(0), right, None)?);
        return Ok(Some(constraints));
    }
    let l = simplify(ctx, left);
    let r = simplify(ctx, right);
    let (known, other) = match (&l, &r) {
        (Value::Nat(n), _) => (*n, right),
        (_, Value::Nat(n)) => (*n, left),
        _ => return Ok(None),
    };
    if known > total {
        return Err(Mismatch::new(
            MismatchKind::Value,
            total.to_string(),
            format!("{} + {}", l.render(ctx), r.render(ctx)),
        )
        .into());
    }
    Ok(Some(must_match(ctx, &Value::Nat(total - known), other, None)?))
}
