//! External effects: the sequence of I/O events a computation performs.

use super::value::Value;
use super::{term_domain, Render};
use crate::annotate::Annotated;
use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::{Keyed, MetaId, MetaVar, NodeKey, SymbolClass};
use crate::error::{MismatchKind, Result};
use crate::matching::{mismatch_error, must_match, MatchOutcome, Unify};
use crate::normalize::{simplify, Simplifiable, Simplification};
use std::rc::Rc;

/// One I/O event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Read(Value),
    Write(Value),
}

impl Render for Event {
    fn render(&self, ctx: &Context) -> String {
        match self {
            Event::Read(v) => format!("read {}", v.render(ctx)),
            Event::Write(v) => format!("write {}", v.render(ctx)),
        }
    }
}

/// An external effect, possibly containing meta-variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Var(MetaVar<Effect>),
    /// A concrete sequence of events; empty for a pure computation.
    Events(Rc<Vec<Event>>),
    /// `left · right`
    Concat(Rc<Keyed<(Effect, Effect)>>),
}

term_domain!(Effect, Effect, SymbolClass::Effect);

impl Effect {
    /// The empty effect.
    pub fn empty() -> Self {
        Effect::Events(Rc::new(Vec::new()))
    }

    pub fn events(events: Vec<Event>) -> Self {
        Effect::Events(Rc::new(events))
    }

    pub fn concat(left: Effect, right: Effect) -> Self {
        Effect::Concat(Rc::new(Keyed::new((left, right))))
    }
}

impl Render for Effect {
    fn render(&self, ctx: &Context) -> String {
        match simplify(ctx, self) {
            Effect::Var(var) => ctx.label(var),
            Effect::Events(events) if events.is_empty() => "∅".to_owned(),
            Effect::Events(events) => events.iter().map(|e| e.render(ctx)).collect::<Vec<_>>().join(" · "),
            Effect::Concat(parts) => {
                let (left, right) = parts.node();
                format!("{} · {}", left.render(ctx), right.render(ctx))
            }
        }
    }
}

impl Simplifiable for Effect {
    fn memo_key(&self) -> Option<NodeKey> {
        match self {
            Effect::Concat(parts) => Some(parts.key()),
            _ => None,
        }
    }

    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self> {
        match self {
            Effect::Var(var) => match ctx.lookup(*var) {
                Some(bound) => Simplification::success(bound),
                None => Simplification::Pending,
            },
            Effect::Events(_) => Simplification::Atomic,
            Effect::Concat(parts) => {
                let (left, right) = parts.node();
                let l = simplify(ctx, left);
                let r = simplify(ctx, right);
                let before = Some(Annotated::suppressed(self.clone()));
                if matches!(&l, Effect::Events(xs) if xs.is_empty()) {
                    return Simplification::Success { result: r, before };
                }
                if matches!(&r, Effect::Events(ys) if ys.is_empty()) {
                    return Simplification::Success { result: l, before };
                }
                if let (Effect::Events(xs), Effect::Events(ys)) = (&l, &r) {
                    let joined = xs.iter().chain(ys.iter()).cloned().collect();
                    return Simplification::Success {
                        result: Effect::events(joined),
                        before,
                    };
                }
                if l != *left || r != *right {
                    Simplification::success(Effect::concat(l, r))
                } else {
                    Simplification::Pending
                }
            }
        }
    }
}

/// Matches two event lists of equal length; `None` on a kind mismatch.
fn match_events(ctx: &Context, expected: &[Event], actual: &[Event]) -> Result<Option<Vec<ConstraintFactory>>> {
    let mut constraints = Vec::new();
    for (e, a) in expected.iter().zip(actual) {
        match (e, a) {
            (Event::Read(x), Event::Read(y)) | (Event::Write(x), Event::Write(y)) => {
                constraints.extend(must_match(ctx, x, y, Some("event"))?);
            }
            _ => return Ok(None),
        }
    }
    Ok(Some(constraints))
}

impl Unify for Effect {
    const KIND: MismatchKind = MismatchKind::Effect;

    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome> {
        match (expected, actual) {
            (Effect::Events(xs), Effect::Events(ys)) if xs.len() == ys.len() => {
                Ok(match match_events(ctx, xs, ys)? {
                    Some(constraints) => MatchOutcome::Matched(constraints),
                    None => MatchOutcome::Mismatch,
                })
            }
            _ => Ok(MatchOutcome::Mismatch),
        }
    }

    /// Splits a concrete sequence along a concatenation with a known prefix.
    fn match_pending(ctx: &Context, expected: &Self, actual: &Self) -> Result<Option<Vec<ConstraintFactory>>> {
        let (events, parts) = match (expected, actual) {
            (Effect::Events(xs), Effect::Concat(c)) | (Effect::Concat(c), Effect::Events(xs)) => (xs, c),
            _ => return Ok(None),
        };
        let (left, right) = parts.node();
        if events.is_empty() {
            let mut constraints = must_match(ctx, &Effect::empty(), left, None)?;
            constraints.extend(must_match(ctx, &Effect::empty(), right, None)?);
            return Ok(Some(constraints));
        }
        let prefix = match simplify(ctx, left) {
            Effect::Events(prefix) => prefix,
            _ => return Ok(None),
        };
        let mismatch = || mismatch_error(ctx, expected, actual, None);
        if prefix.len() > events.len() {
            return Err(mismatch());
        }
        let mut constraints = match match_events(ctx, &events[..prefix.len()], &prefix)? {
            Some(constraints) => constraints,
            None => return Err(mismatch()),
        };
        let rest = Effect::events(events[prefix.len()..].to_vec());
        constraints.extend(must_match(ctx, &rest, right, None)?);
        Ok(Some(constraints))
    }

    fn occurs(ctx: &Context, var: MetaId, term: &Self) -> bool {
        match simplify(ctx, term) {
            Effect::Var(other) => other.id() == var,
            Effect::Events(events) => events.iter().any(|event| match event {
                Event::Read(value) | Event::Write(value) => Value::occurs(ctx, var, value),
            }),
            Effect::Concat(parts) => {
                let (left, right) = parts.node();
                Self::occurs(ctx, var, left) || Self::occurs(ctx, var, right)
            }
        }
    }
}
