//! Layered finite maps: signatures, environments and stores.
//!
//! A mapping is a basic list of entries, a layering `left, right` in which
//! `right` shadows `left`, or a meta-variable. Keys may themselves be
//! unresolved (a store address still being computed), so lookups answer
//! found, invalid key, or pending when an unresolved key could alias.
//!
//! # Invariants
//! - A basic mapping never holds two equal concrete keys.
//! - Layering is resolved lazily: `left, right` simplifies to one basic
//!   mapping once both sides are basic with concrete keys; an empty side
//!   simplifies away.
//! - Comparing two mappings either decides now or defers the entire
//!   comparison as one constraint.

use crate::annotate::Annotated;
use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::{Keyed, MetaId, MetaVar, NodeKey, SymbolClass};
use crate::domain::ast::Identifier;
use crate::domain::ty::Type;
use crate::domain::value::Value;
use crate::domain::{term_domain, Domain, Render};
use crate::error::{EngineError, Mismatch, MismatchKind, Result};
use crate::matching::{defer, must_match, MatchOutcome, Unify};
use crate::normalize::{is_atomic, simplify, Simplifiable, Simplification};
use std::fmt;
use std::rc::Rc;

/// Identifier → Type
pub type Signature = Mapping<Identifier, Type>;
/// Identifier → Value
pub type Environment = Mapping<Identifier, Value>;
/// Address → Value
pub type Store = Mapping<Value, Value>;

/// A mapping key.
pub trait MapKey: Clone + PartialEq + fmt::Debug + Render + 'static {
    /// Resolves the key as far as the current bindings allow.
    fn resolve(&self, ctx: &Context) -> Self;

    /// Can the resolved key no longer change?
    fn is_concrete(&self, ctx: &Context) -> bool;

    /// Does `var` occur inside the key?
    fn occurs(&self, ctx: &Context, var: MetaId) -> bool;
}

impl MapKey for Identifier {
    fn resolve(&self, _ctx: &Context) -> Self {
        self.clone()
    }

    fn is_concrete(&self, _ctx: &Context) -> bool {
        true
    }

    fn occurs(&self, _ctx: &Context, _var: MetaId) -> bool {
        false
    }
}

impl MapKey for Value {
    fn resolve(&self, ctx: &Context) -> Self {
        simplify(ctx, self)
    }

    fn is_concrete(&self, ctx: &Context) -> bool {
        is_atomic(ctx, self)
    }

    fn occurs(&self, ctx: &Context, var: MetaId) -> bool {
        <Value as Unify>::occurs(ctx, var, self)
    }
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    Found(V),
    /// An unresolved key or mapping might still provide the entry.
    Pending,
    InvalidKey,
}

/// A finite map, possibly layered and possibly unresolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping<K, V> {
    Var(MetaVar<Mapping<K, V>>),
    Basic(Rc<Vec<(K, V)>>),
    /// `left, right`: `right` shadows `left`.
    Comma(Rc<Keyed<(Mapping<K, V>, Mapping<K, V>)>>),
}

macro_rules! mapping_domain {
    ($key:ty, $value:ty, $variant:ident) => {
        term_domain!(Mapping<$key, $value>, $variant, SymbolClass::$variant);

        impl Render for Mapping<$key, $value> {
            fn render(&self, ctx: &Context) -> String {
                render_mapping(self, ctx)
            }
        }
    };
}

mapping_domain!(Identifier, Type, Signature);
mapping_domain!(Identifier, Value, Environment);
mapping_domain!(Value, Value, Store);

impl<K, V> Mapping<K, V> {
    /// The empty mapping.
    pub fn empty() -> Self {
        Mapping::Basic(Rc::new(Vec::new()))
    }

    pub fn singleton(key: K, value: V) -> Self {
        Mapping::Basic(Rc::new(vec![(key, value)]))
    }

    /// `left, right`
    pub fn comma(left: Self, right: Self) -> Self {
        Mapping::Comma(Rc::new(Keyed::new((left, right))))
    }

    fn is_empty_basic(&self) -> bool {
        matches!(self, Mapping::Basic(entries) if entries.is_empty())
    }
}

impl<K, V> Mapping<K, V>
where
    K: MapKey,
    V: Unify,
    Self: Domain,
{
    /// Builds a basic mapping.
    ///
    /// # Errors
    /// Two equal concrete keys are an invariant violation.
    pub fn basic(ctx: &Context, entries: Vec<(K, V)>) -> Result<Self> {
        let mut seen: Vec<K> = Vec::new();
        for (key, _) in &entries {
            let key = key.resolve(ctx);
            if !key.is_concrete(ctx) {
                continue;
            }
            if seen.contains(&key) {
                return Err(EngineError::invariant(format!(
                    "duplicate key {} in mapping",
                    key.render(ctx)
                )));
            }
            seen.push(key);
        }
        Ok(Mapping::Basic(Rc::new(entries)))
    }

    /// Looks up `key`, right layers first.
    pub fn lookup(&self, ctx: &Context, key: &K) -> Lookup<V> {
        match self {
            Mapping::Var(var) => match ctx.lookup(*var) {
                Some(bound) => bound.lookup(ctx, key),
                None => Lookup::Pending,
            },
            Mapping::Basic(entries) => {
                let key = key.resolve(ctx);
                let key_concrete = key.is_concrete(ctx);
                let mut may_alias = false;
                for (k, v) in entries.iter() {
                    let k = k.resolve(ctx);
                    if k == key {
                        return Lookup::Found(v.clone());
                    }
                    if !key_concrete || !k.is_concrete(ctx) {
                        may_alias = true;
                    }
                }
                if may_alias {
                    Lookup::Pending
                } else {
                    Lookup::InvalidKey
                }
            }
            Mapping::Comma(parts) => {
                let (left, right) = parts.node();
                match right.lookup(ctx, key) {
                    Lookup::InvalidKey => left.lookup(ctx, key),
                    found_or_pending => found_or_pending,
                }
            }
        }
    }

    /// All keys, or `None` while any part is unresolved.
    pub fn keys(&self, ctx: &Context) -> Option<Vec<K>> {
        match self {
            Mapping::Var(var) => ctx.lookup(*var).and_then(|bound| bound.keys(ctx)),
            Mapping::Basic(entries) => entries
                .iter()
                .map(|(k, _)| {
                    let k = k.resolve(ctx);
                    k.is_concrete(ctx).then_some(k)
                })
                .collect(),
            Mapping::Comma(parts) => {
                let (left, right) = parts.node();
                let mut keys = left.keys(ctx)?;
                for key in right.keys(ctx)? {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                Some(keys)
            }
        }
    }

    /// Emptiness, or `None` while any part is unresolved.
    pub fn is_empty(&self, ctx: &Context) -> Option<bool> {
        match self {
            Mapping::Var(var) => ctx.lookup(*var).and_then(|bound| bound.is_empty(ctx)),
            Mapping::Basic(entries) => Some(entries.is_empty()),
            Mapping::Comma(parts) => {
                let (left, right) = parts.node();
                Some(left.is_empty(ctx)? && right.is_empty(ctx)?)
            }
        }
    }
}

/// Merges two basic layers, `right` shadowing `left`; `None` unless every
/// key is concrete.
fn merge<K: MapKey, V: Clone>(ctx: &Context, left: &[(K, V)], right: &[(K, V)]) -> Option<Vec<(K, V)>> {
    let resolve = |entries: &[(K, V)]| -> Option<Vec<(K, V)>> {
        entries
            .iter()
            .map(|(k, v)| {
                let k = k.resolve(ctx);
                k.is_concrete(ctx).then(|| (k, v.clone()))
            })
            .collect()
    };
    let left = resolve(left)?;
    let right = resolve(right)?;
    let mut merged: Vec<(K, V)> = left
        .into_iter()
        .filter(|(k, _)| !right.iter().any(|(r, _)| r == k))
        .collect();
    merged.extend(right);
    Some(merged)
}

impl<K, V> Simplifiable for Mapping<K, V>
where
    K: MapKey,
    V: Unify,
    Self: Domain,
{
    fn memo_key(&self) -> Option<NodeKey> {
        match self {
            Mapping::Comma(parts) => Some(parts.key()),
            _ => None,
        }
    }

    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self> {
        match self {
            Mapping::Var(var) => match ctx.lookup(*var) {
                Some(bound) => Simplification::success(bound),
                None => Simplification::Pending,
            },
            Mapping::Basic(_) => Simplification::Atomic,
            Mapping::Comma(parts) => {
                let (left, right) = parts.node();
                let l = simplify(ctx, left);
                let r = simplify(ctx, right);
                let before = Some(Annotated::layer(self.clone(), parts.key()));
                if l.is_empty_basic() {
                    return Simplification::Success { result: r, before };
                }
                if r.is_empty_basic() {
                    return Simplification::Success { result: l, before };
                }
                if let (Mapping::Basic(le), Mapping::Basic(re)) = (&l, &r) {
                    if let Some(merged) = merge(ctx, le, re) {
                        return Simplification::Success {
                            result: Mapping::Basic(Rc::new(merged)),
                            before,
                        };
                    }
                }
                if l != *left || r != *right {
                    Simplification::success(Mapping::comma(l, r))
                } else {
                    Simplification::Pending
                }
            }
        }
    }
}

impl<K, V> Unify for Mapping<K, V>
where
    K: MapKey,
    V: Unify,
    Self: Domain,
{
    const KIND: MismatchKind = MismatchKind::Mapping;

    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome> {
        Ok(MatchOutcome::Matched(match_keyed(ctx, expected, actual)?))
    }

    fn match_pending(ctx: &Context, expected: &Self, actual: &Self) -> Result<Option<Vec<ConstraintFactory>>> {
        match_keyed(ctx, expected, actual).map(Some)
    }

    fn occurs(ctx: &Context, var: MetaId, term: &Self) -> bool {
        match simplify(ctx, term) {
            Mapping::Var(other) => other.id() == var,
            Mapping::Basic(entries) => entries
                .iter()
                .any(|(key, value)| key.occurs(ctx, var) || V::occurs(ctx, var, value)),
            Mapping::Comma(layers) => {
                let (left, right) = layers.node();
                Self::occurs(ctx, var, left) || Self::occurs(ctx, var, right)
            }
        }
    }
}

/// Key-wise comparison of two mappings.
fn match_keyed<K, V>(ctx: &Context, expected: &Mapping<K, V>, actual: &Mapping<K, V>) -> Result<Vec<ConstraintFactory>>
where
    K: MapKey,
    V: Unify,
    Mapping<K, V>: Domain,
{
    let retry = || vec![defer(ctx, expected.clone(), actual.clone(), None)];
    let (Some(mut keys), Some(actual_keys)) = (expected.keys(ctx), actual.keys(ctx)) else {
        return Ok(retry());
    };
    for key in actual_keys {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    let mut deferred = false;
    for key in &keys {
        match (expected.lookup(ctx, key), actual.lookup(ctx, key)) {
            (Lookup::InvalidKey, _) | (_, Lookup::InvalidKey) => {
                return Err(Mismatch {
                    kind: MismatchKind::Mapping,
                    expected: expected.render(ctx),
                    actual: actual.render(ctx),
                    object: None,
                    message: Some(format!(
                        "key {} is not in both {} and {}",
                        key.render(ctx),
                        expected.render(ctx),
                        actual.render(ctx)
                    )),
                }
                .into());
            }
            (Lookup::Found(e), Lookup::Found(a)) => {
                let object = format!("entry {}", key.render(ctx));
                if !must_match(ctx, &e, &a, Some(object.as_str()))?.is_empty() {
                    deferred = true;
                }
            }
            _ => deferred = true,
        }
    }
    Ok(if deferred { retry() } else { Vec::new() })
}

fn render_mapping<K, V>(mapping: &Mapping<K, V>, ctx: &Context) -> String
where
    K: MapKey,
    V: Unify,
    Mapping<K, V>: Domain,
{
    match simplify(ctx, mapping) {
        Mapping::Var(var) => ctx.label(var),
        Mapping::Basic(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} ↦ {}", k.render(ctx), v.render(ctx)))
                .collect();
            format!("[{}]", entries.join(", "))
        }
        Mapping::Comma(parts) => {
            let (left, right) = parts.node();
            format!("{}, {}", left.render(ctx), right.render(ctx))
        }
    }
}

fn missing_key<K: MapKey, V>(ctx: &Context, mapping: &Mapping<K, V>, key: &K) -> EngineError
where
    Mapping<K, V>: Render,
{
    Mismatch::message(
        MismatchKind::Mapping,
        format!("{} is not bound in {}", key.render(ctx), mapping.render(ctx)),
    )
    .into()
}

/// `key ∈ dom(mapping)`
pub fn mapping_must_contain_key<K, V>(ctx: &Context, mapping: &Mapping<K, V>, key: &K) -> Result<Vec<ConstraintFactory>>
where
    K: MapKey,
    V: Unify,
    Mapping<K, V>: Domain,
{
    match mapping.lookup(ctx, key) {
        Lookup::Found(_) => Ok(Vec::new()),
        Lookup::InvalidKey => Err(missing_key(ctx, mapping, key)),
        Lookup::Pending => {
            let description = format!("{} ∈ dom({})", key.render(ctx), mapping.render(ctx));
            let (mapping, key) = (mapping.clone(), key.clone());
            Ok(vec![ConstraintFactory::new(description, move |ctx| {
                match mapping.lookup(ctx, &key) {
                    Lookup::Found(_) => Ok(true),
                    Lookup::Pending => Ok(false),
                    Lookup::InvalidKey => Err(missing_key(ctx, &mapping, &key)),
                }
            })])
        }
    }
}

/// `key ∉ dom(mapping)`
pub fn mapping_must_not_contain_key<K, V>(
    ctx: &Context,
    mapping: &Mapping<K, V>,
    key: &K,
) -> Result<Vec<ConstraintFactory>>
where
    K: MapKey,
    V: Unify,
    Mapping<K, V>: Domain,
{
    let present = |ctx: &Context, mapping: &Mapping<K, V>, key: &K| -> EngineError {
        Mismatch::message(
            MismatchKind::Mapping,
            format!("{} is already bound in {}", key.render(ctx), mapping.render(ctx)),
        )
        .into()
    };
    match mapping.lookup(ctx, key) {
        Lookup::InvalidKey => Ok(Vec::new()),
        Lookup::Found(_) => Err(present(ctx, mapping, key)),
        Lookup::Pending => {
            let description = format!("{} ∉ dom({})", key.render(ctx), mapping.render(ctx));
            let (mapping, key) = (mapping.clone(), key.clone());
            Ok(vec![ConstraintFactory::new(description, move |ctx| {
                match mapping.lookup(ctx, &key) {
                    Lookup::InvalidKey => Ok(true),
                    Lookup::Pending => Ok(false),
                    Lookup::Found(_) => Err(present(ctx, &mapping, &key)),
                }
            })])
        }
    }
}

/// `mapping(key) = expected`
pub fn mapping_lookup_must_match<K, V>(
    ctx: &Context,
    mapping: &Mapping<K, V>,
    key: &K,
    expected: &V,
) -> Result<Vec<ConstraintFactory>>
where
    K: MapKey,
    V: Unify,
    Mapping<K, V>: Domain,
{
    let object = format!("{}({})", mapping.render(ctx), key.render(ctx));
    match mapping.lookup(ctx, key) {
        Lookup::Found(actual) => must_match(ctx, expected, &actual, Some(object.as_str())),
        Lookup::InvalidKey => Err(missing_key(ctx, mapping, key)),
        Lookup::Pending => {
            let description = format!("{} = {}", object, expected.render(ctx));
            let (mapping, key, expected) = (mapping.clone(), key.clone(), expected.clone());
            Ok(vec![ConstraintFactory::new(description, move |ctx| {
                match mapping.lookup(ctx, &key) {
                    Lookup::Found(actual) => Ok(must_match(ctx, &expected, &actual, Some(object.as_str()))?.is_empty()),
                    Lookup::Pending => Ok(false),
                    Lookup::InvalidKey => Err(missing_key(ctx, &mapping, &key)),
                }
            })])
        }
    }
}

/// Compares two mappings key by key.
pub fn mappings_must_match<K, V>(
    ctx: &Context,
    expected: &Mapping<K, V>,
    actual: &Mapping<K, V>,
    object: Option<&str>,
) -> Result<Vec<ConstraintFactory>>
where
    K: MapKey,
    V: Unify,
    Mapping<K, V>: Domain,
{
    must_match(ctx, expected, actual, object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::Expression;
    use proptest::prelude::*;

    fn x() -> Identifier {
        Identifier::new("x")
    }

    /// The right layer shadows the left one.
    #[test]
    fn shadowing() {
        let ctx = Context::new();
        let env: Environment = Mapping::comma(
            Mapping::singleton(x(), Value::Nat(1)),
            Mapping::singleton(x(), Value::Nat(2)),
        );
        assert_eq!(env.lookup(&ctx, &x()), Lookup::Found(Value::Nat(2)));
        assert_eq!(simplify(&ctx, &env), Mapping::singleton(x(), Value::Nat(2)));
    }

    #[test]
    fn duplicate_concrete_key_is_fatal() {
        let ctx = Context::new();
        let err = Environment::basic(&ctx, vec![(x(), Value::Nat(1)), (x(), Value::Nat(2))]).unwrap_err();
        assert!(matches!(err, EngineError::Invariant(_)));
    }

    /// Unresolved store addresses are not duplicates, and make lookups pending.
    #[test]
    fn unresolved_keys_alias() {
        let ctx = Context::new();
        let a = ctx.fresh::<Value>();
        let store = Store::basic(&ctx, vec![(Value::Var(a), Value::Unit), (Value::Address(1), Value::Nat(3))]).unwrap();
        assert_eq!(store.lookup(&ctx, &Value::Address(1)), Lookup::Found(Value::Nat(3)));
        assert_eq!(store.lookup(&ctx, &Value::Address(2)), Lookup::Pending);
        assert_eq!(store.keys(&ctx), None);
        ctx.bind(a, Value::Address(0)).unwrap();
        assert_eq!(store.lookup(&ctx, &Value::Address(2)), Lookup::InvalidKey);
        assert_eq!(store.keys(&ctx), Some(vec![Value::Address(0), Value::Address(1)]));
    }

    #[test]
    fn unresolved_layers_are_unknown() {
        let ctx = Context::new();
        let e = ctx.fresh::<Environment>();
        let env = Mapping::comma(Mapping::Var(e), Mapping::singleton(x(), Value::Unit));
        assert_eq!(env.is_empty(&ctx), None);
        assert_eq!(env.keys(&ctx), None);
        assert_eq!(env.lookup(&ctx, &x()), Lookup::Found(Value::Unit));
        assert_eq!(env.lookup(&ctx, &Identifier::new("y")), Lookup::Pending);
        assert_eq!(env.render(&ctx), "E1, [x ↦ ()]");
        ctx.bind(e, Mapping::empty()).unwrap();
        assert_eq!(env.is_empty(&ctx), Some(false));
        assert_eq!(simplify(&ctx, &env), Mapping::singleton(x(), Value::Unit));
    }

    /// An atomic mapping matches itself and an equal copy.
    #[test]
    fn self_match() {
        let ctx = Context::new();
        let sig = Signature::basic(&ctx, vec![(x(), Type::Nat), (Identifier::new("y"), Type::Bool)]).unwrap();
        assert!(mappings_must_match(&ctx, &sig, &sig, None).unwrap().is_empty());
        let reordered = Signature::basic(&ctx, vec![(Identifier::new("y"), Type::Bool), (x(), Type::Nat)]).unwrap();
        assert!(mappings_must_match(&ctx, &sig, &reordered, None).unwrap().is_empty());
    }

    /// `E1 = E1, [x ↦ 1]` and `v1 = ⟨y, y, [x ↦ v1]⟩` have no finite solution.
    #[test]
    fn self_reference_is_rejected() {
        let ctx = Context::new();
        let env = ctx.fresh::<Environment>();
        let layered = Mapping::comma(Mapping::Var(env), Environment::singleton(x(), Value::Nat(1)));
        let err = must_match(&ctx, &Mapping::Var(env), &layered, None).unwrap_err();
        assert_eq!(err.as_mismatch().unwrap().kind, MismatchKind::Mapping);
        assert!(!ctx.is_bound(env));

        let v = ctx.fresh::<Value>();
        let y = Identifier::new("y");
        let closure = Value::closure(y.clone(), Expression::Ident(y), Environment::singleton(x(), Value::Var(v)));
        let err = must_match(&ctx, &Value::Var(v), &closure, None).unwrap_err();
        assert!(err.as_mismatch().unwrap().message.as_deref().unwrap().contains("occurs"));
        assert!(!ctx.is_bound(v));
    }

    #[test]
    fn pointwise_match_binds_values() {
        let ctx = Context::new();
        let t = ctx.fresh::<Type>();
        let expected = Signature::singleton(x(), Type::Var(t));
        let actual = Signature::singleton(x(), Type::arrow(Type::Nat, Type::Nat));
        assert!(mappings_must_match(&ctx, &expected, &actual, None).unwrap().is_empty());
        assert_eq!(ctx.lookup(t), Some(Type::arrow(Type::Nat, Type::Nat)));
    }

    #[test]
    fn missing_key_is_mismatch() {
        let ctx = Context::new();
        let a = Signature::singleton(x(), Type::Nat);
        let b = Signature::singleton(Identifier::new("y"), Type::Nat);
        let err = mappings_must_match(&ctx, &a, &b, None).unwrap_err();
        assert_eq!(err.as_mismatch().unwrap().kind, MismatchKind::Mapping);
    }

    /// An unresolved layer defers the whole comparison.
    #[test]
    fn unresolved_comparison_defers() {
        let ctx = Context::new();
        let g = ctx.fresh::<Signature>();
        let h = ctx.fresh::<Signature>();
        let expected = Mapping::comma(Mapping::Var(g), Signature::singleton(x(), Type::Nat));
        let actual = Mapping::comma(Mapping::Var(h), Signature::singleton(x(), Type::Nat));
        let factories = mappings_must_match(&ctx, &expected, &actual, None).unwrap();
        assert_eq!(factories.len(), 1);
        let constraint = factories[0].build(&ctx);
        assert!(!constraint.check(&ctx).unwrap());
        ctx.bind(g, Mapping::empty()).unwrap();
        ctx.bind(h, Mapping::empty()).unwrap();
        assert!(constraint.check(&ctx).unwrap());
    }

    #[test]
    fn key_membership() {
        let ctx = Context::new();
        let env = Environment::singleton(x(), Value::Nat(0));
        assert!(mapping_must_contain_key(&ctx, &env, &x()).unwrap().is_empty());
        assert!(mapping_must_contain_key(&ctx, &env, &Identifier::new("y")).is_err());
        assert!(mapping_must_not_contain_key(&ctx, &env, &Identifier::new("y")).unwrap().is_empty());
        assert!(mapping_must_not_contain_key(&ctx, &env, &x()).is_err());

        let e = ctx.fresh::<Environment>();
        let pending = mapping_must_contain_key(&ctx, &Mapping::Var(e), &x()).unwrap();
        let constraint = pending[0].build(&ctx);
        assert!(!constraint.check(&ctx).unwrap());
        ctx.bind(e, Mapping::empty()).unwrap();
        assert!(constraint.check(&ctx).is_err());
    }

    #[test]
    fn lookup_must_match_binds() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        let env = Environment::singleton(x(), Value::Char('q'));
        assert!(mapping_lookup_must_match(&ctx, &env, &x(), &Value::Var(v)).unwrap().is_empty());
        assert_eq!(ctx.lookup(v), Some(Value::Char('q')));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Every stored entry is found again, and nothing else is.
        #[test]
        fn lookup_round_trip(entries in prop::collection::btree_map("[a-z]{1,4}", 0u64..1000, 0..12)) {
            let ctx = Context::new();
            let list: Vec<(Identifier, Value)> = entries
                .iter()
                .map(|(k, v)| (Identifier::new(k), Value::Nat(*v)))
                .collect();
            let env = Environment::basic(&ctx, list).unwrap();
            for (k, v) in &entries {
                prop_assert_eq!(env.lookup(&ctx, &Identifier::new(k)), Lookup::Found(Value::Nat(*v)));
            }
            prop_assert_eq!(env.lookup(&ctx, &Identifier::new("UNUSED")), Lookup::InvalidKey);
            prop_assert_eq!(env.keys(&ctx).map(|keys| keys.len()), Some(entries.len()));
        }
    }
}
