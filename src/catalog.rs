//! Reference rules: naturals, identifiers and declarations, pairs.
//!
//! Evaluation rules thread the store left to right through their premises
//! and concatenate the premises' effects in the same order. Axioms leave the
//! store unchanged and have no effect.

use crate::constraint::{arith, ConstraintFactory};
use crate::context::Context;
use crate::domain::ast::{DeclCtor, Declaration, ExprCtor, Expression, Identifier};
use crate::domain::effect::Effect;
use crate::domain::ty::Type;
use crate::domain::value::Value;
use crate::error::{EngineError, Result};
use crate::mapping::{mapping_lookup_must_match, Environment, Mapping, Signature, Store};
use crate::matching::must_match;
use crate::rule::{build_builtin_application_rule, build_decl_rule, build_expr_rule, Builtin, Rule, RuleOutcome, Ruleset};
use crate::statement::{DeclEvaluation, Evaluation, ExpressionStatement, JudgmentKind, Statement};

/// All reference chapters.
pub fn ruleset() -> Ruleset {
    Ruleset::new()
        .chapter("Naturals", naturals())
        .chapter("Identifiers", identifiers())
        .chapter("Pairs", pairs())
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

fn shape_error(rule: &str, node: &impl std::fmt::Debug) -> EngineError {
    EngineError::invariant(format!("{} received {:?}", rule, node))
}

fn operands<'e>(rule: &str, node: &'e Expression) -> Result<(&'e Expression, &'e Expression)> {
    match node {
        Expression::Binary(_, parts) | Expression::Pair(parts) => Ok((&parts.0, &parts.1)),
        other => Err(shape_error(rule, other)),
    }
}

/// No effect, store unchanged.
fn pure(ctx: &Context, eval: &Evaluation) -> Result<Vec<ConstraintFactory>> {
    let mut constraints = must_match(ctx, &eval.result_store, &eval.store, Some("store"))?;
    constraints.extend(must_match(ctx, &eval.effect, &Effect::empty(), Some("effect"))?);
    Ok(constraints)
}

/// Premise `env, store ⊢ expr ⇓ value, result_store, ε` with a fresh `ε`.
fn evaluates(
    ctx: &Context,
    expr: &Expression,
    env: &Environment,
    store: Store,
    value: Value,
    result_store: Store,
) -> (Statement, Effect) {
    let effect: Effect = ctx.fresh_term();
    let premise = Statement::evaluation(
        expr.clone(),
        Evaluation {
            env: env.clone(),
            store,
            effect: effect.clone(),
            value,
            result_store,
        },
    );
    (premise, effect)
}

/// `left ⇓ v1` then `right ⇓ v2`, threading the store.
fn evaluates_both(
    ctx: &Context,
    eval: &Evaluation,
    left: &Expression,
    right: &Expression,
    v1: Value,
    v2: Value,
) -> Result<RuleOutcome> {
    let middle: Store = ctx.fresh_term();
    let (first, e1) = evaluates(ctx, left, &eval.env, eval.store.clone(), v1, middle.clone());
    let (second, e2) = evaluates(ctx, right, &eval.env, middle, v2, eval.result_store.clone());
    Ok(RuleOutcome::new()
        .premise(first)
        .premise(second)
        .with(must_match(ctx, &eval.effect, &Effect::concat(e1, e2), Some("effect"))?))
}

fn typed(expr: &Expression, signature: &Signature, ty: Type) -> Statement {
    Statement::typing(expr.clone(), signature.clone(), ty)
}

// ----------------------------------------------------------------------
// Naturals
// ----------------------------------------------------------------------

/// `e1 op e2 : result` with both operands `nat`.
fn typing_binary(id: &'static str, ctor: ExprCtor, result: Type) -> Rule {
    build_expr_rule(id, id, JudgmentKind::Typing, ctor, move |ctx, node, stmt| {
        let typing = stmt.typing()?;
        let (left, right) = operands(id, node)?;
        Ok(RuleOutcome::new()
            .premise(typed(left, &typing.signature, Type::Nat))
            .premise(typed(right, &typing.signature, Type::Nat))
            .with(must_match(ctx, &typing.ty, &result, Some("result type"))?))
    })
}

/// `e1 op e2` evaluated to naturals `v1`, `v2`, related to the value by
/// `relate(value, v1, v2)`.
fn evaluation_binary<F>(id: &'static str, ctor: ExprCtor, relate: F) -> Rule
where
    F: Fn(&Context, &ExpressionStatement, Value, Value) -> Result<Vec<ConstraintFactory>> + 'static,
{
    build_expr_rule(id, id, JudgmentKind::Evaluation, ctor, move |ctx, node, stmt| {
        let eval = stmt.evaluation()?;
        let (left, right) = operands(id, node)?;
        let v1: Value = ctx.fresh_term();
        let v2: Value = ctx.fresh_term();
        let outcome = evaluates_both(ctx, eval, left, right, v1.clone(), v2.clone())?;
        Ok(outcome.with(relate(ctx, stmt, v1, v2)?))
    })
}

pub fn naturals() -> Vec<Rule> {
    vec![
        build_expr_rule("T-Nat", "T-Nat", JudgmentKind::Typing, ExprCtor::Nat, |ctx, _, stmt| {
            Ok(RuleOutcome::new().with(must_match(ctx, &stmt.typing()?.ty, &Type::Nat, Some("type"))?))
        }),
        typing_binary("T-Plus", ExprCtor::Plus, Type::Nat),
        typing_binary("T-Monus", ExprCtor::Monus, Type::Nat),
        typing_binary("T-Times", ExprCtor::Times, Type::Nat),
        typing_binary("T-Div", ExprCtor::Div, Type::Nat),
        typing_binary("T-Equal", ExprCtor::Equal, Type::Bool),
        build_expr_rule("E-Nat", "E-Nat", JudgmentKind::Evaluation, ExprCtor::Nat, |ctx, node, stmt| {
            let eval = stmt.evaluation()?;
            let Expression::Nat(n) = node else {
                return Err(shape_error("E-Nat", node));
            };
            Ok(RuleOutcome::new()
                .with(must_match(ctx, &eval.value, &Value::numeral(ctx, n), Some("value"))?)
                .with(pure(ctx, eval)?))
        }),
        evaluation_binary("E-Plus", ExprCtor::Plus, |ctx, stmt, v1, v2| {
            must_match(ctx, &stmt.evaluation()?.value, &Value::addition(v1, v2), Some("value"))
        }),
        // n1 ∸ n2 = k where n1 = n2 + k
        build_expr_rule("E-Monus1", "E-Monus1", JudgmentKind::Evaluation, ExprCtor::Monus, |ctx, node, stmt| {
            let eval = stmt.evaluation()?;
            let (left, right) = operands("E-Monus1", node)?;
            let v2: Value = ctx.fresh_term();
            let k: Value = ctx.fresh_term();
            let outcome = evaluates_both(ctx, eval, left, right, Value::addition(v2.clone(), k.clone()), v2)?;
            Ok(outcome.with(must_match(ctx, &eval.value, &k, Some("value"))?))
        }),
        // n1 ∸ n2 = 0 where n2 = n1 + k
        build_expr_rule("E-Monus2", "E-Monus2", JudgmentKind::Evaluation, ExprCtor::Monus, |ctx, node, stmt| {
            let eval = stmt.evaluation()?;
            let (left, right) = operands("E-Monus2", node)?;
            let v1: Value = ctx.fresh_term();
            let k: Value = ctx.fresh_term();
            let outcome = evaluates_both(ctx, eval, left, right, v1.clone(), Value::addition(v1, k))?;
            Ok(outcome.with(must_match(ctx, &eval.value, &Value::Nat(0), Some("value"))?))
        }),
        evaluation_binary("E-Times", ExprCtor::Times, |ctx, stmt, v1, v2| {
            Ok(vec![arith::multiplication(ctx, stmt.evaluation()?.value.clone(), v1, v2)])
        }),
        evaluation_binary("E-Div", ExprCtor::Div, |ctx, stmt, v1, v2| {
            Ok(vec![arith::division(ctx, stmt.evaluation()?.value.clone(), v1, v2)])
        }),
        evaluation_binary("E-Equal", ExprCtor::Equal, |ctx, stmt, v1, v2| {
            Ok(vec![arith::equality(ctx, stmt.evaluation()?.value.clone(), v1, v2)])
        }),
    ]
}

// ----------------------------------------------------------------------
// Identifiers and declarations
// ----------------------------------------------------------------------

fn ident<'e>(rule: &str, node: &'e Expression) -> Result<&'e Identifier> {
    match node {
        Expression::Ident(id) => Ok(id),
        other => Err(shape_error(rule, other)),
    }
}

pub fn identifiers() -> Vec<Rule> {
    vec![
        build_expr_rule("T-Ident", "T-Ident", JudgmentKind::Typing, ExprCtor::Ident, |ctx, node, stmt| {
            let typing = stmt.typing()?;
            let x = ident("T-Ident", node)?;
            Ok(RuleOutcome::new().with(mapping_lookup_must_match(ctx, &typing.signature, x, &typing.ty)?))
        }),
        build_expr_rule("E-Ident", "E-Ident", JudgmentKind::Evaluation, ExprCtor::Ident, |ctx, node, stmt| {
            let eval = stmt.evaluation()?;
            let x = ident("E-Ident", node)?;
            Ok(RuleOutcome::new()
                .with(mapping_lookup_must_match(ctx, &eval.env, x, &eval.value)?)
                .with(pure(ctx, eval)?))
        }),
        build_expr_rule("T-Let", "T-Let", JudgmentKind::Typing, ExprCtor::Let, |ctx, node, stmt| {
            let typing = stmt.typing()?;
            let Expression::Let(parts) = node else {
                return Err(shape_error("T-Let", node));
            };
            let declared: Signature = ctx.fresh_term();
            Ok(RuleOutcome::new()
                .premise(Statement::decl_typing(parts.0.clone(), typing.signature.clone(), declared.clone()))
                .premise(typed(
                    &parts.1,
                    &Mapping::comma(typing.signature.clone(), declared),
                    typing.ty.clone(),
                )))
        }),
        build_expr_rule("E-Let", "E-Let", JudgmentKind::Evaluation, ExprCtor::Let, |ctx, node, stmt| {
            let eval = stmt.evaluation()?;
            let Expression::Let(parts) = node else {
                return Err(shape_error("E-Let", node));
            };
            let declared: Environment = ctx.fresh_term();
            let middle: Store = ctx.fresh_term();
            let e1: Effect = ctx.fresh_term();
            let first = Statement::decl_evaluation(
                parts.0.clone(),
                DeclEvaluation {
                    env: eval.env.clone(),
                    store: eval.store.clone(),
                    effect: e1.clone(),
                    result_env: declared.clone(),
                    result_store: middle.clone(),
                },
            );
            let (second, e2) = evaluates(
                ctx,
                &parts.1,
                &Mapping::comma(eval.env.clone(), declared),
                middle,
                eval.value.clone(),
                eval.result_store.clone(),
            );
            Ok(RuleOutcome::new()
                .premise(first)
                .premise(second)
                .with(must_match(ctx, &eval.effect, &Effect::concat(e1, e2), Some("effect"))?))
        }),
        build_decl_rule("T-Val", "T-Val", JudgmentKind::Typing, DeclCtor::Val, |ctx, node, stmt| {
            let typing = stmt.typing()?;
            let Declaration::Val(parts) = node else {
                return Err(shape_error("T-Val", node));
            };
            let ty: Type = ctx.fresh_term();
            Ok(RuleOutcome::new()
                .premise(typed(&parts.1, &typing.signature, ty.clone()))
                .with(must_match(
                    ctx,
                    &typing.result,
                    &Signature::singleton(parts.0.clone(), ty),
                    Some("declared signature"),
                )?))
        }),
        build_decl_rule("E-Val", "E-Val", JudgmentKind::Evaluation, DeclCtor::Val, |ctx, node, stmt| {
            let eval = stmt.evaluation()?;
            let Declaration::Val(parts) = node else {
                return Err(shape_error("E-Val", node));
            };
            let value: Value = ctx.fresh_term();
            let premise = Statement::evaluation(
                parts.1.clone(),
                Evaluation {
                    env: eval.env.clone(),
                    store: eval.store.clone(),
                    effect: eval.effect.clone(),
                    value: value.clone(),
                    result_store: eval.result_store.clone(),
                },
            );
            Ok(RuleOutcome::new().premise(premise).with(must_match(
                ctx,
                &eval.result_env,
                &Environment::singleton(parts.0.clone(), value),
                Some("declared environment"),
            )?))
        }),
        build_decl_rule("T-Seq", "T-Seq", JudgmentKind::Typing, DeclCtor::Seq, |ctx, node, stmt| {
            let typing = stmt.typing()?;
            let Declaration::Seq(parts) = node else {
                return Err(shape_error("T-Seq", node));
            };
            let first: Signature = ctx.fresh_term();
            let second: Signature = ctx.fresh_term();
            Ok(RuleOutcome::new()
                .premise(Statement::decl_typing(parts.0.clone(), typing.signature.clone(), first.clone()))
                .premise(Statement::decl_typing(
                    parts.1.clone(),
                    Mapping::comma(typing.signature.clone(), first.clone()),
                    second.clone(),
                ))
                .with(must_match(
                    ctx,
                    &typing.result,
                    &Mapping::comma(first, second),
                    Some("declared signature"),
                )?))
        }),
    ]
}

// ----------------------------------------------------------------------
// Pairs
// ----------------------------------------------------------------------

pub fn pairs() -> Vec<Rule> {
    vec![
        build_expr_rule("T-Pair", "T-Pair", JudgmentKind::Typing, ExprCtor::Pair, |ctx, node, stmt| {
            let typing = stmt.typing()?;
            let (left, right) = operands("T-Pair", node)?;
            let t1: Type = ctx.fresh_term();
            let t2: Type = ctx.fresh_term();
            Ok(RuleOutcome::new()
                .premise(typed(left, &typing.signature, t1.clone()))
                .premise(typed(right, &typing.signature, t2.clone()))
                .with(must_match(ctx, &typing.ty, &Type::pair(t1, t2), Some("type"))?))
        }),
        evaluation_binary("E-Pair", ExprCtor::Pair, |ctx, stmt, v1, v2| {
            must_match(ctx, &stmt.evaluation()?.value, &Value::pair(v1, v2), Some("value"))
        }),
        build_builtin_application_rule("T-Fst", "T-Fst", JudgmentKind::Typing, Builtin::Fst, |ctx, arg, stmt| {
            let typing = stmt.typing()?;
            let other: Type = ctx.fresh_term();
            Ok(RuleOutcome::new().premise(typed(arg, &typing.signature, Type::pair(typing.ty.clone(), other))))
        }),
        build_builtin_application_rule("T-Snd", "T-Snd", JudgmentKind::Typing, Builtin::Snd, |ctx, arg, stmt| {
            let typing = stmt.typing()?;
            let other: Type = ctx.fresh_term();
            Ok(RuleOutcome::new().premise(typed(arg, &typing.signature, Type::pair(other, typing.ty.clone()))))
        }),
        build_builtin_application_rule("E-Fst", "E-Fst", JudgmentKind::Evaluation, Builtin::Fst, |ctx, arg, stmt| {
            let eval = stmt.evaluation()?;
            let other: Value = ctx.fresh_term();
            Ok(RuleOutcome::new().premise(projection(arg, eval, Value::pair(eval.value.clone(), other))))
        }),
        build_builtin_application_rule("E-Snd", "E-Snd", JudgmentKind::Evaluation, Builtin::Snd, |ctx, arg, stmt| {
            let eval = stmt.evaluation()?;
            let other: Value = ctx.fresh_term();
            Ok(RuleOutcome::new().premise(projection(arg, eval, Value::pair(other, eval.value.clone()))))
        }),
    ]
}

/// The argument of a projection evaluates to `pair` with the same store and
/// effect as the whole application.
fn projection(arg: &Expression, eval: &Evaluation, pair: Value) -> Statement {
    Statement::evaluation(
        arg.clone(),
        Evaluation {
            value: pair,
            ..eval.clone()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::BinOp;
    use crate::domain::Render;
    use crate::rule::NoPrompt;

    fn rule(id: &str) -> Rule {
        ruleset()
            .find(&crate::core::RuleId::new(id))
            .cloned()
            .unwrap_or_else(|| panic!("no rule {}", id))
    }

    fn closed_evaluation(expr: Expression, value: Value) -> Statement {
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

    #[test]
    fn rule_ids_are_unique() {
        let set = ruleset();
        let mut ids: Vec<_> = set.rules().map(|r| r.id().clone()).collect();
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
        assert_eq!(set.chapters().len(), 3);
    }

    /// Previews leave nothing bound and nothing allocated.
    #[test]
    fn previews_roll_back() {
        let ctx = Context::new();
        let preview = rule("E-Nat").render(&ctx).unwrap();
        assert_eq!(preview.conclusion, "E1, S1 ⊢ n ⇓ v2, S1, ∅");
        assert!(preview.premises.is_empty());
        assert_eq!(ctx.bound_count(), 0);
        assert_eq!(ctx.meta_count(), 0);

        for rule in ruleset().rules() {
            let preview = rule.render(&ctx).unwrap();
            assert_eq!(preview.name, rule.name());
            assert_eq!(ctx.bound_count(), 0);
            assert_eq!(ctx.meta_count(), 0);
        }
        // Labels restart where they were.
        assert_eq!(rule("E-Nat").render(&ctx).unwrap(), preview);
    }

    /// Previewing next to a live derivation keeps its meta-variables.
    #[test]
    fn previews_keep_existing_metas() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        ctx.bind(v, Value::Nat(1)).unwrap();
        rule("E-Plus").render(&ctx).unwrap();
        assert_eq!(ctx.meta_count(), 1);
        assert_eq!(ctx.lookup(v), Some(Value::Nat(1)));
        assert_eq!(ctx.label(ctx.fresh::<Value>()), "v2");
    }

    #[test]
    fn plus_premises_thread_the_store() {
        let ctx = Context::new();
        let v = ctx.fresh::<Value>();
        let expr = Expression::binary(BinOp::Plus, Expression::nat(1), Expression::nat(2));
        let application = rule("E-Plus")
            .apply(&ctx, &closed_evaluation(expr, Value::Var(v)), &mut NoPrompt, &[])
            .unwrap();
        assert_eq!(application.premises.len(), 2);
        assert_eq!(application.premises[0].render(&ctx), "[], [] ⊢ 1 ⇓ v2, S1, ∅");
        assert_eq!(application.premises[1].render(&ctx), "[], S1 ⊢ 2 ⇓ v3, [], ∅");
        assert_eq!(Value::Var(v).render(&ctx), "v2 + v3");
    }

    #[test]
    fn typing_an_identifier() {
        let ctx = Context::new();
        let t = ctx.fresh::<Type>();
        let signature = Signature::singleton(Identifier::new("x"), Type::Char);
        let stmt = Statement::typing(Expression::ident("x"), signature, Type::Var(t));
        let application = rule("T-Ident").apply(&ctx, &stmt, &mut NoPrompt, &[]).unwrap();
        assert!(application.constraints.is_empty());
        assert_eq!(ctx.lookup(t), Some(Type::Char));

        let stmt = Statement::typing(Expression::ident("y"), Mapping::empty(), Type::Var(t));
        let err = rule("T-Ident").apply(&ctx, &stmt, &mut NoPrompt, &[]).unwrap_err();
        assert!(err.as_mismatch().is_some());
    }

    #[test]
    fn fst_projects() {
        let ctx = Context::new();
        let stmt = Statement::typing(
            Expression::apply(Expression::ident("fst"), Expression::pair(Expression::nat(1), Expression::Unit)),
            Mapping::empty(),
            Type::Nat,
        );
        let application = rule("T-Fst").apply(&ctx, &stmt, &mut NoPrompt, &[]).unwrap();
        assert_eq!(application.premises[0].render(&ctx), "[] ⊢ (1, ()) : nat * τ1");
    }
}
