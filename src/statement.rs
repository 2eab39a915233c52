//! Judgments: an AST node together with the fields a rule relates it to.
//!
//! Every field may still contain unresolved meta-variables; rules match
//! against the fields rather than reading them.

use crate::context::Context;
use crate::domain::ast::{Declaration, Expression};
use crate::domain::effect::Effect;
use crate::domain::ty::Type;
use crate::domain::value::Value;
use crate::domain::Render;
use crate::error::{EngineError, Result, Subject};
use crate::mapping::{Environment, Signature, Store};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static or dynamic semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JudgmentKind {
    Typing,
    Evaluation,
}

impl fmt::Display for JudgmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgmentKind::Typing => f.write_str("typing"),
            JudgmentKind::Evaluation => f.write_str("evaluation"),
        }
    }
}

/// `Γ ⊢ e : τ`
#[derive(Debug, Clone, PartialEq)]
pub struct Typing {
    pub signature: Signature,
    pub ty: Type,
}

/// `E, S ⊢ e ⇓ v, S', ε`
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub env: Environment,
    pub store: Store,
    pub effect: Effect,
    pub value: Value,
    pub result_store: Store,
}

/// `Γ ⊢ d : Γ'`
#[derive(Debug, Clone, PartialEq)]
pub struct DeclTyping {
    pub signature: Signature,
    pub result: Signature,
}

/// `E, S ⊢ d ⇓ E', S', ε`
#[derive(Debug, Clone, PartialEq)]
pub struct DeclEvaluation {
    pub env: Environment,
    pub store: Store,
    pub effect: Effect,
    pub result_env: Environment,
    pub result_store: Store,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionJudgment {
    Typing(Typing),
    Evaluation(Evaluation),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationJudgment {
    Typing(DeclTyping),
    Evaluation(DeclEvaluation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expr: Expression,
    pub judgment: ExpressionJudgment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationStatement {
    pub decl: Declaration,
    pub judgment: DeclarationJudgment,
}

/// A judgment to be derived.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(ExpressionStatement),
    Declaration(DeclarationStatement),
}

impl Typing {
    /// All fields fresh.
    pub fn fresh(ctx: &Context) -> Self {
        Self {
            signature: ctx.fresh_term(),
            ty: ctx.fresh_term(),
        }
    }
}

impl Evaluation {
    /// All fields fresh.
    pub fn fresh(ctx: &Context) -> Self {
        Self {
            env: ctx.fresh_term(),
            store: ctx.fresh_term(),
            effect: ctx.fresh_term(),
            value: ctx.fresh_term(),
            result_store: ctx.fresh_term(),
        }
    }
}

impl ExpressionJudgment {
    pub fn kind(&self) -> JudgmentKind {
        match self {
            ExpressionJudgment::Typing(_) => JudgmentKind::Typing,
            ExpressionJudgment::Evaluation(_) => JudgmentKind::Evaluation,
        }
    }
}

impl DeclarationJudgment {
    pub fn kind(&self) -> JudgmentKind {
        match self {
            DeclarationJudgment::Typing(_) => JudgmentKind::Typing,
            DeclarationJudgment::Evaluation(_) => JudgmentKind::Evaluation,
        }
    }
}

fn wrong_kind(expected: JudgmentKind) -> EngineError {
    EngineError::invariant(format!("expected a {} judgment", expected))
}

impl ExpressionStatement {
    /// # Errors
    /// An evaluation judgment is an invariant violation.
    pub fn typing(&self) -> Result<&Typing> {
        match &self.judgment {
            ExpressionJudgment::Typing(typing) => Ok(typing),
            ExpressionJudgment::Evaluation(_) => Err(wrong_kind(JudgmentKind::Typing)),
        }
    }

    /// # Errors
    /// A typing judgment is an invariant violation.
    pub fn evaluation(&self) -> Result<&Evaluation> {
        match &self.judgment {
            ExpressionJudgment::Evaluation(evaluation) => Ok(evaluation),
            ExpressionJudgment::Typing(_) => Err(wrong_kind(JudgmentKind::Evaluation)),
        }
    }
}

impl DeclarationStatement {
    pub fn typing(&self) -> Result<&DeclTyping> {
        match &self.judgment {
            DeclarationJudgment::Typing(typing) => Ok(typing),
            DeclarationJudgment::Evaluation(_) => Err(wrong_kind(JudgmentKind::Typing)),
        }
    }

    pub fn evaluation(&self) -> Result<&DeclEvaluation> {
        match &self.judgment {
            DeclarationJudgment::Evaluation(evaluation) => Ok(evaluation),
            DeclarationJudgment::Typing(_) => Err(wrong_kind(JudgmentKind::Evaluation)),
        }
    }
}

impl Statement {
    /// `signature ⊢ expr : ty`
    pub fn typing(expr: Expression, signature: Signature, ty: Type) -> Self {
        Statement::Expression(ExpressionStatement {
            expr,
            judgment: ExpressionJudgment::Typing(Typing { signature, ty }),
        })
    }

    /// `env, store ⊢ expr ⇓ value, result_store, effect`
    pub fn evaluation(expr: Expression, evaluation: Evaluation) -> Self {
        Statement::Expression(ExpressionStatement {
            expr,
            judgment: ExpressionJudgment::Evaluation(evaluation),
        })
    }

    /// `signature ⊢ decl : result`
    pub fn decl_typing(decl: Declaration, signature: Signature, result: Signature) -> Self {
        Statement::Declaration(DeclarationStatement {
            decl,
            judgment: DeclarationJudgment::Typing(DeclTyping { signature, result }),
        })
    }

    pub fn decl_evaluation(decl: Declaration, evaluation: DeclEvaluation) -> Self {
        Statement::Declaration(DeclarationStatement {
            decl,
            judgment: DeclarationJudgment::Evaluation(evaluation),
        })
    }

    /// A statement whose subject and fields are all fresh meta-variables.
    pub fn placeholder(ctx: &Context, kind: JudgmentKind, subject: Subject) -> Self {
        match (subject, kind) {
            (Subject::Expression, JudgmentKind::Typing) => {
                Statement::typing(ctx.fresh_term(), ctx.fresh_term(), ctx.fresh_term())
            }
            (Subject::Expression, JudgmentKind::Evaluation) => {
                Statement::evaluation(ctx.fresh_term(), Evaluation::fresh(ctx))
            }
            (Subject::Declaration, JudgmentKind::Typing) => {
                Statement::decl_typing(ctx.fresh_term(), ctx.fresh_term(), ctx.fresh_term())
            }
            (Subject::Declaration, JudgmentKind::Evaluation) => Statement::decl_evaluation(
                ctx.fresh_term(),
                DeclEvaluation {
                    env: ctx.fresh_term(),
                    store: ctx.fresh_term(),
                    effect: ctx.fresh_term(),
                    result_env: ctx.fresh_term(),
                    result_store: ctx.fresh_term(),
                },
            ),
        }
    }

    pub fn kind(&self) -> JudgmentKind {
        match self {
            Statement::Expression(stmt) => stmt.judgment.kind(),
            Statement::Declaration(stmt) => stmt.judgment.kind(),
        }
    }

    pub fn subject(&self) -> Subject {
        match self {
            Statement::Expression(_) => Subject::Expression,
            Statement::Declaration(_) => Subject::Declaration,
        }
    }
}

impl Render for Statement {
    fn render(&self, ctx: &Context) -> String {
        match self {
            Statement::Expression(stmt) => {
                let expr = stmt.expr.render(ctx);
                match &stmt.judgment {
                    ExpressionJudgment::Typing(t) => {
                        format!("{} ⊢ {} : {}", t.signature.render(ctx), expr, t.ty.render(ctx))
                    }
                    ExpressionJudgment::Evaluation(e) => format!(
                        "{}, {} ⊢ {} ⇓ {}, {}, {}",
                        e.env.render(ctx),
                        e.store.render(ctx),
                        expr,
                        e.value.render(ctx),
                        e.result_store.render(ctx),
                        e.effect.render(ctx)
                    ),
                }
            }
            Statement::Declaration(stmt) => {
                let decl = stmt.decl.render(ctx);
                match &stmt.judgment {
                    DeclarationJudgment::Typing(t) => {
                        format!("{} ⊢ {} : {}", t.signature.render(ctx), decl, t.result.render(ctx))
                    }
                    DeclarationJudgment::Evaluation(e) => format!(
                        "{}, {} ⊢ {} ⇓ {}, {}, {}",
                        e.env.render(ctx),
                        e.store.render(ctx),
                        decl,
                        e.result_env.render(ctx),
                        e.result_store.render(ctx),
                        e.effect.render(ctx)
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::Identifier;
    use crate::mapping::Mapping;

    #[test]
    fn render_judgments() {
        let ctx = Context::new();
        let stmt = Statement::typing(
            Expression::ident("x"),
            Signature::singleton(Identifier::new("x"), Type::Nat),
            ctx.fresh_term(),
        );
        assert_eq!(stmt.render(&ctx), "[x ↦ nat] ⊢ x : τ1");

        let stmt = Statement::evaluation(
            Expression::nat(1),
            Evaluation {
                env: Mapping::empty(),
                store: Mapping::empty(),
                effect: Effect::empty(),
                value: Value::Nat(1),
                result_store: Mapping::empty(),
            },
        );
        assert_eq!(stmt.render(&ctx), "[], [] ⊢ 1 ⇓ 1, [], ∅");
    }

    #[test]
    fn placeholders_are_unresolved() {
        let ctx = Context::new();
        let stmt = Statement::placeholder(&ctx, JudgmentKind::Evaluation, Subject::Declaration);
        assert_eq!(stmt.kind(), JudgmentKind::Evaluation);
        assert_eq!(stmt.subject(), Subject::Declaration);
        assert_eq!(ctx.bound_count(), 0);
        assert_eq!(stmt.render(&ctx), "E1, S1 ⊢ d1 ⇓ E2, S2, ε1");
    }

    #[test]
    fn field_access_checks_kind() {
        let ctx = Context::new();
        let Statement::Expression(stmt) = Statement::placeholder(&ctx, JudgmentKind::Typing, Subject::Expression) else {
            panic!("expected an expression statement");
        };
        assert!(stmt.typing().is_ok());
        assert!(!stmt.evaluation().unwrap_err().is_recoverable());
    }
}
