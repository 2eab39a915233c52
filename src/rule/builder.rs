//! Rule builders.
//!
//! A builder wraps a callback that handles a concrete node of one
//! constructor. The generated apply function does the shared work: it checks
//! the judgment, simplifies the subject, and if the subject is still an
//! unresolved meta-variable, materializes a node of the constructor from
//! fresh meta-variables and literal arguments and binds it.

use super::{ApplyFn, Arguments, Rule, RuleOutcome, Target};
use crate::context::Context;
use crate::domain::ast::{DeclCtor, Declaration, ExprCtor, Expression, Identifier, ParamKind, Part};
use crate::domain::Render;
use crate::error::{EngineError, Result, Subject};
use crate::normalize::simplify;
use crate::statement::{DeclarationStatement, ExpressionStatement, JudgmentKind, Statement};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Built-in functions recognised in application position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Fst,
    Snd,
    GetChar,
    PutChar,
    Ref,
    Raise,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Fst,
        Builtin::Snd,
        Builtin::GetChar,
        Builtin::PutChar,
        Builtin::Ref,
        Builtin::Raise,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Fst => "fst",
            Builtin::Snd => "snd",
            Builtin::GetChar => "getchar",
            Builtin::PutChar => "putchar",
            Builtin::Ref => "ref",
            Builtin::Raise => "raise",
        }
    }

    pub fn identifier(self) -> Identifier {
        Identifier::new(self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn not_applicable(rule: &str, subject: Subject, found: String) -> EngineError {
    EngineError::RuleNotApplicable {
        rule: rule.to_owned(),
        subject,
        found,
    }
}

fn wrong_judgment(rule: &str, judgment: JudgmentKind, subject: Subject, stmt: &Statement) -> EngineError {
    EngineError::invariant(format!(
        "rule {} concludes {} judgments on a {}, applied to a {} judgment on a {}",
        rule,
        judgment,
        subject,
        stmt.kind(),
        stmt.subject()
    ))
}

/// Fresh meta-variables for syntactic parts, arguments for literal ones.
fn materialize_parts(ctx: &Context, params: &[ParamKind], args: &mut Arguments<'_>) -> Result<Vec<Part>> {
    params
        .iter()
        .map(|kind| {
            Ok(match kind {
                ParamKind::Expression => Part::Expression(ctx.fresh_term()),
                ParamKind::Declaration => Part::Declaration(ctx.fresh_term()),
                ParamKind::Type => Part::Type(ctx.fresh_term()),
                literal => Part::Literal(args.literal(*literal)?),
            })
        })
        .collect()
}

/// The subject as a concrete `ctor` node, binding it if unresolved.
fn expression_node(ctx: &Context, rule: &str, expr: &Expression, ctor: ExprCtor, args: &mut Arguments<'_>) -> Result<Expression> {
    match simplify(ctx, expr) {
        node if node.ctor() == Some(ctor) => Ok(node),
        Expression::Var(var) => {
            let node = Expression::construct(ctor, materialize_parts(ctx, ctor.params(), args)?)?;
            debug!(rule, meta = %ctx.label(var), ctor = %ctor, "materialized expression");
            ctx.bind(var, node.clone())?;
            Ok(node)
        }
        other => Err(not_applicable(rule, Subject::Expression, other.render(ctx))),
    }
}

fn declaration_node(ctx: &Context, rule: &str, decl: &Declaration, ctor: DeclCtor, args: &mut Arguments<'_>) -> Result<Declaration> {
    match simplify(ctx, decl) {
        node if node.ctor() == Some(ctor) => Ok(node),
        Declaration::Var(var) => {
            let node = Declaration::construct(ctor, materialize_parts(ctx, ctor.params(), args)?)?;
            debug!(rule, meta = %ctx.label(var), ctor = %ctor, "materialized declaration");
            ctx.bind(var, node.clone())?;
            Ok(node)
        }
        other => Err(not_applicable(rule, Subject::Declaration, other.render(ctx))),
    }
}

fn expression_statement<'s>(rule: &str, judgment: JudgmentKind, stmt: &'s Statement) -> Result<&'s ExpressionStatement> {
    match stmt {
        Statement::Expression(inner) if inner.judgment.kind() == judgment => Ok(inner),
        _ => Err(wrong_judgment(rule, judgment, Subject::Expression, stmt)),
    }
}

fn declaration_statement<'s>(rule: &str, judgment: JudgmentKind, stmt: &'s Statement) -> Result<&'s DeclarationStatement> {
    match stmt {
        Statement::Declaration(inner) if inner.judgment.kind() == judgment => Ok(inner),
        _ => Err(wrong_judgment(rule, judgment, Subject::Declaration, stmt)),
    }
}

/// Builds a rule concluding `judgment` for expressions built by `ctor`.
///
/// `conclude` receives the concrete node and the statement.
pub fn build_expr_rule<F>(id: &str, name: &str, judgment: JudgmentKind, ctor: ExprCtor, conclude: F) -> Rule
where
    F: Fn(&Context, &Expression, &ExpressionStatement) -> Result<RuleOutcome> + 'static,
{
    let rule = name.to_owned();
    let apply: Rc<ApplyFn> = Rc::new(move |ctx: &Context, stmt: &Statement, args: &mut Arguments<'_>| {
        let stmt = expression_statement(&rule, judgment, stmt)?;
        let node = expression_node(ctx, &rule, &stmt.expr, ctor, args)?;
        conclude(ctx, &node, stmt)
    });
    Rule::new(id, name, judgment, Target::Expression(ctor), apply)
}

/// Builds a rule concluding `judgment` for declarations built by `ctor`.
pub fn build_decl_rule<F>(id: &str, name: &str, judgment: JudgmentKind, ctor: DeclCtor, conclude: F) -> Rule
where
    F: Fn(&Context, &Declaration, &DeclarationStatement) -> Result<RuleOutcome> + 'static,
{
    let rule = name.to_owned();
    let apply: Rc<ApplyFn> = Rc::new(move |ctx: &Context, stmt: &Statement, args: &mut Arguments<'_>| {
        let stmt = declaration_statement(&rule, judgment, stmt)?;
        let node = declaration_node(ctx, &rule, &stmt.decl, ctor, args)?;
        conclude(ctx, &node, stmt)
    });
    Rule::new(id, name, judgment, Target::Declaration(ctor), apply)
}

/// Builds a rule for `builtin e`.
///
/// The callee must simplify to the builtin's identifier or to an
/// expression meta-variable, which is then bound to it. `conclude` receives
/// the argument expression.
pub fn build_builtin_application_rule<F>(id: &str, name: &str, judgment: JudgmentKind, builtin: Builtin, conclude: F) -> Rule
where
    F: Fn(&Context, &Expression, &ExpressionStatement) -> Result<RuleOutcome> + 'static,
{
    let rule = name.to_owned();
    let apply: Rc<ApplyFn> = Rc::new(move |ctx: &Context, stmt: &Statement, args: &mut Arguments<'_>| {
        let stmt = expression_statement(&rule, judgment, stmt)?;
        let node = expression_node(ctx, &rule, &stmt.expr, ExprCtor::Apply, args)?;
        let Expression::Apply(parts) = &node else {
            return Err(EngineError::invariant(format!("{} materialized a non-application", rule)));
        };
        let (callee, argument) = (&parts.0, &parts.1);
        match simplify(ctx, callee) {
            Expression::Ident(id) if id.as_str() == builtin.name() => {}
            Expression::Var(var) => ctx.bind(var, Expression::Ident(builtin.identifier()))?,
            _ => return Err(not_applicable(&rule, Subject::Expression, node.render(ctx))),
        }
        conclude(ctx, argument, stmt)
    });
    Rule::new(id, name, judgment, Target::Expression(ExprCtor::Apply), apply)
}
