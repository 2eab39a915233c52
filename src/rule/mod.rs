//! Semantic rules and their application.
//!
//! A rule is immutable data: an id, a display name, the judgment kind and
//! AST constructor it concludes, and an apply function produced by one of the
//! builders in [`builder`]. Applying a rule is a transaction: either it
//! returns premises, constraints, the literal arguments it consumed and the
//! snapshot of its mutations, or it fails and nothing persists.
//!
//! # Determinism
//! Applying the same rule to the same statement with the same arguments
//! allocates meta-variables in the same order, so a step redone after an
//! undo renders exactly as before.

pub mod builder;

use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::RuleId;
use crate::domain::ast::{DeclCtor, Datum, ExprCtor, Identifier, Literal, ParamKind};
use crate::domain::Render;
use crate::error::{EngineError, Result, Subject};
use crate::snapshot::Snapshot;
use crate::statement::{JudgmentKind, Statement};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::info;

pub use builder::{build_builtin_application_rule, build_decl_rule, build_expr_rule, Builtin};

// ----------------------------------------------------------------------
// Prompts
// ----------------------------------------------------------------------

/// Source of literal data when a rule materializes a node.
///
/// The engine blocks on `query`; returning `EngineError::Cancelled` aborts
/// the application.
pub trait Prompt {
    fn query(&mut self, kind: ParamKind, rule: &str) -> Result<Literal>;
}

/// Never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn query(&mut self, _kind: ParamKind, _rule: &str) -> Result<Literal> {
        Err(EngineError::Cancelled)
    }
}

/// Answers from a fixed queue, then cancels.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Literal>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Literal>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn query(&mut self, _kind: ParamKind, _rule: &str) -> Result<Literal> {
        self.answers.pop_front().ok_or(EngineError::Cancelled)
    }
}

/// Answers with named placeholders; used for rule previews.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderPrompt {
    identifiers: usize,
}

const IDENTIFIER_NAMES: [&str; 3] = ["x", "y", "z"];

impl Prompt for PlaceholderPrompt {
    fn query(&mut self, kind: ParamKind, rule: &str) -> Result<Literal> {
        match kind {
            ParamKind::Nat => Ok(Literal::Nat(Datum::Placeholder("n"))),
            ParamKind::Char => Ok(Literal::Char(Datum::Placeholder("c"))),
            ParamKind::Identifier => {
                let index = self.identifiers;
                self.identifiers += 1;
                let base = IDENTIFIER_NAMES[index % IDENTIFIER_NAMES.len()];
                let name = match index / IDENTIFIER_NAMES.len() {
                    0 => base.to_owned(),
                    round => format!("{}{}", base, round),
                };
                Ok(Literal::Ident(Identifier::new(&name)))
            }
            other => Err(EngineError::invariant(format!(
                "rule {} queried a {:?} part as a literal",
                rule, other
            ))),
        }
    }
}

// ----------------------------------------------------------------------
// Arguments
// ----------------------------------------------------------------------

/// Literal arguments of one application: replayed first, then prompted.
pub struct Arguments<'a> {
    rule: &'a str,
    replay: std::slice::Iter<'a, Literal>,
    prompt: &'a mut dyn Prompt,
    used: Vec<Literal>,
}

impl<'a> Arguments<'a> {
    pub fn new(rule: &'a str, previous: &'a [Literal], prompt: &'a mut dyn Prompt) -> Self {
        Self {
            rule,
            replay: previous.iter(),
            prompt,
            used: Vec::new(),
        }
    }

    /// The next literal of `kind`.
    ///
    /// # Errors
    /// `Cancelled` from the prompt, or an invariant violation if a replayed
    /// or prompted literal has the wrong kind.
    pub fn literal(&mut self, kind: ParamKind) -> Result<Literal> {
        let literal = match self.replay.next() {
            Some(previous) => previous.clone(),
            None => self.prompt.query(kind, self.rule)?,
        };
        if literal.kind() != kind {
            return Err(EngineError::invariant(format!(
                "rule {} expected a {:?} argument, got {:?}",
                self.rule,
                kind,
                literal.kind()
            )));
        }
        self.used.push(literal.clone());
        Ok(literal)
    }

    /// Every literal consumed so far, in order.
    pub fn into_used(self) -> Vec<Literal> {
        self.used
    }
}

// ----------------------------------------------------------------------
// Rules
// ----------------------------------------------------------------------

/// What a rule callback produces.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub premises: Vec<Statement>,
    pub constraints: Vec<ConstraintFactory>,
}

impl RuleOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn premise(mut self, premise: Statement) -> Self {
        self.premises.push(premise);
        self
    }

    /// Adds constraints still to be discharged.
    pub fn with(mut self, constraints: Vec<ConstraintFactory>) -> Self {
        self.constraints.extend(constraints);
        self
    }
}

/// The AST constructor a rule concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Expression(ExprCtor),
    Declaration(DeclCtor),
}

impl Target {
    pub fn subject(self) -> Subject {
        match self {
            Target::Expression(_) => Subject::Expression,
            Target::Declaration(_) => Subject::Declaration,
        }
    }
}

pub(crate) type ApplyFn = dyn Fn(&Context, &Statement, &mut Arguments<'_>) -> Result<RuleOutcome>;

/// A semantic rule.
#[derive(Clone)]
pub struct Rule {
    id: RuleId,
    name: String,
    judgment: JudgmentKind,
    target: Target,
    apply_fn: Rc<ApplyFn>,
}

/// A successful application.
#[derive(Debug)]
pub struct Application {
    pub premises: Vec<Statement>,
    pub constraints: Vec<ConstraintFactory>,
    /// Literal arguments consumed, for redo.
    pub args: Vec<Literal>,
    pub snapshot: Snapshot,
}

/// A rendered rule instance with placeholder data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePreview {
    pub name: String,
    pub premises: Vec<String>,
    pub conclusion: String,
    pub constraints: Vec<String>,
}

impl fmt::Display for RulePreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let premises = self.premises.join("    ");
        let width = premises.chars().count().max(self.conclusion.chars().count());
        writeln!(f, "{}", premises)?;
        writeln!(f, "{} ({})", "─".repeat(width), self.name)?;
        write!(f, "{}", self.conclusion)?;
        for constraint in &self.constraints {
            write!(f, "\n  where {}", constraint)?;
        }
        Ok(())
    }
}

impl Rule {
    pub(crate) fn new(
        id: &str,
        name: &str,
        judgment: JudgmentKind,
        target: Target,
        apply_fn: Rc<ApplyFn>,
    ) -> Self {
        Self {
            id: RuleId::new(id),
            name: name.to_owned(),
            judgment,
            target,
            apply_fn,
        }
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn judgment(&self) -> JudgmentKind {
        self.judgment
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Applies the rule to `stmt`.
    ///
    /// Literal data is taken from `previous_args` first and from `prompt`
    /// once those run out.
    ///
    /// # Errors
    /// `RuleNotApplicable`, a `Mismatch`, `Cancelled` or an invariant
    /// violation; in every case no mutation persists.
    pub fn apply(
        &self,
        ctx: &Context,
        stmt: &Statement,
        prompt: &mut dyn Prompt,
        previous_args: &[Literal],
    ) -> Result<Application> {
        info!(rule = %self.id, statement = %stmt.render(ctx), "applying rule");
        let mut args = Arguments::new(&self.name, previous_args, prompt);
        let (outcome, snapshot) = ctx.transaction(|ctx| (self.apply_fn)(ctx, stmt, &mut args))?;
        Ok(Application {
            premises: outcome.premises,
            constraints: outcome.constraints,
            args: args.into_used(),
            snapshot,
        })
    }

    /// Instantiates the rule against a placeholder statement and renders it.
    ///
    /// Leaves the context as it was: bindings are undone and the
    /// meta-variables created for the preview are reclaimed.
    pub fn render(&self, ctx: &Context) -> Result<RulePreview> {
        let mark = ctx.meta_count();
        let mut prompt = PlaceholderPrompt::default();
        let mut args = Arguments::new(&self.name, &[], &mut prompt);
        let preview = ctx
            .transaction(|ctx| {
                let stmt = Statement::placeholder(ctx, self.judgment, self.target.subject());
                let outcome = (self.apply_fn)(ctx, &stmt, &mut args)?;
                Ok(RulePreview {
                    name: self.name.clone(),
                    premises: outcome.premises.iter().map(|p| p.render(ctx)).collect(),
                    conclusion: stmt.render(ctx),
                    constraints: outcome
                        .constraints
                        .iter()
                        .map(|c| c.description().to_owned())
                        .collect(),
                })
            })
            .map(|(preview, snapshot)| {
                snapshot.undo(ctx);
                preview
            });
        ctx.reclaim(mark);
        preview
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("judgment", &self.judgment)
            .field("target", &self.target)
            .finish()
    }
}

// ----------------------------------------------------------------------
// Rulesets
// ----------------------------------------------------------------------

/// A named group of rules.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub name: String,
    pub rules: Vec<Rule>,
}

/// Rules grouped into chapters, in presentation order.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    chapters: Vec<Chapter>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chapter.
    pub fn chapter(mut self, name: &str, rules: Vec<Rule>) -> Self {
        self.chapters.push(Chapter {
            name: name.to_owned(),
            rules,
        });
        self
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Every rule, chapter by chapter.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.chapters.iter().flat_map(|chapter| chapter.rules.iter())
    }

    pub fn find(&self, id: &RuleId) -> Option<&Rule> {
        self.rules().find(|rule| rule.id() == id)
    }

    /// Rules that could conclude `stmt`, judged by kind and subject only.
    pub fn candidates<'a>(&'a self, stmt: &'a Statement) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules()
            .filter(move |rule| rule.judgment() == stmt.kind() && rule.target().subject() == stmt.subject())
    }

    pub fn len(&self) -> usize {
        self.rules().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
