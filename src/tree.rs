//! Headless derivation trees.
//!
//! A tree node holds a statement and, once a rule has been applied to it,
//! the step: the rule, the literal arguments it consumed and the snapshot of
//! its mutations. Every constraint produced by a step is registered with the
//! step as origin and re-validated after each change to the tree.
//!
//! # Invariants
//! - Steps are undone newest first. Undoing a node undoes its whole subtree.
//! - Re-validation bindings belong to the constraint that made them, not to
//!   the step that happened to trigger the check.
//! - Undo cascades: a step or constraint that read a meta-variable bound
//!   elsewhere is undone as soon as that meta-variable is unbound. Undone
//!   steps keep their rule and arguments for redo.
//! - A deferred constraint that fails undoes the subtree of its origin and
//!   flags that node; if the origin is the step just applied, the
//!   application fails instead.
//! - A tree is proved when every node has a step and every constraint is
//!   fulfilled.

use crate::constraint::{CheckReport, ConstraintSet};
use crate::context::Context;
use crate::core::{MetaId, RuleId, StepId};
use crate::domain::ast::Literal;
use crate::domain::Render;
use crate::error::{EngineError, Result};
use crate::rule::{Prompt, Rule, Ruleset};
use crate::snapshot::Snapshot;
use crate::statement::Statement;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// A rule application recorded on a node.
#[derive(Debug)]
struct Step {
    rule: RuleId,
    args: Vec<Literal>,
    snapshot: Snapshot,
    /// Meta-variables bound elsewhere that the application read.
    deps: BTreeSet<MetaId>,
    /// Application order, for newest-first undo.
    sequence: u64,
}

/// One node of a derivation tree.
#[derive(Debug)]
pub struct TreeNode {
    pub statement: Statement,
    pub parent: Option<StepId>,
    pub children: Vec<StepId>,
    step: Option<Step>,
    /// Rule and arguments of the last undone step, for redo.
    redo: Option<(RuleId, Vec<Literal>)>,
    /// Why this node's step was undone by re-validation.
    flag: Option<EngineError>,
}

impl TreeNode {
    fn new(statement: Statement, parent: Option<StepId>) -> Self {
        Self {
            statement,
            parent,
            children: Vec::new(),
            step: None,
            redo: None,
            flag: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.step.is_some()
    }

    /// The rule applied to this node.
    pub fn rule(&self) -> Option<&RuleId> {
        self.step.as_ref().map(|step| &step.rule)
    }

    pub fn args(&self) -> Option<&[Literal]> {
        self.step.as_ref().map(|step| step.args.as_slice())
    }

    pub fn flag(&self) -> Option<&EngineError> {
        self.flag.as_ref()
    }

    pub fn can_redo(&self) -> bool {
        self.step.is_none() && self.redo.is_some()
    }
}

/// Result of applying or redoing a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: StepId,
    /// New open goals, one per premise.
    pub premises: Vec<StepId>,
    pub check: CheckReport,
    /// Nodes whose steps were undone because a deferred constraint failed.
    pub flagged: Vec<StepId>,
}

/// A derivation under construction.
#[derive(Debug)]
pub struct DerivationTree {
    nodes: BTreeMap<StepId, TreeNode>,
    root: StepId,
    next_id: u32,
    next_sequence: u64,
    constraints: ConstraintSet,
}

impl DerivationTree {
    /// A tree whose only node is the goal `statement`.
    pub fn new(statement: Statement) -> Self {
        let root = StepId::new(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, TreeNode::new(statement, None));
        Self {
            nodes,
            root,
            next_id: 1,
            next_sequence: 0,
            constraints: ConstraintSet::new(),
        }
    }

    pub fn root(&self) -> StepId {
        self.root
    }

    pub fn node(&self, id: StepId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Nodes without a step, in creation order.
    pub fn open_goals(&self) -> Vec<StepId> {
        self.nodes
            .iter()
            .filter(|(_, node)| !node.is_applied())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_proved(&self) -> bool {
        self.open_goals().is_empty() && self.constraints.all_fulfilled()
    }

    fn get(&self, id: StepId) -> Result<&TreeNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EngineError::invariant(format!("no node {}", id)))
    }

    fn get_mut(&mut self, id: StepId) -> Result<&mut TreeNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| EngineError::invariant(format!("no node {}", id)))
    }

    /// Applies `rule` to the open goal `id`.
    ///
    /// # Errors
    /// Whatever the rule raises, or the failure of a deferred constraint
    /// produced by this very step; the tree and the context are unchanged.
    pub fn apply(&mut self, ctx: &Context, id: StepId, rule: &Rule, prompt: &mut dyn Prompt) -> Result<StepReport> {
        self.apply_with_args(ctx, id, rule, prompt, &[])
    }

    /// Re-applies the rule last undone at `id`, replaying its arguments.
    pub fn redo(&mut self, ctx: &Context, id: StepId, rules: &Ruleset, prompt: &mut dyn Prompt) -> Result<StepReport> {
        let (rule_id, args) = self
            .get(id)?
            .redo
            .clone()
            .ok_or_else(|| EngineError::invariant(format!("nothing to redo at {}", id)))?;
        let rule = rules
            .find(&rule_id)
            .ok_or_else(|| EngineError::invariant(format!("unknown rule {}", rule_id)))?;
        self.apply_with_args(ctx, id, rule, prompt, &args)
    }

    fn apply_with_args(
        &mut self,
        ctx: &Context,
        id: StepId,
        rule: &Rule,
        prompt: &mut dyn Prompt,
        previous_args: &[Literal],
    ) -> Result<StepReport> {
        let node = self.get(id)?;
        if node.is_applied() {
            return Err(EngineError::invariant(format!("{} already has a step", id)));
        }
        let guard = ctx.observation();
        let application = rule.apply(ctx, &node.statement, prompt, previous_args);
        let reads = guard.finish();
        let application = application?;
        let deps = ctx.dependencies(&reads, &application.snapshot);

        let mut premises = Vec::with_capacity(application.premises.len());
        for statement in application.premises {
            let child = StepId::new(self.next_id);
            self.next_id += 1;
            self.nodes.insert(child, TreeNode::new(statement, Some(id)));
            premises.push(child);
        }
        self.constraints
            .register_all(ctx, &application.constraints, Some(id));
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let node = self.get_mut(id)?;
        node.children = premises.clone();
        node.step = Some(Step {
            rule: rule.id().clone(),
            args: application.args,
            snapshot: application.snapshot,
            deps,
            sequence,
        });
        let previous_redo = node.redo.take();
        node.flag = None;
        info!(step = %id, rule = %rule.id(), premises = premises.len(), "step applied");

        let (check, flagged) = match self.revalidate(ctx, id) {
            Ok(result) => result,
            Err(err) => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.redo = previous_redo;
                }
                return Err(err);
            }
        };
        Ok(StepReport {
            step: id,
            premises,
            check,
            flagged,
        })
    }

    /// Re-checks every constraint after a change at `id`.
    ///
    /// A failing constraint undoes the subtree of its origin and checking
    /// starts over, unless the origin is `id` itself.
    fn revalidate(&mut self, ctx: &Context, id: StepId) -> Result<(CheckReport, Vec<StepId>)> {
        let mut flagged = Vec::new();
        loop {
            let failure = match self.constraints.check_all(ctx) {
                Ok(report) => return Ok((report, flagged)),
                Err(failure) => failure,
            };
            let Some(origin) = failure.origin else {
                return Err(failure.error);
            };
            self.undo(ctx, origin)?;
            if origin == id {
                return Err(failure.error);
            }
            if let Some(node) = self.nodes.get_mut(&origin) {
                node.flag = Some(failure.error);
                flagged.push(origin);
            }
        }
    }

    /// Undoes the step at `id` and every step below it, then every step
    /// that depended on what they bound. Returns how many steps were undone.
    pub fn undo(&mut self, ctx: &Context, id: StepId) -> Result<usize> {
        let mut unbound = BTreeSet::new();
        let mut undone = self.undo_subtree(ctx, id, &mut unbound)?;
        loop {
            self.constraints.release(ctx, &mut unbound);
            let dependent = self
                .nodes
                .iter()
                .find(|(_, node)| node.step.as_ref().is_some_and(|step| !step.deps.is_disjoint(&unbound)))
                .map(|(id, _)| *id);
            let Some(dependent) = dependent else {
                return Ok(undone);
            };
            debug!(step = %dependent, cause = %id, "undoing dependent step");
            undone += self.undo_subtree(ctx, dependent, &mut unbound)?;
        }
    }

    /// Undoes the subtree of `id`, newest step first, and records every
    /// meta-variable unbound on the way.
    fn undo_subtree(&mut self, ctx: &Context, id: StepId, unbound: &mut BTreeSet<MetaId>) -> Result<usize> {
        let mut subtree = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.get(current)?;
            stack.extend(node.children.iter().copied());
            if let Some(step) = &node.step {
                subtree.push((step.sequence, current));
            }
        }
        subtree.sort_unstable_by(|a, b| b.cmp(a));

        let mut undone = 0;
        for (_, current) in &subtree {
            let Some(step) = self.get_mut(*current)?.step.take() else {
                continue;
            };
            let removed = self.constraints.remove_origin(ctx, *current, unbound);
            unbound.extend(step.snapshot.bindings().map(|(meta, _)| meta));
            let mutations = step.snapshot.undo(ctx);
            debug!(step = %current, rule = %step.rule, mutations, constraints = removed, "step undone");
            if *current == id {
                self.get_mut(id)?.redo = Some((step.rule, step.args));
            }
            undone += 1;
        }

        let children = std::mem::take(&mut self.get_mut(id)?.children);
        let mut stack = children;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        Ok(undone)
    }

    /// Renders the tree, one node per line, children indented.
    pub fn render(&self, ctx: &Context) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let rule = node.rule().map_or_else(|| "?".to_owned(), |rule| rule.to_string());
            out.push_str(&format!("{}{} [{}]\n", "  ".repeat(depth), node.statement.render(ctx), rule));
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}
