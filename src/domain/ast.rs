//! Abstract syntax of expressions and declarations.
//!
//! Every constructor has a static parameter descriptor (`ExprCtor::params`,
//! `DeclCtor::params`) listing the kinds of its sub-parts in order. Rules use
//! it to materialize a node from fresh meta-variables and learner-supplied
//! literals, without inspecting nodes at runtime.

use super::ty::Type;
use super::{render_var, term_domain, Render};
use crate::constraint::ConstraintFactory;
use crate::context::Context;
use crate::core::{MetaVar, SymbolClass};
use crate::error::{EngineError, MismatchKind, Result};
use crate::matching::{must_match, MatchOutcome, Unify};
use crate::normalize::{simplify, Simplifiable, Simplification};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// A program identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(Rc<str>);

impl Identifier {
    pub fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Render for Identifier {
    fn render(&self, _ctx: &Context) -> String {
        self.0.to_string()
    }
}

/// Literal data carried by an AST node: known, or a named placeholder used
/// only in rule previews.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datum<T> {
    Known(T),
    Placeholder(&'static str),
}

impl<T: fmt::Display> fmt::Display for Datum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Known(value) => value.fmt(f),
            Datum::Placeholder(name) => f.write_str(name),
        }
    }
}

/// Kind of a constructor sub-part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Expression,
    Declaration,
    Type,
    Nat,
    Char,
    Identifier,
}

impl ParamKind {
    /// Literal parts are supplied by the learner; the others become
    /// meta-variables.
    pub fn is_literal(self) -> bool {
        matches!(self, ParamKind::Nat | ParamKind::Char | ParamKind::Identifier)
    }
}

/// A literal argument supplied for a constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Nat(Datum<u64>),
    Char(Datum<char>),
    Ident(Identifier),
}

impl Literal {
    pub fn kind(&self) -> ParamKind {
        match self {
            Literal::Nat(_) => ParamKind::Nat,
            Literal::Char(_) => ParamKind::Char,
            Literal::Ident(_) => ParamKind::Identifier,
        }
    }
}

/// A sub-part handed to `Expression::construct` / `Declaration::construct`.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Expression(Expression),
    Declaration(Declaration),
    Type(Type),
    Literal(Literal),
}

impl Part {
    pub fn kind(&self) -> ParamKind {
        match self {
            Part::Expression(_) => ParamKind::Expression,
            Part::Declaration(_) => ParamKind::Declaration,
            Part::Type(_) => ParamKind::Type,
            Part::Literal(literal) => literal.kind(),
        }
    }
}

/// Binary arithmetic and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Monus,
    Times,
    Div,
    Equal,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Plus => "+",
            BinOp::Monus => "∸",
            BinOp::Times => "*",
            BinOp::Div => "/",
            BinOp::Equal => "=",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Equal => 1,
            BinOp::Plus | BinOp::Monus => 2,
            BinOp::Times | BinOp::Div => 3,
        }
    }
}

/// An expression, possibly containing meta-variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Var(MetaVar<Expression>),
    Bool(bool),
    Nat(Datum<u64>),
    Char(Datum<char>),
    Unit,
    Ident(Identifier),
    If(Rc<(Expression, Expression, Expression)>),
    Binary(BinOp, Rc<(Expression, Expression)>),
    Pair(Rc<(Expression, Expression)>),
    Fn(Rc<(Identifier, Expression)>),
    Apply(Rc<(Expression, Expression)>),
    Let(Rc<(Declaration, Expression)>),
    Deref(Rc<Expression>),
    Assign(Rc<(Expression, Expression)>),
    /// `(e : τ)`
    Annot(Rc<(Expression, Type)>),
}

term_domain!(Expression, Expression, SymbolClass::Expression);

/// Expression constructors, as matched by rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprCtor {
    True,
    False,
    Nat,
    Char,
    Unit,
    Ident,
    If,
    Plus,
    Monus,
    Times,
    Div,
    Equal,
    Pair,
    Fn,
    Apply,
    Let,
    Deref,
    Assign,
    Annot,
}

impl ExprCtor {
    /// Kinds of the sub-parts, in construction order.
    pub fn params(self) -> &'static [ParamKind] {
        use ParamKind::{Declaration as D, Expression as E, Identifier as I, Type as T};
        match self {
            ExprCtor::True | ExprCtor::False | ExprCtor::Unit => &[],
            ExprCtor::Nat => &[ParamKind::Nat],
            ExprCtor::Char => &[ParamKind::Char],
            ExprCtor::Ident => &[I],
            ExprCtor::If => &[E, E, E],
            ExprCtor::Plus
            | ExprCtor::Monus
            | ExprCtor::Times
            | ExprCtor::Div
            | ExprCtor::Equal
            | ExprCtor::Pair
            | ExprCtor::Apply
            | ExprCtor::Assign => &[E, E],
            ExprCtor::Fn => &[I, E],
            ExprCtor::Let => &[D, E],
            ExprCtor::Deref => &[E],
            ExprCtor::Annot => &[E, T],
        }
    }

    fn binary(self) -> Option<BinOp> {
        match self {
            ExprCtor::Plus => Some(BinOp::Plus),
            ExprCtor::Monus => Some(BinOp::Monus),
            ExprCtor::Times => Some(BinOp::Times),
            ExprCtor::Div => Some(BinOp::Div),
            ExprCtor::Equal => Some(BinOp::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for ExprCtor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Expression {
    pub fn nat(n: u64) -> Self {
        Expression::Nat(Datum::Known(n))
    }

    pub fn char(c: char) -> Self {
        Expression::Char(Datum::Known(c))
    }

    pub fn ident(name: &str) -> Self {
        Expression::Ident(Identifier::new(name))
    }

    pub fn binary(op: BinOp, left: Expression, right: Expression) -> Self {
        Expression::Binary(op, Rc::new((left, right)))
    }

    pub fn if_then_else(cond: Expression, then: Expression, otherwise: Expression) -> Self {
        Expression::If(Rc::new((cond, then, otherwise)))
    }

    pub fn pair(left: Expression, right: Expression) -> Self {
        Expression::Pair(Rc::new((left, right)))
    }

    pub fn lambda(param: Identifier, body: Expression) -> Self {
        Expression::Fn(Rc::new((param, body)))
    }

    pub fn apply(callee: Expression, arg: Expression) -> Self {
        Expression::Apply(Rc::new((callee, arg)))
    }

    pub fn let_in(decl: Declaration, body: Expression) -> Self {
        Expression::Let(Rc::new((decl, body)))
    }

    pub fn deref(inner: Expression) -> Self {
        Expression::Deref(Rc::new(inner))
    }

    pub fn assign(target: Expression, value: Expression) -> Self {
        Expression::Assign(Rc::new((target, value)))
    }

    pub fn annot(inner: Expression, ty: Type) -> Self {
        Expression::Annot(Rc::new((inner, ty)))
    }

    /// Constructor of this node; `None` for a meta-variable.
    pub fn ctor(&self) -> Option<ExprCtor> {
        Some(match self {
            Expression::Var(_) => return None,
            Expression::Bool(true) => ExprCtor::True,
            Expression::Bool(false) => ExprCtor::False,
            Expression::Nat(_) => ExprCtor::Nat,
            Expression::Char(_) => ExprCtor::Char,
            Expression::Unit => ExprCtor::Unit,
            Expression::Ident(_) => ExprCtor::Ident,
            Expression::If(_) => ExprCtor::If,
            Expression::Binary(BinOp::Plus, _) => ExprCtor::Plus,
            Expression::Binary(BinOp::Monus, _) => ExprCtor::Monus,
            Expression::Binary(BinOp::Times, _) => ExprCtor::Times,
            Expression::Binary(BinOp::Div, _) => ExprCtor::Div,
            Expression::Binary(BinOp::Equal, _) => ExprCtor::Equal,
            Expression::Pair(_) => ExprCtor::Pair,
            Expression::Fn(_) => ExprCtor::Fn,
            Expression::Apply(_) => ExprCtor::Apply,
            Expression::Let(_) => ExprCtor::Let,
            Expression::Deref(_) => ExprCtor::Deref,
            Expression::Assign(_) => ExprCtor::Assign,
            Expression::Annot(_) => ExprCtor::Annot,
        })
    }

    /// Builds a `ctor` node from parts listed in `ctor.params()` order.
    ///
    /// # Errors
    /// Parts of the wrong kind or number are an invariant violation.
    pub fn construct(ctor: ExprCtor, parts: Vec<Part>) -> Result<Self> {
        let mut parts = Parts::new(ctor.to_string(), parts);
        let expr = match ctor {
            ExprCtor::True => Expression::Bool(true),
            ExprCtor::False => Expression::Bool(false),
            ExprCtor::Unit => Expression::Unit,
            ExprCtor::Nat => Expression::Nat(parts.nat()?),
            ExprCtor::Char => Expression::Char(parts.char()?),
            ExprCtor::Ident => Expression::Ident(parts.ident()?),
            ExprCtor::If => Expression::If(Rc::new((parts.expr()?, parts.expr()?, parts.expr()?))),
            ExprCtor::Pair => Expression::Pair(Rc::new((parts.expr()?, parts.expr()?))),
            ExprCtor::Apply => Expression::Apply(Rc::new((parts.expr()?, parts.expr()?))),
            ExprCtor::Assign => Expression::Assign(Rc::new((parts.expr()?, parts.expr()?))),
            ExprCtor::Fn => Expression::Fn(Rc::new((parts.ident()?, parts.expr()?))),
            ExprCtor::Let => Expression::Let(Rc::new((parts.decl()?, parts.expr()?))),
            ExprCtor::Deref => Expression::Deref(Rc::new(parts.expr()?)),
            ExprCtor::Annot => Expression::Annot(Rc::new((parts.expr()?, parts.ty()?))),
            ExprCtor::Plus | ExprCtor::Monus | ExprCtor::Times | ExprCtor::Div | ExprCtor::Equal => {
                let op = ctor
                    .binary()
                    .ok_or_else(|| EngineError::invariant(format!("{} is not binary", ctor)))?;
                Expression::Binary(op, Rc::new((parts.expr()?, parts.expr()?)))
            }
        };
        parts.finish()?;
        Ok(expr)
    }

    fn render_prec(&self, ctx: &Context, prec: u8) -> String {
        let (text, own) = match simplify(ctx, self) {
            Expression::Var(var) => (ctx.label(var), 5),
            Expression::Bool(b) => (b.to_string(), 5),
            Expression::Nat(n) => (n.to_string(), 5),
            Expression::Char(Datum::Known(c)) => (format!("'{}'", c), 5),
            Expression::Char(Datum::Placeholder(name)) => (name.to_owned(), 5),
            Expression::Unit => ("()".to_owned(), 5),
            Expression::Ident(id) => (id.to_string(), 5),
            Expression::If(parts) => (
                format!(
                    "if {} then {} else {}",
                    parts.0.render_prec(ctx, 0),
                    parts.1.render_prec(ctx, 0),
                    parts.2.render_prec(ctx, 0)
                ),
                0,
            ),
            Expression::Binary(op, parts) => {
                let own = op.precedence();
                (
                    format!(
                        "{} {} {}",
                        parts.0.render_prec(ctx, own),
                        op.symbol(),
                        parts.1.render_prec(ctx, own + 1)
                    ),
                    own,
                )
            }
            Expression::Pair(parts) => (
                format!("({}, {})", parts.0.render_prec(ctx, 0), parts.1.render_prec(ctx, 0)),
                5,
            ),
            Expression::Fn(parts) => (format!("fn {} => {}", parts.0, parts.1.render_prec(ctx, 0)), 0),
            Expression::Apply(parts) => (
                format!("{} {}", parts.0.render_prec(ctx, 4), parts.1.render_prec(ctx, 5)),
                4,
            ),
            Expression::Let(parts) => (
                format!("let {} in {} end", parts.0.render(ctx), parts.1.render_prec(ctx, 0)),
                5,
            ),
            Expression::Deref(inner) => (format!("!{}", inner.render_prec(ctx, 5)), 5),
            Expression::Assign(parts) => (
                format!("{} := {}", parts.0.render_prec(ctx, 1), parts.1.render_prec(ctx, 1)),
                0,
            ),
            Expression::Annot(parts) => (
                format!("({} : {})", parts.0.render_prec(ctx, 0), parts.1.render(ctx)),
                5,
            ),
        };
        if own < prec {
            format!("({})", text)
        } else {
            text
        }
    }
}

impl Render for Expression {
    fn render(&self, ctx: &Context) -> String {
        self.render_prec(ctx, 0)
    }
}

impl Simplifiable for Expression {
    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self> {
        match self {
            Expression::Var(var) => match ctx.lookup(*var) {
                Some(bound) => Simplification::success(bound),
                None => Simplification::Pending,
            },
            _ => Simplification::Atomic,
        }
    }
}

impl Unify for Expression {
    const KIND: MismatchKind = MismatchKind::Expression;

    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome> {
        use Expression as X;
        let constraints: Vec<ConstraintFactory> = match (expected, actual) {
            (X::Bool(e), X::Bool(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (X::Nat(e), X::Nat(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (X::Char(e), X::Char(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (X::Unit, X::Unit) => Vec::new(),
            (X::Ident(e), X::Ident(a)) => return Ok(MatchOutcome::from_bool(e == a)),
            (X::If(e), X::If(a)) => {
                let mut constraints = must_match(ctx, &e.0, &a.0, None)?;
                constraints.extend(must_match(ctx, &e.1, &a.1, None)?);
                constraints.extend(must_match(ctx, &e.2, &a.2, None)?);
                constraints
            }
            (X::Binary(eo, e), X::Binary(ao, a)) if eo == ao => both(ctx, e, a)?,
            (X::Pair(e), X::Pair(a)) | (X::Apply(e), X::Apply(a)) | (X::Assign(e), X::Assign(a)) => {
                both(ctx, e, a)?
            }
            (X::Fn(e), X::Fn(a)) => {
                if e.0 != a.0 {
                    return Ok(MatchOutcome::Mismatch);
                }
                must_match(ctx, &e.1, &a.1, None)?
            }
            (X::Let(e), X::Let(a)) => {
                let mut constraints = must_match(ctx, &e.0, &a.0, None)?;
                constraints.extend(must_match(ctx, &e.1, &a.1, None)?);
                constraints
            }
            (X::Deref(e), X::Deref(a)) => must_match(ctx, &**e, &**a, None)?,
            (X::Annot(e), X::Annot(a)) => {
                let mut constraints = must_match(ctx, &e.0, &a.0, None)?;
                constraints.extend(must_match(ctx, &e.1, &a.1, None)?);
                constraints
            }
            _ => return Ok(MatchOutcome::Mismatch),
        };
        Ok(MatchOutcome::Matched(constraints))
    }
}

fn both(ctx: &Context, expected: &(Expression, Expression), actual: &(Expression, Expression)) -> Result<Vec<ConstraintFactory>> {
    let mut constraints = must_match(ctx, &expected.0, &actual.0, None)?;
    constraints.extend(must_match(ctx, &expected.1, &actual.1, None)?);
    Ok(constraints)
}

/// A declaration, possibly containing meta-variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Var(MetaVar<Declaration>),
    /// `val x = e`
    Val(Rc<(Identifier, Expression)>),
    /// `fun f x = e`
    Fun(Rc<(Identifier, Identifier, Expression)>),
    /// `d1; d2`
    Seq(Rc<(Declaration, Declaration)>),
    /// `local d1 in d2 end`
    Local(Rc<(Declaration, Declaration)>),
}

term_domain!(Declaration, Declaration, SymbolClass::Declaration);

/// Declaration constructors, as matched by rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclCtor {
    Val,
    Fun,
    Seq,
    Local,
}

impl DeclCtor {
    /// Kinds of the sub-parts, in construction order.
    pub fn params(self) -> &'static [ParamKind] {
        use ParamKind::{Declaration as D, Expression as E, Identifier as I};
        match self {
            DeclCtor::Val => &[I, E],
            DeclCtor::Fun => &[I, I, E],
            DeclCtor::Seq | DeclCtor::Local => &[D, D],
        }
    }
}

impl fmt::Display for DeclCtor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Declaration {
    pub fn val(name: Identifier, body: Expression) -> Self {
        Declaration::Val(Rc::new((name, body)))
    }

    pub fn fun(name: Identifier, param: Identifier, body: Expression) -> Self {
        Declaration::Fun(Rc::new((name, param, body)))
    }

    pub fn seq(first: Declaration, second: Declaration) -> Self {
        Declaration::Seq(Rc::new((first, second)))
    }

    pub fn local(hidden: Declaration, body: Declaration) -> Self {
        Declaration::Local(Rc::new((hidden, body)))
    }

    /// Constructor of this node; `None` for a meta-variable.
    pub fn ctor(&self) -> Option<DeclCtor> {
        match self {
            Declaration::Var(_) => None,
            Declaration::Val(_) => Some(DeclCtor::Val),
            Declaration::Fun(_) => Some(DeclCtor::Fun),
            Declaration::Seq(_) => Some(DeclCtor::Seq),
            Declaration::Local(_) => Some(DeclCtor::Local),
        }
    }

    /// Builds a `ctor` node from parts listed in `ctor.params()` order.
    pub fn construct(ctor: DeclCtor, parts: Vec<Part>) -> Result<Self> {
        let mut parts = Parts::new(ctor.to_string(), parts);
        let decl = match ctor {
            DeclCtor::Val => Declaration::Val(Rc::new((parts.ident()?, parts.expr()?))),
            DeclCtor::Fun => Declaration::Fun(Rc::new((parts.ident()?, parts.ident()?, parts.expr()?))),
            DeclCtor::Seq => Declaration::Seq(Rc::new((parts.decl()?, parts.decl()?))),
            DeclCtor::Local => Declaration::Local(Rc::new((parts.decl()?, parts.decl()?))),
        };
        parts.finish()?;
        Ok(decl)
    }
}

impl Render for Declaration {
    fn render(&self, ctx: &Context) -> String {
        match simplify(ctx, self) {
            Declaration::Var(var) => render_var(ctx, var),
            Declaration::Val(parts) => format!("val {} = {}", parts.0, parts.1.render(ctx)),
            Declaration::Fun(parts) => format!("fun {} {} = {}", parts.0, parts.1, parts.2.render(ctx)),
            Declaration::Seq(parts) => format!("{}; {}", parts.0.render(ctx), parts.1.render(ctx)),
            Declaration::Local(parts) => {
                format!("local {} in {} end", parts.0.render(ctx), parts.1.render(ctx))
            }
        }
    }
}

impl Simplifiable for Declaration {
    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self> {
        match self {
            Declaration::Var(var) => match ctx.lookup(*var) {
                Some(bound) => Simplification::success(bound),
                None => Simplification::Pending,
            },
            _ => Simplification::Atomic,
        }
    }
}

impl Unify for Declaration {
    const KIND: MismatchKind = MismatchKind::Declaration;

    fn match_atomic(ctx: &Context, expected: &Self, actual: &Self) -> Result<MatchOutcome> {
        let constraints = match (expected, actual) {
            (Declaration::Val(e), Declaration::Val(a)) => {
                if e.0 != a.0 {
                    return Ok(MatchOutcome::Mismatch);
                }
                must_match(ctx, &e.1, &a.1, None)?
            }
            (Declaration::Fun(e), Declaration::Fun(a)) => {
                if e.0 != a.0 || e.1 != a.1 {
                    return Ok(MatchOutcome::Mismatch);
                }
                must_match(ctx, &e.2, &a.2, None)?
            }
            (Declaration::Seq(e), Declaration::Seq(a)) | (Declaration::Local(e), Declaration::Local(a)) => {
                let mut constraints = must_match(ctx, &e.0, &a.0, None)?;
                constraints.extend(must_match(ctx, &e.1, &a.1, None)?);
                constraints
            }
            _ => return Ok(MatchOutcome::Mismatch),
        };
        Ok(MatchOutcome::Matched(constraints))
    }
}

/// Typed cursor over constructor parts.
struct Parts {
    ctor: String,
    parts: std::vec::IntoIter<Part>,
}

impl Parts {
    fn new(ctor: String, parts: Vec<Part>) -> Self {
        Self {
            ctor,
            parts: parts.into_iter(),
        }
    }

    fn next(&mut self, kind: ParamKind) -> Result<Part> {
        self.parts
            .next()
            .ok_or_else(|| EngineError::invariant(format!("{}: missing {:?} part", self.ctor, kind)))
    }

    fn wrong(&self, expected: ParamKind, found: &Part) -> EngineError {
        EngineError::invariant(format!(
            "{}: expected {:?} part, found {:?}",
            self.ctor,
            expected,
            found.kind()
        ))
    }

    fn expr(&mut self) -> Result<Expression> {
        match self.next(ParamKind::Expression)? {
            Part::Expression(expr) => Ok(expr),
            other => Err(self.wrong(ParamKind::Expression, &other)),
        }
    }

    fn decl(&mut self) -> Result<Declaration> {
        match self.next(ParamKind::Declaration)? {
            Part::Declaration(decl) => Ok(decl),
            other => Err(self.wrong(ParamKind::Declaration, &other)),
        }
    }

    fn ty(&mut self) -> Result<Type> {
        match self.next(ParamKind::Type)? {
            Part::Type(ty) => Ok(ty),
            other => Err(self.wrong(ParamKind::Type, &other)),
        }
    }

    fn nat(&mut self) -> Result<Datum<u64>> {
        match self.next(ParamKind::Nat)? {
            Part::Literal(Literal::Nat(n)) => Ok(n),
            other => Err(self.wrong(ParamKind::Nat, &other)),
        }
    }

    fn char(&mut self) -> Result<Datum<char>> {
        match self.next(ParamKind::Char)? {
            Part::Literal(Literal::Char(c)) => Ok(c),
            other => Err(self.wrong(ParamKind::Char, &other)),
        }
    }

    fn ident(&mut self) -> Result<Identifier> {
        match self.next(ParamKind::Identifier)? {
            Part::Literal(Literal::Ident(id)) => Ok(id),
            other => Err(self.wrong(ParamKind::Identifier, &other)),
        }
    }

    fn finish(mut self) -> Result<()> {
        match self.parts.next() {
            Some(extra) => Err(EngineError::invariant(format!(
                "{}: unexpected {:?} part",
                self.ctor,
                extra.kind()
            ))),
            None => Ok(()),
        }
    }
}
