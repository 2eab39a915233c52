//! Object-language domains.
//!
//! Six mutually recursive domains make up a judgment: expressions and
//! declarations (`ast`), types (`ty`), values (`value`), external effects
//! (`effect`) and layered finite maps (`crate::mapping`). Each domain has a
//! meta-variable form, so any part of a judgment may still be unknown.
//!
//! Bindings of all domains share one storage slot type, `Term`.

use crate::context::Context;
use crate::core::{MetaVar, SymbolClass};
use crate::mapping::{Environment, Signature, Store};
use std::fmt;

/// Implements `Domain` for a type with a `Var(MetaVar<Self>)` variant.
macro_rules! term_domain {
    ($ty:ty, $variant:ident, $class:expr) => {
        impl $crate::domain::Domain for $ty {
            const CLASS: $crate::core::SymbolClass = $class;

            fn into_term(self) -> $crate::domain::Term {
                $crate::domain::Term::$variant(self)
            }

            fn from_term(term: $crate::domain::Term) -> Option<Self> {
                match term {
                    $crate::domain::Term::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn as_meta(&self) -> Option<$crate::core::MetaVar<Self>> {
                match self {
                    Self::Var(var) => Some(*var),
                    _ => None,
                }
            }

            fn from_meta(var: $crate::core::MetaVar<Self>) -> Self {
                Self::Var(var)
            }
        }
    };
}

pub(crate) use term_domain;

pub mod ast;
pub mod effect;
pub mod ty;
pub mod value;

use ast::{Declaration, Expression};
use effect::Effect;
use ty::Type;
use value::Value;

/// Plain-text rendering against the current bindings.
pub trait Render {
    fn render(&self, ctx: &Context) -> String;
}

/// A domain whose terms may be meta-variables.
pub trait Domain: Render + Clone + PartialEq + fmt::Debug + 'static {
    /// Rendering class of this domain's meta-variables.
    const CLASS: SymbolClass;

    fn into_term(self) -> Term;

    fn from_term(term: Term) -> Option<Self>;

    /// The meta-variable this term is, if it is one.
    fn as_meta(&self) -> Option<MetaVar<Self>>;

    fn from_meta(var: MetaVar<Self>) -> Self;
}

/// A binding of any domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Expression(Expression),
    Declaration(Declaration),
    Type(Type),
    Value(Value),
    Effect(Effect),
    Environment(Environment),
    Store(Store),
    Signature(Signature),
}

/// Renders a meta-variable: its binding if bound, its label otherwise.
pub(crate) fn render_var<T: Domain>(ctx: &Context, var: MetaVar<T>) -> String {
    match ctx.lookup(var) {
        Some(bound) => bound.render(ctx),
        None => ctx.label(var),
    }
}
