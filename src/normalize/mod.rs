//! Lazy, memoized simplification.
//!
//! Terms that may still change as meta-variables get bound (variables,
//! symbolic additions, effect concatenations, layered mappings) classify
//! themselves through `Simplifiable`. The classification of a node is
//! memoized per `NodeKey` and recomputed only when a meta-variable it read
//! changes.

pub mod simplify;

pub use simplify::{get_simplification, is_atomic, simplify, try_simplify};

use crate::annotate::Annotated;
use crate::context::Context;
use crate::core::NodeKey;
use crate::domain::Domain;

/// Classification of a term.
#[derive(Debug, Clone, PartialEq)]
pub enum Simplification<T> {
    /// Fully simplified; matched structurally.
    Atomic,
    /// Blocked on an unbound meta-variable.
    Pending,
    /// Rewrites to a strictly different term.
    Success {
        result: T,
        /// The term before rewriting, for tooltips.
        before: Option<Annotated<T>>,
    },
    /// Cannot be simplified, e.g. `true + 1`.
    Failure { message: String, partial: Option<T> },
}

impl<T> Simplification<T> {
    /// A success without a tooltip.
    pub fn success(result: T) -> Self {
        Simplification::Success {
            result,
            before: None,
        }
    }

    /// A failure without a partial result.
    pub fn failure(message: impl Into<String>) -> Self {
        Simplification::Failure {
            message: message.into(),
            partial: None,
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Simplification::Atomic)
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Simplification<U> {
        match self {
            Simplification::Atomic => Simplification::Atomic,
            Simplification::Pending => Simplification::Pending,
            Simplification::Success { result, before } => Simplification::Success {
                result: f(result),
                before: before.map(|b| b.map(&f)),
            },
            Simplification::Failure { message, partial } => Simplification::Failure {
                message,
                partial: partial.map(f),
            },
        }
    }

    /// Like `map`, but `None` if any conversion fails.
    pub fn try_map<U>(self, f: impl Fn(T) -> Option<U>) -> Option<Simplification<U>> {
        Some(match self {
            Simplification::Atomic => Simplification::Atomic,
            Simplification::Pending => Simplification::Pending,
            Simplification::Success { result, before } => {
                let before = match before {
                    Some(b) => {
                        let inner = f(b.inner)?;
                        Some(Annotated {
                            inner,
                            suppress_tooltip: b.suppress_tooltip,
                            layer_marker: b.layer_marker,
                        })
                    }
                    None => None,
                };
                Simplification::Success {
                    result: f(result)?,
                    before,
                }
            }
            Simplification::Failure { message, partial } => Simplification::Failure {
                message,
                partial: match partial {
                    Some(p) => Some(f(p)?),
                    None => None,
                },
            },
        })
    }
}

/// A term that classifies itself lazily.
pub trait Simplifiable: Domain {
    /// Memo key of this node, for forms whose classification is worth caching.
    fn memo_key(&self) -> Option<NodeKey> {
        None
    }

    /// Computes the classification of this node. Called at most once per
    /// memo validity window for keyed nodes.
    fn compute_simplification(&self, ctx: &Context) -> Simplification<Self>;
}
