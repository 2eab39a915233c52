//! Tooltip annotations around simplified terms.
//!
//! A simplification may carry the term it started from so a front end can
//! show "this came from `2 + 3`". `Annotated` wraps such a term with the
//! display hints the front end needs. Wrappers nest; `unwrap` peels exactly
//! one layer.

use crate::core::NodeKey;

/// A term with display hints.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated<T> {
    pub inner: T,
    /// Do not show a tooltip for this layer.
    pub suppress_tooltip: bool,
    /// Marks a layer boundary of a layered mapping.
    pub layer_marker: Option<NodeKey>,
}

impl<T> Annotated<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            suppress_tooltip: false,
            layer_marker: None,
        }
    }

    /// Wraps `inner` without a tooltip.
    pub fn suppressed(inner: T) -> Self {
        Self {
            inner,
            suppress_tooltip: true,
            layer_marker: None,
        }
    }

    /// Wraps `inner` as the layer produced by the node under `marker`.
    pub fn layer(inner: T, marker: NodeKey) -> Self {
        Self {
            inner,
            suppress_tooltip: false,
            layer_marker: Some(marker),
        }
    }

    /// Removes this layer only.
    pub fn unwrap(self) -> T {
        self.inner
    }

    pub fn get(&self) -> &T {
        &self.inner
    }

    pub fn shows_tooltip(&self) -> bool {
        !self.suppress_tooltip
    }

    /// Maps the wrapped term, keeping the hints.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Annotated<U> {
        Annotated {
            inner: f(self.inner),
            suppress_tooltip: self.suppress_tooltip,
            layer_marker: self.layer_marker,
        }
    }
}
