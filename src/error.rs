//! Engine errors

use std::fmt;
use thiserror::Error;

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors
///
/// `Mismatch`, `RuleNotApplicable` and `Cancelled` are reported to the
/// learner; `Invariant` means the engine or a rule was used incorrectly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    #[error("rule `{rule}` is not applicable to {subject} `{found}`")]
    RuleNotApplicable {
        rule: String,
        subject: Subject,
        found: String,
    },

    #[error("argument query cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    /// Shorthand for an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        EngineError::Invariant(message.into())
    }

    /// Returns `true` for errors the learner can recover from by choosing
    /// differently.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Invariant(_))
    }

    /// Returns the mismatch, if this is one.
    pub fn as_mismatch(&self) -> Option<&Mismatch> {
        match self {
            EngineError::Mismatch(m) => Some(m),
            _ => None,
        }
    }
}

/// What kind of judgment subject a rule expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Expression,
    Declaration,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Expression => f.write_str("expression"),
            Subject::Declaration => f.write_str("declaration"),
        }
    }
}

/// Domain in which a mismatch was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchKind {
    Value,
    Type,
    Effect,
    Mapping,
    Expression,
    Declaration,
    Identifier,
    Arithmetic,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MismatchKind::Value => "value",
            MismatchKind::Type => "type",
            MismatchKind::Effect => "effect",
            MismatchKind::Mapping => "mapping",
            MismatchKind::Expression => "expression",
            MismatchKind::Declaration => "declaration",
            MismatchKind::Identifier => "identifier",
            MismatchKind::Arithmetic => "arithmetic",
        };
        f.write_str(name)
    }
}

/// A failed match, with both operands already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub expected: String,
    pub actual: String,
    /// What the operands are, e.g. "result type".
    pub object: Option<String>,
    /// Replaces the default "expected/found" wording.
    pub message: Option<String>,
}

impl Mismatch {
    /// Creates a mismatch between two rendered operands.
    pub fn new(kind: MismatchKind, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            kind,
            expected: expected.into(),
            actual: actual.into(),
            object: None,
            message: None,
        }
    }

    /// Creates a mismatch that is described by a message only.
    pub fn message(kind: MismatchKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            expected: String::new(),
            actual: String::new(),
            object: None,
            message: Some(message.into()),
        }
    }

    /// Attaches an object label.
    pub fn with_object(mut self, object: Option<&str>) -> Self {
        self.object = object.map(str::to_owned);
        self
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mismatch", self.kind)?;
        if let Some(object) = &self.object {
            write!(f, " in {}", object)?;
        }
        match &self.message {
            Some(message) => write!(f, ": {}", message),
            None => write!(f, ": expected `{}`, found `{}`", self.expected, self.actual),
        }
    }
}

impl std::error::Error for Mismatch {}
