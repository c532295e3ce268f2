//! Binding violations and the validation extension points.

use crate::{
    arguments::Arguments, descriptor::TargetDescriptor, outcome::Outcome, scope::ScopeStore,
};
use serde::Serialize;
use std::fmt;

/// What went wrong with one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required value is absent.
    Missing,
    /// The raw value cannot be coerced.
    Type {
        /// The expected semantic type.
        expected: String,
    },
    /// Length outside bounds.
    Length {
        /// Lower bound.
        min: Option<usize>,
        /// Upper bound.
        max: Option<usize>,
        /// Observed length.
        actual: usize,
    },
    /// Pattern mismatch.
    Pattern {
        /// The pattern source.
        pattern: String,
    },
    /// Numeric value outside bounds.
    Range {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
        /// Observed value.
        actual: f64,
    },
    /// A target-level validator rejected the input.
    Custom {
        /// Validator message.
        message: String,
    },
}

/// One constraint failure, attributed to an external parameter name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// External name (for bean fields, `mask + path`).
    pub name: String,
    /// Failure detail.
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    /// Create a violation.
    pub fn new(name: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a custom violation.
    pub fn custom(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            name,
            ViolationKind::Custom {
                message: message.into(),
            },
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: required", self.name),
            ViolationKind::Type { expected } => write!(f, "{}: expected {expected}", self.name),
            ViolationKind::Length { actual, .. } => {
                write!(f, "{}: length {actual} out of bounds", self.name)
            }
            ViolationKind::Pattern { pattern } => {
                write!(f, "{}: does not match {pattern}", self.name)
            }
            ViolationKind::Range { actual, .. } => {
                write!(f, "{}: {actual} out of range", self.name)
            }
            ViolationKind::Custom { message } => write!(f, "{}: {message}", self.name),
        }
    }
}

/// A target-level validator run after all bindings are resolved.
///
/// Use it for cross-field rules that a single binding constraint cannot
/// express.
pub trait Validator: Send + Sync + 'static {
    /// Return every violation found; an empty vector means valid.
    fn validate(&self, target: &TargetDescriptor, arguments: &Arguments) -> Vec<Violation>;
}

impl<F> Validator for F
where
    F: Fn(&TargetDescriptor, &Arguments) -> Vec<Violation> + Send + Sync + 'static,
{
    fn validate(&self, target: &TargetDescriptor, arguments: &Arguments) -> Vec<Violation> {
        (self)(target, arguments)
    }
}

/// Decides what happens when bound inputs carry violations.
///
/// Returning `Some(outcome)` replaces normal invocation: the handler is not
/// called. Returning `None` lets dispatch proceed.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `ViolationHandler`",
    label = "missing `ViolationHandler` implementation",
    note = "Violation handlers decide whether rejected inputs replace invocation with a substitute outcome."
)]
pub trait ViolationHandler: Send + Sync + 'static {
    /// Inspect the full violation set.
    fn handle(
        &self,
        target: &TargetDescriptor,
        violations: &[Violation],
        store: &mut dyn ScopeStore,
    ) -> Option<Outcome>;
}
