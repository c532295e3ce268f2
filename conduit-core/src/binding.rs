//! Parameter bindings.
//!
//! A [`Binding`] associates one handler parameter position with an external
//! name, the scopes to search for it (inputs) or write it to (outputs), the
//! semantic type it is coerced to, and declarative constraints.

use crate::scope::Scope;
use regex::Regex;
use std::{collections::BTreeMap, fmt};

/// Direction of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Read from scopes before invocation.
    In,
    /// Written to a scope after invocation.
    Out,
    /// Both read before and written after invocation.
    InOut,
}

impl Direction {
    /// Whether the binding is read before invocation.
    pub const fn is_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Whether the binding is written after invocation.
    pub const fn is_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// The semantic type a raw scope value is coerced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// No coercion.
    Any,
    /// Text.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// Floating-point number.
    Number,
    /// Boolean (`true/false`, `on/off`, `yes/no`, `1/0`).
    Boolean,
    /// Homogeneous array; scalars become one-element arrays.
    Array(Box<ValueKind>),
    /// Structured bean populated from prefixed keys.
    Bean(BeanSpec),
}

impl ValueKind {
    /// Short human-readable name used in violations.
    pub fn name(&self) -> String {
        match self {
            ValueKind::Any => "any".to_string(),
            ValueKind::String => "string".to_string(),
            ValueKind::Integer => "integer".to_string(),
            ValueKind::Number => "number".to_string(),
            ValueKind::Boolean => "boolean".to_string(),
            ValueKind::Array(inner) => format!("array<{}>", inner.name()),
            ValueKind::Bean(spec) => format!("bean({})", spec.mask),
        }
    }
}

/// How a structured bean is assembled.
///
/// Every key starting with `mask` (e.g. `"user:"`) is collected, the mask is
/// stripped, and the remainder is treated as a dotted nested-field path
/// (`user:address.city` → `{"address": {"city": ..}}`). Listed fields are
/// coerced individually; unlisted fields are kept as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanSpec {
    /// Key prefix stripped from candidate keys.
    pub mask: String,
    /// Per-field coercions, keyed by dotted path.
    pub fields: BTreeMap<String, ValueKind>,
}

impl BeanSpec {
    /// Create a bean spec for keys starting with `mask`.
    pub fn new(mask: impl Into<String>) -> Self {
        Self {
            mask: mask.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Coerce the field at `path` to `kind`.
    pub fn field(mut self, path: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(path.into(), kind);
        self
    }
}

/// A declarative validation constraint.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// The value must be present.
    Required,
    /// String length (in chars) or array length bounds, inclusive.
    Length {
        /// Minimum length.
        min: Option<usize>,
        /// Maximum length.
        max: Option<usize>,
    },
    /// The string must match the whole pattern.
    Pattern(Regex),
    /// Numeric bounds, inclusive.
    Range {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Required, Constraint::Required) => true,
            (
                Constraint::Length { min: a, max: b },
                Constraint::Length { min: c, max: d },
            ) => a == c && b == d,
            (Constraint::Pattern(a), Constraint::Pattern(b)) => a.as_str() == b.as_str(),
            (
                Constraint::Range { min: a, max: b },
                Constraint::Range { min: c, max: d },
            ) => a == c && b == d,
            _ => false,
        }
    }
}

/// One handler parameter binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    position: Option<usize>,
    direction: Direction,
    name: String,
    scopes: Vec<Scope>,
    output_scope: Scope,
    kind: ValueKind,
    constraints: Vec<Constraint>,
}

impl Binding {
    fn with_direction(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            position: None,
            direction,
            name: name.into(),
            scopes: Vec::new(),
            output_scope: Scope::Request,
            kind: ValueKind::Any,
            constraints: Vec::new(),
        }
    }

    /// An input binding read before invocation.
    pub fn input(name: impl Into<String>) -> Self {
        Self::with_direction(name, Direction::In)
    }

    /// An output binding written after invocation (to the request scope
    /// unless [`Binding::to`] says otherwise).
    pub fn output(name: impl Into<String>) -> Self {
        Self::with_direction(name, Direction::Out)
    }

    /// A binding that is both read and written back.
    pub fn in_out(name: impl Into<String>) -> Self {
        Self::with_direction(name, Direction::InOut)
    }

    /// Pin the binding to a parameter position.
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Candidate scopes, searched in the given order.
    pub fn from(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Scope written by an output binding.
    pub fn to(mut self, scope: Scope) -> Self {
        self.output_scope = scope;
        self
    }

    /// Coerce to `kind`.
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Coerce to a string.
    pub fn string(self) -> Self {
        self.kind(ValueKind::String)
    }

    /// Coerce to an integer.
    pub fn integer(self) -> Self {
        self.kind(ValueKind::Integer)
    }

    /// Coerce to a floating-point number.
    pub fn number(self) -> Self {
        self.kind(ValueKind::Number)
    }

    /// Coerce to a boolean.
    pub fn boolean(self) -> Self {
        self.kind(ValueKind::Boolean)
    }

    /// Coerce to an array of `element`.
    pub fn array(self, element: ValueKind) -> Self {
        self.kind(ValueKind::Array(Box::new(element)))
    }

    /// Populate a bean from prefixed keys.
    pub fn bean(self, spec: BeanSpec) -> Self {
        self.kind(ValueKind::Bean(spec))
    }

    /// Add a constraint.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// The value must be present.
    pub fn required(self) -> Self {
        self.constraint(Constraint::Required)
    }

    /// Inclusive length bounds.
    pub fn length(self, min: Option<usize>, max: Option<usize>) -> Self {
        self.constraint(Constraint::Length { min, max })
    }

    /// Inclusive numeric bounds.
    pub fn range(self, min: impl Into<Option<f64>>, max: impl Into<Option<f64>>) -> Self {
        self.constraint(Constraint::Range {
            min: min.into(),
            max: max.into(),
        })
    }

    /// Whole-value pattern match.
    pub fn pattern(self, pattern: Regex) -> Self {
        self.constraint(Constraint::Pattern(pattern))
    }

    /// Declared position, if pinned.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// External name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared candidate scopes (empty means "use the binder default").
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Output scope.
    pub fn output_scope(&self) -> Scope {
        self.output_scope
    }

    /// Semantic type.
    pub fn value_kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Constraints.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Merge an input and an output declaration for the same parameter into
    /// one in/out binding.
    ///
    /// Returns `None` when the two are incompatible: different names, or
    /// directions that are not exactly one input and one output.
    pub fn merge(self, other: Binding) -> Option<Binding> {
        if self.name != other.name {
            return None;
        }
        let (input, output) = match (self.direction, other.direction) {
            (Direction::In, Direction::Out) => (self, other),
            (Direction::Out, Direction::In) => (other, self),
            _ => return None,
        };
        let mut constraints = input.constraints;
        constraints.extend(output.constraints);
        Some(Binding {
            position: input.position.or(output.position),
            direction: Direction::InOut,
            name: input.name,
            scopes: input.scopes,
            output_scope: output.output_scope,
            kind: input.kind,
            constraints,
        })
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            Direction::In => "<-",
            Direction::Out => "->",
            Direction::InOut => "<->",
        };
        write!(f, "{} {} {}", self.name, arrow, self.kind.name())
    }
}
