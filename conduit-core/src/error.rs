//! Error types for Conduit.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`ConduitError`] - Top-level error type for all Conduit operations
//! - [`ConfigError`] - Registration and configuration errors (startup or first lookup)
//! - [`DispatchError`] - Errors that abort a dispatch before the handler runs
//! - [`ScopeError`] - Recoverable scope write failures

use crate::{phase::Phase, scope::Scope, target::TargetId};
use thiserror::Error;

/// A boxed error type for handler and interceptor failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Conduit operations.
#[derive(Error, Debug)]
pub enum ConduitError {
    /// A configuration or registration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dispatch was rejected.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A scope write failed.
    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors detected while building or consulting the target tables.
///
/// These are fatal to the offending registration but never to the whole
/// startup scan.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A textual target id could not be parsed.
    #[error("malformed target id: {0:?}")]
    MalformedTarget(String),

    /// No target is registered under this id.
    #[error("no target registered for {0}")]
    InvalidTarget(TargetId),

    /// A target id was registered twice without `allow_overwrite`.
    #[error("target {0} is already registered")]
    DuplicateTarget(TargetId),

    /// One event name was declared by two different targets.
    #[error("event {event:?} is already handled by {existing}, cannot map it to {incoming}")]
    DuplicateEvent {
        /// The event qualified name.
        event: String,
        /// The target that already owns the event.
        existing: TargetId,
        /// The target that tried to claim it.
        incoming: TargetId,
    },

    /// Two invocable methods of one class share a name.
    #[error("class {class} declares method {method:?} more than once")]
    AmbiguousMethod {
        /// The handler class.
        class: String,
        /// The overloaded method name.
        method: String,
    },

    /// The class has no constructor (abstract).
    #[error("class {0} has no accessible constructor")]
    NoConstructor(String),

    /// Two bindings on the same parameter position cannot be merged.
    #[error("conflicting bindings for parameter {position} of {target}")]
    ConflictingBinding {
        /// The target declaring the bindings.
        target: TargetId,
        /// The parameter position.
        position: usize,
    },

    /// Parameter positions of a target leave a gap.
    #[error("parameter {position} of {target} has no binding")]
    SparseBinding {
        /// The target declaring the bindings.
        target: TargetId,
        /// The first unbound position.
        position: usize,
    },

    /// A target or configuration names a stack that does not exist.
    #[error("unknown interceptor stack {0:?}")]
    UnknownStack(String),

    /// Two stacks share a name.
    #[error("interceptor stack {0:?} is defined more than once")]
    DuplicateStack(String),

    /// A stack references an interceptor kind that is not in the catalog.
    #[error("stack {stack:?} references unknown interceptor {name:?}")]
    UnknownInterceptor {
        /// The referencing stack.
        stack: String,
        /// The unresolved reference.
        name: String,
    },

    /// Stack references form a cycle.
    #[error("interceptor stack {0:?} references itself")]
    StackCycle(String),

    /// An interceptor parameter is missing or malformed.
    #[error("invalid parameter {param:?} for interceptor {interceptor:?}: {reason}")]
    InvalidParam {
        /// The interceptor kind.
        interceptor: String,
        /// The parameter key.
        param: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A passive entry point was configured with a non-idempotent target.
    #[error("target {0} is not idempotent and cannot be a render entry point")]
    NonIdempotentEntry(TargetId),

    /// An outcome id has no descriptor and auto-configuration is disabled.
    #[error("target {target} does not declare outcome {outcome:?}")]
    UnknownOutcome {
        /// The target that produced the outcome.
        target: TargetId,
        /// The undeclared outcome id.
        outcome: String,
    },

    /// A directive names a renderer that is not installed.
    #[error("no renderer registered as {0:?}")]
    UnknownRenderer(String),

    /// A configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    Parse(String),

    /// A configuration file could not be read.
    #[error("failed to read configuration")]
    Io(#[from] std::io::Error),
}

/// Errors that reject a dispatch before any handler work happens.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A non-idempotent target was dispatched from a passive phase.
    #[error("target {target} is not idempotent and cannot be invoked in the {phase} phase")]
    InvalidPhase {
        /// The rejected target.
        target: TargetId,
        /// The phase of the entry point.
        phase: Phase,
    },

    /// No target handles the event.
    #[error("no target handles event {0:?}")]
    UnknownEvent(String),

    /// A configuration error surfaced during dispatch.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Recoverable errors raised when writing into a scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope cannot be written at all.
    #[error("scope {0} is read-only")]
    ReadOnly(Scope),

    /// The scope cannot be written in the current phase.
    #[error("scope {scope} cannot be written during the {phase} phase")]
    PhaseRestricted {
        /// The constrained scope.
        scope: Scope,
        /// The phase that attempted the write.
        phase: Phase,
    },

    /// The host refused the write.
    #[error("write of {key:?} into {scope} rejected: {reason}")]
    Rejected {
        /// The target scope.
        scope: Scope,
        /// The key being written.
        key: String,
        /// The host's reason.
        reason: String,
    },
}

// Convenience conversions
impl From<BoxError> for ConduitError {
    fn from(err: BoxError) -> Self {
        ConduitError::Custom(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let id = TargetId::new("Profile", "save");
        assert_eq!(
            ConfigError::InvalidTarget(id.clone()).to_string(),
            "no target registered for Profile!save"
        );
        let err = ConfigError::AmbiguousMethod {
            class: "Profile".into(),
            method: "save".into(),
        };
        assert_eq!(err.to_string(), "class Profile declares method \"save\" more than once");
    }

    #[test]
    fn test_dispatch_error_wraps_config() {
        let err: DispatchError = ConfigError::UnknownStack("audit".into()).into();
        assert!(matches!(err, DispatchError::Config(ConfigError::UnknownStack(_))));
        assert_eq!(err.to_string(), "unknown interceptor stack \"audit\"");
    }

    #[test]
    fn test_scope_error_display() {
        let err = ScopeError::PhaseRestricted {
            scope: Scope::Submission,
            phase: Phase::Render,
        };
        assert_eq!(
            err.to_string(),
            "scope submission cannot be written during the render phase"
        );
    }
}
