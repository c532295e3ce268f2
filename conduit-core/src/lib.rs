//! # conduit-core
//!
//! Core data model and traits for the Conduit action-invocation engine.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! handler crates and interceptor plugins that don't need the full
//! `conduit-std` implementation.
//!
//! # Layers
//!
//! Conduit is built leaf-first; each layer only depends on the ones above it
//! in this list.
//!
//! ## Layer 1: Scopes ([`ScopeStore`])
//!
//! Independent key→value containers with different lifetimes. The host
//! runtime owns them; the engine reads inputs and writes outputs.
//!
//! ## Layer 2: Targets ([`TargetId`], [`TargetDescriptor`])
//!
//! Immutable metadata describing one invocable handler method: its
//! [`Binding`]s, declared outcomes, [`TargetFlags`], interceptor stack name
//! and the [`CallAdapter`] that invokes it by position.
//!
//! ## Layer 3: Interception ([`Interceptor`])
//!
//! Cross-cutting behaviors wrapped around invocation. Each link receives the
//! [`Invocation`] and a [`Next`] handle, and may delegate, post-process or
//! short-circuit.
//!
//! ## Layer 4: Outcomes ([`Outcome`], [`RenderDirective`])
//!
//! The symbolic result of a dispatch, mapped through the target's outcome
//! table to a renderer id and renderer data.
//!
//! # Error Types
//!
//! - [`ConduitError`] - Top-level error type
//! - [`ConfigError`] - Registration and configuration errors
//! - [`DispatchError`] - Errors that abort a dispatch before invocation
//! - [`ScopeError`] - Recoverable scope write failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod arguments;
mod binding;
mod descriptor;
mod error;
mod interceptor;
mod outcome;
mod params;
mod phase;
mod scope;
mod state;
mod target;
mod validation;

// Re-exports
pub use arguments::{ArgumentError, Arguments};
pub use binding::{BeanSpec, Binding, Constraint, Direction, ValueKind};
pub use descriptor::{
    CallAdapter, DEFAULT_STACK, TargetDescriptor, TargetDescriptorBuilder, TargetFlags,
};
pub use error::{BoxError, ConduitError, ConfigError, DispatchError, ScopeError};
pub use interceptor::{Interceptor, Invocation, Next, RepeatableNext};
pub use outcome::{Outcome, OutcomeConvention, OutcomeDescriptor, RenderDirective};
pub use params::Params;
pub use phase::Phase;
pub use scope::{Scope, ScopeStore};
pub use state::{InterceptorKey, InterceptorState};
pub use target::{METHOD_SEPARATOR, TargetId};
pub use validation::{Validator, Violation, ViolationHandler, ViolationKind};

pub use serde_json::Value;
