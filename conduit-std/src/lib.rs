//! # conduit-std
//!
//! Standard implementations for the Conduit action-invocation engine.
//!
//! This crate provides:
//! - **Discovery**: [`factory::TargetFactory`] and [`registry::TargetRegistry`]
//! - **Binding**: [`binder::ParameterBinder`] with scope precedence and validation
//! - **Interception**: [`pipeline::StackSet`], stack configuration and the
//!   standard [`interceptors`]
//! - **Rendering**: [`renderer::RendererSelector`] and [`renderer::RendererSet`]
//! - **Dispatch**: [`dispatcher::Dispatcher`], configured by [`config::EngineConfig`]
//! - **Scopes**: the in-memory [`scopes::MemoryScopeStore`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use conduit_core;

// Modules
pub mod binder;
#[cfg(feature = "inventory")]
pub mod collect;
pub mod config;
pub mod dispatcher;
pub mod factory;
pub mod interceptors;
pub mod pipeline;
pub mod registry;
pub mod renderer;
pub mod scopes;
pub mod testing;

#[cfg(feature = "inventory")]
pub use inventory;
