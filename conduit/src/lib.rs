//! # conduit - Declarative Action Dispatch
//!
//! `conduit` turns declared handler classes into invocable targets and
//! dispatches requests to them through configurable interceptor stacks.
//! Inputs are bound from request and session scopes by precedence, outputs
//! are written back, and the symbolic outcome of each call is mapped to a
//! render directive.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conduit::prelude::*;
//!
//! #[derive(Default)]
//! struct Profile;
//!
//! let profile = ActionClass::new("Profile")
//!     .constructor(Profile::default)
//!     .method(
//!         MethodDecl::new("save", |_: &mut Profile, args: &mut Arguments| {
//!             let name: String = args.value(0)?;
//!             args.put(1, &name.to_uppercase())?;
//!             Ok(Outcome::success())
//!         })
//!         .param(Binding::input("name").string().required())
//!         .param(Binding::output("display").to(Scope::Request))
//!         .outcome(OutcomeDecl::new("success")),
//!     );
//!
//! let dispatcher = Dispatcher::builder().class(profile).build()?;
//! let mut store = MemoryScopeStore::new(Session::new("s1")).submit("name", "jane");
//! let dispatch = dispatcher.invoke("Profile!save", &mut store, Phase::Action)?;
//! assert_eq!(dispatch.outcome, "success");
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use conduit_core::{
    // Arguments
    ArgumentError,
    Arguments,
    // Bindings
    BeanSpec,
    Binding,
    // Errors
    BoxError,
    // Targets
    CallAdapter,
    ConduitError,
    ConfigError,
    Constraint,
    DEFAULT_STACK,
    Direction,
    DispatchError,
    // Interception
    Interceptor,
    InterceptorKey,
    InterceptorState,
    Invocation,
    METHOD_SEPARATOR,
    Next,
    // Outcomes
    Outcome,
    OutcomeConvention,
    OutcomeDescriptor,
    Params,
    Phase,
    RenderDirective,
    RepeatableNext,
    // Scopes
    Scope,
    ScopeError,
    ScopeStore,
    TargetDescriptor,
    TargetDescriptorBuilder,
    TargetFlags,
    TargetId,
    // Validation
    Validator,
    Value,
    ValueKind,
    Violation,
    ViolationHandler,
    ViolationKind,
};

// Engine
pub use conduit_std::{
    config::{EngineConfig, ErrorView},
    dispatcher::{
        DefaultViolationHandler, Dispatch, Dispatcher, DispatcherBuilder, ERROR_KEY, ErrorReport,
        VIOLATIONS_KEY,
    },
    factory::{
        ActionClass, Candidate, FactorySettings, MethodDecl, MethodFn, OutcomeDecl, Rejection,
        ScanReport, TargetFactory,
    },
    registry::{RegistryBuilder, TargetRegistry},
    renderer::{Renderer, RendererSelector, RendererSet},
};

/// Parameter binding.
pub mod binder {
    pub use conduit_std::binder::{
        Bean, BoundInputs, CoercionError, ParameterBinder, check_constraints, coerce, flatten_bean,
        gather_bean,
    };
}

/// Interceptor stacks and their configuration.
pub mod pipeline {
    pub use conduit_std::pipeline::{
        InterceptorCatalog, InterceptorFactory, InterceptorRef, InterceptorStack, ParamValue,
        StackConfig, StackSet, StackSetBuilder,
    };
}

/// Standard interceptor implementations.
pub mod interceptors {
    #![allow(clippy::wildcard_imports)]
    pub use conduit_std::interceptors::*;
}

/// Scope store implementations.
pub mod scopes {
    pub use conduit_std::scopes::{MemoryScopeStore, ScopeMap, Session};
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use conduit_std::testing::*;
}

/// Link-time class registration.
#[cfg(feature = "inventory")]
pub mod collect {
    pub use conduit_std::collect::{ClassRegistration, collected_classes};
}

/// Prelude module - common imports for Conduit.
///
/// # Usage
///
/// ```rust,ignore
/// use conduit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Declaration
        ActionClass,
        Arguments,
        Binding,
        // Errors
        BoxError,
        ConfigError,
        Constraint,
        // Dispatch
        Dispatch,
        DispatchError,
        Dispatcher,
        EngineConfig,
        // Interception
        Interceptor,
        Invocation,
        MethodDecl,
        Next,
        Outcome,
        OutcomeDecl,
        Phase,
        RenderDirective,
        Renderer,
        // Scopes
        Scope,
        ScopeStore,
        TargetId,
        pipeline::InterceptorStack,
        scopes::{MemoryScopeStore, Session},
    };
}

#[cfg(feature = "inventory")]
pub use inventory;
