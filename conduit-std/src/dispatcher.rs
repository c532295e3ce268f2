//! # Dispatcher
//!
//! The entry point of the engine. A [`DispatcherBuilder`] collects the
//! configuration, handler classes, stacks, custom interceptor kinds and
//! renderers; [`DispatcherBuilder::build`] freezes them into a
//! [`Dispatcher`] that is cheap to clone and share across threads.
//!
//! # Dispatch Sequence
//!
//! ```text
//! invoke("Profile!save", store, phase)
//!   ├─ parse + lookup                 ConfigError::InvalidTarget
//!   ├─ phase check                    DispatchError::InvalidPhase
//!   ├─ bind inputs ── violations? ──> ViolationHandler (may substitute outcome)
//!   ├─ run interceptor stack ──> target call adapter
//!   │     └─ error? ──> ErrorReport in request scope, outcome "fatal"
//!   ├─ resolve outcome ──> RenderDirective   ConfigError::UnknownOutcome
//!   └─ bind outputs                   ScopeError (logged, skipped)
//! ```
//!
//! Nothing is invoked when the phase check fails: a non-idempotent target
//! reached through a passive entry point is rejected before any binding.

use crate::{
    binder::ParameterBinder,
    config::EngineConfig,
    factory::{Candidate, FactorySettings, Rejection, TargetFactory},
    pipeline::{InterceptorCatalog, InterceptorStack, StackSet},
    registry::{RegistryBuilder, TargetRegistry},
    renderer::{Renderer, RendererSelector, RendererSet},
};
use conduit_core::{
    ConduitError, ConfigError, DispatchError, Interceptor, Invocation, Outcome, Params, Phase,
    RenderDirective, Scope, ScopeError, ScopeStore, TargetDescriptor, TargetId, Violation,
    ViolationHandler,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request-scope key of the [`ErrorReport`] of a failed invocation.
pub const ERROR_KEY: &str = "conduit.error";

/// Request-scope key the default violation handler writes violations to.
pub const VIOLATIONS_KEY: &str = "conduit.violations";

// ============================================================================
// Results
// ============================================================================

/// Diagnostic summary of a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// The error message.
    pub message: String,
    /// Best-effort error kind, taken from the error's debug form.
    pub kind: String,
    /// Where the chain failed: an interceptor key or the target id.
    pub location: Option<String>,
    /// Messages of the underlying causes, outermost first.
    pub causes: Vec<String>,
}

impl ErrorReport {
    /// Summarize `error`.
    pub fn new(error: &(dyn std::error::Error + 'static), location: Option<String>) -> Self {
        let debug = format!("{error:?}");
        let kind: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            kind: if kind.is_empty() { "Error".to_string() } else { kind },
            location,
            causes,
        }
    }
}

/// The result of one dispatch.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// The dispatched target.
    pub target: TargetId,
    /// The phase it was dispatched in.
    pub phase: Phase,
    /// The outcome: the handler's, an interceptor's, a substitute for
    /// rejected inputs, or `"fatal"`.
    pub outcome: Outcome,
    /// What to render.
    pub directive: RenderDirective,
    /// Input violations, whether or not they prevented invocation.
    pub violations: Vec<Violation>,
    /// Set when the invocation failed.
    pub failure: Option<ErrorReport>,
    /// Output writes that were skipped.
    pub write_errors: Vec<ScopeError>,
    /// Whether the host may cache the rendered result.
    pub cacheable: bool,
    /// How many times the handler ran.
    pub invocations: usize,
}

impl Dispatch {
    /// Whether the handler ran and returned an outcome.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.invocations > 0
    }
}

// ============================================================================
// Violation handling
// ============================================================================

/// Records violations in the request scope and substitutes a fixed outcome.
#[derive(Debug, Clone)]
pub struct DefaultViolationHandler {
    outcome: Outcome,
}

impl DefaultViolationHandler {
    /// Substitute `outcome` whenever violations are found.
    pub fn new(outcome: impl Into<Outcome>) -> Self {
        Self {
            outcome: outcome.into(),
        }
    }
}

impl Default for DefaultViolationHandler {
    fn default() -> Self {
        Self::new(Outcome::INVALID_INPUT)
    }
}

impl ViolationHandler for DefaultViolationHandler {
    fn handle(
        &self,
        target: &TargetDescriptor,
        violations: &[Violation],
        store: &mut dyn ScopeStore,
    ) -> Option<Outcome> {
        tracing::debug!(id = %target.id(), count = violations.len(), "rejected inputs");
        match serde_json::to_value(violations) {
            Ok(value) => {
                if let Err(error) = store.set(Scope::Request, VIOLATIONS_KEY, value) {
                    tracing::warn!(%error, "could not record violations");
                }
            }
            Err(error) => tracing::warn!(%error, "could not serialize violations"),
        }
        Some(self.outcome.clone())
    }
}

// ============================================================================
// DispatcherBuilder
// ============================================================================

/// Collects everything a [`Dispatcher`] needs.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = DispatcherBuilder::new()
///     .with_config(EngineConfig::from_path("conduit.toml")?)
///     .class(profile_class())
///     .renderer("template", TemplateRenderer::new())
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    config: EngineConfig,
    classes: Vec<Box<dyn Candidate>>,
    targets: Vec<TargetDescriptor>,
    catalog: InterceptorCatalog,
    stacks: Vec<InterceptorStack>,
    renderers: RendererSet,
    violation_handler: Option<Arc<dyn ViolationHandler>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    /// Start with the default configuration and the standard interceptor
    /// kinds.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            classes: Vec::new(),
            targets: Vec::new(),
            catalog: InterceptorCatalog::with_defaults(),
            stacks: Vec::new(),
            renderers: RendererSet::new(),
            violation_handler: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a handler class.
    pub fn class(mut self, class: impl Candidate + 'static) -> Self {
        self.classes.push(Box::new(class));
        self
    }

    /// Register an already derived descriptor.
    pub fn target(mut self, descriptor: TargetDescriptor) -> Self {
        self.targets.push(descriptor);
        self
    }

    /// Make a custom interceptor kind available to stack configuration.
    pub fn interceptor_kind<I, F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        I: Interceptor,
        F: Fn(&Params) -> Result<I, ConfigError> + Send + Sync + 'static,
    {
        self.catalog.register_with(kind, factory);
        self
    }

    /// Add a stack built in code.
    pub fn stack(mut self, stack: InterceptorStack) -> Self {
        self.stacks.push(stack);
        self
    }

    /// Install a renderer.
    pub fn renderer(mut self, id: impl Into<String>, renderer: impl Renderer) -> Self {
        self.renderers.insert(id, renderer);
        self
    }

    /// Replace the [`DefaultViolationHandler`].
    pub fn violation_handler(mut self, handler: impl ViolationHandler) -> Self {
        self.violation_handler = Some(Arc::new(handler));
        self
    }

    /// Register every class submitted with [`inventory`].
    #[cfg(feature = "inventory")]
    pub fn collected(mut self) -> Self {
        self.classes.extend(crate::collect::collected_classes());
        self
    }

    /// Freeze everything into a dispatcher.
    ///
    /// Invalid classes and targets are rejected individually and reported
    /// through [`Dispatcher::rejections`]. Invalid configuration, stacks and
    /// render entry points fail the whole build.
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        let config = self.config;
        config.validate()?;

        let mut stacks = StackSet::builder();
        for stack in self.stacks {
            stacks.stack(stack)?;
        }
        stacks.configured(&config.stacks, &self.catalog)?;
        let stacks = stacks.build();
        if !stacks.contains(&config.default_stack) {
            return Err(ConfigError::UnknownStack(config.default_stack.clone()));
        }

        let factory = TargetFactory::new(FactorySettings {
            convention: config.convention(),
            default_stack: config.default_stack.clone(),
        });
        let report = factory.scan(self.classes.iter().map(|class| &**class));
        let mut rejections = report.rejected;

        let mut registry = RegistryBuilder::new().allow_overwrite(config.allow_overwrite);
        for descriptor in report.descriptors.into_iter().chain(self.targets) {
            let class = descriptor.class_name().to_string();
            let result = if stacks.contains(descriptor.stack()) {
                registry.register(descriptor)
            } else {
                Err(ConfigError::UnknownStack(descriptor.stack().to_string()))
            };
            if let Err(error) = result {
                tracing::warn!(%class, %error, "rejected target");
                rejections.push(Rejection { class, error });
            }
        }
        let registry = registry.build();

        for entry in &config.render_targets {
            let id = TargetId::parse(entry, &config.default_method)?;
            if !registry.lookup(&id)?.is_idempotent() {
                return Err(ConfigError::NonIdempotentEntry(id));
            }
        }

        let mut selector = RendererSelector::new(config.convention())
            .auto_outcomes(config.auto_outcomes)
            .reserve(config.invalid_input_outcome.as_str());
        for name in stacks.names() {
            for interceptor in stacks.get(name)?.interceptors() {
                for outcome in interceptor.outcomes() {
                    tracing::debug!(stack = name, interceptor = %interceptor.key(), %outcome, "reserved outcome");
                    selector = selector.reserve(outcome.as_str());
                }
            }
        }
        let violation_handler = self.violation_handler.unwrap_or_else(|| {
            Arc::new(DefaultViolationHandler::new(config.invalid_input_outcome.as_str()))
        });
        let binder = ParameterBinder::with_order(config.scope_order.iter().copied());

        tracing::info!(
            targets = registry.len(),
            stacks = stacks.names().len(),
            rejected = rejections.len(),
            "dispatcher ready"
        );
        Ok(Dispatcher {
            inner: Arc::new(Inner {
                config,
                registry,
                stacks,
                binder,
                selector,
                renderers: self.renderers,
                violation_handler,
                rejections,
            }),
        })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

struct Inner {
    config: EngineConfig,
    registry: TargetRegistry,
    stacks: StackSet,
    binder: ParameterBinder,
    selector: RendererSelector,
    renderers: RendererSet,
    violation_handler: Arc<dyn ViolationHandler>,
    rejections: Vec<Rejection>,
}

/// The frozen engine. Clones share the same tables.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.inner.registry)
            .field("stacks", &self.inner.stacks.names())
            .field("renderers", &self.inner.renderers)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatch the target named `target` (`Action` or `Action!method`).
    pub fn invoke(
        &self,
        target: &str,
        store: &mut dyn ScopeStore,
        phase: Phase,
    ) -> Result<Dispatch, DispatchError> {
        let id = TargetId::parse(target, &self.inner.config.default_method)?;
        self.invoke_id(&id, store, phase)
    }

    /// Dispatch the handler of event `name` in the [`Phase::Event`] phase.
    pub fn dispatch_event(&self, name: &str, store: &mut dyn ScopeStore) -> Result<Dispatch, DispatchError> {
        let id = self
            .inner
            .registry
            .lookup_by_event(name)
            .ok_or_else(|| DispatchError::UnknownEvent(name.to_string()))?
            .clone();
        self.invoke_id(&id, store, Phase::Event)
    }

    /// Dispatch `id`.
    pub fn invoke_id(
        &self,
        id: &TargetId,
        store: &mut dyn ScopeStore,
        phase: Phase,
    ) -> Result<Dispatch, DispatchError> {
        let inner = &*self.inner;
        let descriptor = inner.registry.lookup(id)?;
        if !phase.is_submission() && !descriptor.is_idempotent() {
            tracing::warn!(%id, %phase, "non-idempotent target reached from a passive phase");
            return Err(DispatchError::InvalidPhase {
                target: id.clone(),
                phase,
            });
        }
        let stack = Arc::clone(inner.stacks.get(descriptor.stack())?);

        let inputs = inner.binder.bind_inputs(&descriptor, store);
        let violations = inputs.violations;
        if !violations.is_empty()
            && let Some(outcome) = inner.violation_handler.handle(&descriptor, &violations, store)
        {
            let directive = inner.selector.resolve(&descriptor, &outcome)?;
            return Ok(Dispatch {
                target: id.clone(),
                phase,
                outcome,
                directive,
                violations,
                failure: None,
                write_errors: Vec::new(),
                cacheable: false,
                invocations: 0,
            });
        }

        let mut invocation = Invocation::new(&descriptor, store, inputs.arguments, phase);
        let result = stack.run(&mut invocation);
        let fault = invocation.fault().map(str::to_string);
        let invocations = invocation.invocations();
        let arguments = invocation.into_arguments();

        match result {
            Ok(outcome) => {
                // Outputs are only written once the outcome is known to render.
                let directive = inner.selector.resolve(&descriptor, &outcome)?;
                let write_errors = inner.binder.bind_outputs(&descriptor, store, &arguments, phase);
                tracing::debug!(%id, %outcome, renderer = %directive.renderer, "dispatched");
                Ok(Dispatch {
                    target: id.clone(),
                    phase,
                    outcome,
                    directive,
                    violations,
                    failure: None,
                    write_errors,
                    cacheable: descriptor.is_cacheable(),
                    invocations,
                })
            }
            Err(error) => {
                let report = ErrorReport::new(&*error, fault);
                tracing::error!(%id, error = %report.message, location = ?report.location, "invocation failed");
                match serde_json::to_value(&report) {
                    Ok(value) => {
                        if let Err(error) = store.set(Scope::Request, ERROR_KEY, value) {
                            tracing::warn!(%error, "could not record error report");
                        }
                    }
                    Err(error) => tracing::warn!(%error, "could not serialize error report"),
                }
                let directive = match descriptor.outcome(Outcome::FATAL) {
                    Some(declared) => declared.directive(),
                    None => self.error_directive(id),
                };
                Ok(Dispatch {
                    target: id.clone(),
                    phase,
                    outcome: Outcome::new(Outcome::FATAL),
                    directive,
                    violations,
                    failure: Some(report),
                    write_errors: Vec::new(),
                    cacheable: false,
                    invocations,
                })
            }
        }
    }

    /// Hand the directive of `dispatch` to its renderer.
    pub fn render(&self, dispatch: &Dispatch, store: &dyn ScopeStore) -> Result<(), ConduitError> {
        self.inner.renderers.render(&dispatch.directive, store)
    }

    /// The target registry.
    pub fn registry(&self) -> &TargetRegistry {
        &self.inner.registry
    }

    /// The interceptor stacks.
    pub fn stacks(&self) -> &StackSet {
        &self.inner.stacks
    }

    /// Classes and targets rejected while building.
    pub fn rejections(&self) -> &[Rejection] {
        &self.inner.rejections
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn error_directive(&self, id: &TargetId) -> RenderDirective {
        let config = &self.inner.config;
        RenderDirective {
            outcome: Outcome::new(Outcome::FATAL),
            renderer: config.error_view.renderer.clone(),
            data: self
                .inner
                .selector
                .convention()
                .expand(&config.error_view.data, id, Outcome::FATAL),
            mode: None,
            window_state: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        factory::{ActionClass, MethodDecl, OutcomeDecl},
        scopes::MemoryScopeStore,
        testing::{CountingInterceptor, RecordingRenderer, StaticOutcome},
    };
    use conduit_core::{Arguments, Binding, BoxError, DEFAULT_STACK};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Greeter;

    fn greet(_: &mut Greeter, args: &mut Arguments) -> Result<Outcome, BoxError> {
        let name: String = args.value(0)?;
        args.put(1, &format!("Hello, {name}"))?;
        Ok(Outcome::success())
    }

    fn greeter() -> ActionClass<Greeter> {
        ActionClass::new("Greeter").constructor(Greeter::default).method(
            MethodDecl::new("greet", greet)
                .idempotent()
                .param(Binding::input("name").string().required())
                .param(Binding::output("greeting").to(Scope::Request))
                .outcome(OutcomeDecl::new("success")),
        )
    }

    #[test]
    fn test_invoke_binds_and_resolves() {
        let dispatcher = DispatcherBuilder::new().class(greeter()).build().unwrap();
        let mut store = MemoryScopeStore::detached().submit("name", "Ada");

        let dispatch = dispatcher.invoke("Greeter!greet", &mut store, Phase::Render).unwrap();

        assert_eq!(dispatch.outcome, "success");
        assert_eq!(dispatch.directive.data, "/views/Greeter/greet/success");
        assert_eq!(dispatch.invocations, 1);
        assert_eq!(store.get(Scope::Request, "greeting"), Some(json!("Hello, Ada")));
    }

    #[test]
    fn test_violations_substitute_outcome() {
        let dispatcher = DispatcherBuilder::new().class(greeter()).build().unwrap();
        let mut store = MemoryScopeStore::detached();

        let dispatch = dispatcher.invoke("Greeter!greet", &mut store, Phase::Action).unwrap();

        assert_eq!(dispatch.outcome, Outcome::INVALID_INPUT);
        assert_eq!(dispatch.invocations, 0);
        assert_eq!(dispatch.directive.data, "/views/Greeter/greet/invalid_input");
        assert_eq!(
            store.get(Scope::Request, VIOLATIONS_KEY),
            Some(json!([{"name": "name", "kind": "missing"}]))
        );
    }

    #[test]
    fn test_passive_phase_rejects_non_idempotent() {
        let target = StaticOutcome::new("success");
        let descriptor = TargetDescriptor::builder(TargetId::new("Report", "export"), target.adapter()).build();
        let dispatcher = DispatcherBuilder::new()
            .with_config(EngineConfig {
                auto_outcomes: true,
                ..EngineConfig::default()
            })
            .target(descriptor)
            .build()
            .unwrap();
        let mut store = MemoryScopeStore::detached();

        let err = dispatcher.invoke("Report!export", &mut store, Phase::Resource).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPhase { phase: Phase::Resource, .. }));
        assert_eq!(target.calls(), 0);
        assert!(dispatcher.invoke("Report!export", &mut store, Phase::Action).is_ok());
        assert_eq!(target.calls(), 1);
    }

    #[test]
    fn test_failure_becomes_fatal_outcome() {
        let adapter: conduit_core::CallAdapter =
            Arc::new(|_args: &mut Arguments| -> Result<Outcome, BoxError> { Err("disk full".into()) });
        let descriptor = TargetDescriptor::builder(TargetId::new("Report", "execute"), adapter).build();
        let dispatcher = DispatcherBuilder::new().target(descriptor).build().unwrap();
        let mut store = MemoryScopeStore::detached();

        let dispatch = dispatcher.invoke("Report", &mut store, Phase::Action).unwrap();

        assert_eq!(dispatch.outcome, Outcome::FATAL);
        assert_eq!(dispatch.directive.data, "/views/error");
        let report = dispatch.failure.unwrap();
        assert_eq!(report.message, "disk full");
        assert_eq!(report.location.as_deref(), Some("Report!execute"));
        let stored: ErrorReport =
            serde_json::from_value(store.get(Scope::Request, ERROR_KEY).unwrap()).unwrap();
        assert_eq!(stored, report);
    }

    #[test]
    fn test_unknown_stack_rejects_target() {
        let target = StaticOutcome::new("success");
        let descriptor = TargetDescriptor::builder(TargetId::new("Audit", "run"), target.adapter())
            .stack("audited")
            .build();
        let dispatcher = DispatcherBuilder::new().target(descriptor).build().unwrap();

        assert_eq!(dispatcher.rejections().len(), 1);
        assert!(matches!(dispatcher.rejections()[0].error, ConfigError::UnknownStack(_)));
        let mut store = MemoryScopeStore::detached();
        let err = dispatcher.invoke("Audit!run", &mut store, Phase::Action).unwrap_err();
        assert!(matches!(err, DispatchError::Config(ConfigError::InvalidTarget(_))));
    }

    #[test]
    fn test_render_entry_must_be_idempotent() {
        let target = StaticOutcome::new("success");
        let descriptor = TargetDescriptor::builder(TargetId::new("Report", "export"), target.adapter()).build();
        let err = DispatcherBuilder::new()
            .with_config(EngineConfig {
                render_targets: vec!["Report!export".into()],
                ..EngineConfig::default()
            })
            .target(descriptor)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonIdempotentEntry(_)));
    }

    #[test]
    fn test_stack_short_circuit_and_render() {
        let gate = CountingInterceptor::short_circuit("denied");
        let renderer = RecordingRenderer::new();
        let target = StaticOutcome::new("success");
        let descriptor = TargetDescriptor::builder(TargetId::new("Vault", "open"), target.adapter())
            .stack("gated")
            .build();
        let dispatcher = DispatcherBuilder::new()
            .with_config(EngineConfig {
                auto_outcomes: true,
                ..EngineConfig::default()
            })
            .stack(InterceptorStack::new("gated").with(gate.clone()))
            .renderer("template", renderer.clone())
            .target(descriptor)
            .build()
            .unwrap();
        let mut store = MemoryScopeStore::detached();

        let dispatch = dispatcher.invoke("Vault!open", &mut store, Phase::Action).unwrap();
        dispatcher.render(&dispatch, &store).unwrap();

        assert_eq!(dispatch.outcome, "denied");
        assert_eq!(target.calls(), 0);
        assert_eq!(gate.count(), 1);
        assert_eq!(renderer.directives()[0].data, "/views/Vault/open/denied");
    }

    #[test]
    fn test_events_dispatch_in_event_phase() {
        let target = StaticOutcome::new("success");
        let descriptor = TargetDescriptor::builder(TargetId::new("Cart", "refresh"), target.adapter())
            .event("shop:item-added")
            .build();
        let dispatcher = DispatcherBuilder::new()
            .with_config(EngineConfig {
                auto_outcomes: true,
                ..EngineConfig::default()
            })
            .target(descriptor)
            .build()
            .unwrap();
        let mut store = MemoryScopeStore::detached();

        let dispatch = dispatcher.dispatch_event("shop:item-added", &mut store).unwrap();
        assert_eq!(dispatch.phase, Phase::Event);
        assert!(matches!(
            dispatcher.dispatch_event("shop:none", &mut store),
            Err(DispatchError::UnknownEvent(_))
        ));
    }

    #[test]
    fn test_default_stack_must_exist() {
        let err = DispatcherBuilder::new()
            .with_config(EngineConfig {
                default_stack: "missing".into(),
                ..EngineConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStack(_)));
        assert!(DispatcherBuilder::new().build().unwrap().stacks().contains(DEFAULT_STACK));
    }

    #[test]
    fn test_error_report_kind() {
        let err = ConfigError::UnknownStack("x".into());
        let report = ErrorReport::new(&err, None);
        assert_eq!(report.kind, "UnknownStack");
        let boxed: BoxError = "plain".into();
        assert_eq!(ErrorReport::new(&*boxed, None).kind, "Error");
    }
}
