//! # Target Factory
//!
//! Turns explicit handler class declarations into [`TargetDescriptor`]s.
//!
//! A class is an [`ActionClass<A>`]: a name, an optional constructor for the
//! handler type `A`, and a set of [`MethodDecl`]s (its own plus any
//! inherited from base classes). Each kept method becomes one target whose
//! call adapter constructs a fresh `A` and calls the method by position.
//!
//! # Rejection Rules
//!
//! A class is rejected as a whole, and the scan continues with the next one,
//! when:
//!
//! - it has no constructor ([`ConfigError::NoConstructor`]);
//! - two of its own methods, or two inherited methods, share a name
//!   ([`ConfigError::AmbiguousMethod`]); an own method overriding an
//!   inherited one is fine;
//! - two bindings of one method claim the same position and do not merge
//!   into one in/out binding ([`ConfigError::ConflictingBinding`]);
//! - binding positions leave a gap ([`ConfigError::SparseBinding`]).

use conduit_core::{
    Arguments, Binding, BoxError, CallAdapter, ConfigError, DEFAULT_STACK, Outcome,
    OutcomeConvention, OutcomeDescriptor, TargetDescriptor, TargetFlags, TargetId, Validator,
};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

/// A handler method body: receives a fresh handler instance and the bound
/// positional arguments.
pub type MethodFn<A> =
    Arc<dyn Fn(&mut A, &mut Arguments) -> Result<Outcome, BoxError> + Send + Sync>;

type Constructor<A> = Arc<dyn Fn() -> A + Send + Sync>;

// ============================================================================
// Declarations
// ============================================================================

/// Declaration of one outcome of a method.
///
/// Renderer and data default to the engine's naming convention; explicit
/// data may still use the `{root}`, `{action}`, `{method}` and `{outcome}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeDecl {
    id: String,
    renderer: Option<String>,
    data: Option<String>,
    mode: Option<String>,
    window_state: Option<String>,
}

impl OutcomeDecl {
    /// Declare outcome `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            renderer: None,
            data: None,
            mode: None,
            window_state: None,
        }
    }

    /// Renderer id.
    pub fn renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    /// Renderer-specific data.
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Mode transition hint.
    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Window state transition hint.
    pub fn window_state(mut self, state: impl Into<String>) -> Self {
        self.window_state = Some(state.into());
        self
    }

    fn materialize(&self, target: &TargetId, convention: &OutcomeConvention) -> OutcomeDescriptor {
        let template = self.data.as_deref().unwrap_or(&convention.template);
        OutcomeDescriptor {
            id: self.id.clone(),
            renderer: self
                .renderer
                .clone()
                .unwrap_or_else(|| convention.renderer.clone()),
            data: convention.expand(template, target, &self.id),
            mode: self.mode.clone(),
            window_state: self.window_state.clone(),
        }
    }
}

/// Declaration of one invocable method of a handler class.
pub struct MethodDecl<A> {
    name: String,
    call: MethodFn<A>,
    bindings: Vec<Binding>,
    flags: TargetFlags,
    stack: Option<String>,
    outcomes: Vec<OutcomeDecl>,
    events: Vec<String>,
    validator: Option<Arc<dyn Validator>>,
}

impl<A> MethodDecl<A> {
    /// Declare method `name` with its body.
    pub fn new<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(&mut A, &mut Arguments) -> Result<Outcome, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            call: Arc::new(call),
            bindings: Vec::new(),
            flags: TargetFlags::empty(),
            stack: None,
            outcomes: Vec::new(),
            events: Vec::new(),
            validator: None,
        }
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare the next parameter. Unpinned bindings take the position equal
    /// to their declaration index.
    pub fn param(mut self, binding: Binding) -> Self {
        let binding = match binding.position() {
            Some(_) => binding,
            None => binding.at(self.bindings.len()),
        };
        self.bindings.push(binding);
        self
    }

    /// Mark the method idempotent.
    pub fn idempotent(mut self) -> Self {
        self.flags |= TargetFlags::IDEMPOTENT;
        self
    }

    /// Mark the rendered result cacheable.
    pub fn cacheable(mut self) -> Self {
        self.flags |= TargetFlags::CACHEABLE;
        self
    }

    /// Run inside the named interceptor stack.
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Declare an outcome.
    pub fn outcome(mut self, outcome: OutcomeDecl) -> Self {
        self.outcomes.push(outcome);
        self
    }

    /// Handle the declared event name.
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Attach a target-level validator.
    pub fn validator(mut self, validator: impl Validator) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    fn resolve_bindings(&self, target: &TargetId) -> Result<Vec<Binding>, ConfigError> {
        let mut by_position: BTreeMap<usize, Binding> = BTreeMap::new();
        for binding in &self.bindings {
            let position = binding.position().unwrap_or_default();
            let merged = match by_position.remove(&position) {
                None => binding.clone(),
                Some(existing) => existing.merge(binding.clone()).ok_or_else(|| {
                    ConfigError::ConflictingBinding {
                        target: target.clone(),
                        position,
                    }
                })?,
            };
            by_position.insert(position, merged);
        }
        for (expected, position) in by_position.keys().enumerate() {
            if *position != expected {
                return Err(ConfigError::SparseBinding {
                    target: target.clone(),
                    position: expected,
                });
            }
        }
        Ok(by_position.into_values().collect())
    }
}

impl<A> Clone for MethodDecl<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            call: Arc::clone(&self.call),
            bindings: self.bindings.clone(),
            flags: self.flags,
            stack: self.stack.clone(),
            outcomes: self.outcomes.clone(),
            events: self.events.clone(),
            validator: self.validator.clone(),
        }
    }
}

/// Declaration of a handler class.
///
/// # Example
///
/// ```rust,ignore
/// let profile = ActionClass::new("Profile")
///     .constructor(Profile::default)
///     .method(
///         MethodDecl::new("save", |p: &mut Profile, args| p.save(args))
///             .param(Binding::input("name").string().required())
///             .outcome(OutcomeDecl::new("success")),
///     );
/// ```
pub struct ActionClass<A> {
    name: String,
    constructor: Option<Constructor<A>>,
    inherited: Vec<MethodDecl<A>>,
    methods: Vec<MethodDecl<A>>,
}

impl<A: 'static> ActionClass<A> {
    /// Declare a class. Without a constructor it is abstract and can only
    /// serve as a base for [`ActionClass::inherit`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructor: None,
            inherited: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the handler constructor.
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// Inherit every effective method of `base`.
    pub fn inherit(mut self, base: &ActionClass<A>) -> Self {
        self.inherited.extend(base.effective_methods());
        self
    }

    /// Declare an own method.
    pub fn method(mut self, method: MethodDecl<A>) -> Self {
        self.methods.push(method);
        self
    }

    /// Erase the handler type for registration.
    pub fn boxed(self) -> Box<dyn Candidate> {
        Box::new(self)
    }

    fn effective_methods(&self) -> Vec<MethodDecl<A>> {
        let own: HashSet<&str> = self.methods.iter().map(MethodDecl::name).collect();
        self.inherited
            .iter()
            .filter(|m| !own.contains(m.name()))
            .chain(&self.methods)
            .cloned()
            .collect()
    }

    fn check_unique(&self, methods: &[MethodDecl<A>]) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for method in methods {
            if !seen.insert(method.name()) {
                return Err(ConfigError::AmbiguousMethod {
                    class: self.name.clone(),
                    method: method.name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn adapter(constructor: &Constructor<A>, method: &MethodDecl<A>) -> CallAdapter {
        let constructor = Arc::clone(constructor);
        let call = Arc::clone(&method.call);
        Arc::new(move |args: &mut Arguments| -> Result<Outcome, BoxError> {
            let mut handler = constructor();
            call(&mut handler, args)
        })
    }
}

// ============================================================================
// Candidate - type-erased class declaration
// ============================================================================

/// Settings the factory applies while deriving descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorySettings {
    /// Naming convention for outcomes without explicit data.
    pub convention: OutcomeConvention,
    /// Stack used by methods that name none.
    pub default_stack: String,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            convention: OutcomeConvention::default(),
            default_stack: DEFAULT_STACK.to_string(),
        }
    }
}

/// A type-erased handler class declaration.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a handler class candidate",
    label = "missing `Candidate` implementation",
    note = "Wrap handler types in `ActionClass<A>` to register them."
)]
pub trait Candidate: Send + Sync {
    /// Class name, used in reports.
    fn class_name(&self) -> &str;

    /// Derive every target of the class, or the reason it is rejected.
    fn describe(&self, settings: &FactorySettings) -> Result<Vec<TargetDescriptor>, ConfigError>;
}

impl<A: 'static> Candidate for ActionClass<A> {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn describe(&self, settings: &FactorySettings) -> Result<Vec<TargetDescriptor>, ConfigError> {
        let constructor = self
            .constructor
            .as_ref()
            .ok_or_else(|| ConfigError::NoConstructor(self.name.clone()))?;
        self.check_unique(&self.methods)?;
        self.check_unique(&self.inherited)?;

        self.effective_methods()
            .iter()
            .map(|method| -> Result<TargetDescriptor, ConfigError> {
                let id = TargetId::new(self.name.as_str(), method.name());
                let bindings = method.resolve_bindings(&id)?;
                let mut builder = TargetDescriptor::builder(id.clone(), Self::adapter(constructor, method))
                    .class(self.name.as_str())
                    .flags(method.flags)
                    .stack(method.stack.as_deref().unwrap_or(&settings.default_stack))
                    .bindings(bindings);
                for outcome in &method.outcomes {
                    builder = builder.outcome(outcome.materialize(&id, &settings.convention));
                }
                if let Some(validator) = &method.validator {
                    builder = builder.validator(Arc::clone(validator));
                }
                for event in &method.events {
                    builder = builder.event(event.as_str());
                }
                Ok(builder.build())
            })
            .collect()
    }
}

// ============================================================================
// TargetFactory
// ============================================================================

/// A class that could not be registered.
#[derive(Debug)]
pub struct Rejection {
    /// Class (or target) name.
    pub class: String,
    /// Why it was rejected.
    pub error: ConfigError,
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Descriptors of every accepted class.
    pub descriptors: Vec<TargetDescriptor>,
    /// Rejected classes.
    pub rejected: Vec<Rejection>,
}

/// Derives descriptors from class declarations.
#[derive(Debug, Clone, Default)]
pub struct TargetFactory {
    settings: FactorySettings,
}

impl TargetFactory {
    /// Create a factory with the given settings.
    pub fn new(settings: FactorySettings) -> Self {
        Self { settings }
    }

    /// Settings in use.
    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    /// Scan every candidate. A rejected class is reported and skipped.
    pub fn scan<'a, I, C>(&self, candidates: I) -> ScanReport
    where
        I: IntoIterator<Item = &'a C>,
        C: Candidate + ?Sized + 'a,
    {
        let mut report = ScanReport::default();
        for candidate in candidates {
            match candidate.describe(&self.settings) {
                Ok(descriptors) => {
                    tracing::debug!(
                        class = candidate.class_name(),
                        targets = descriptors.len(),
                        "scanned class"
                    );
                    report.descriptors.extend(descriptors);
                }
                Err(error) => {
                    tracing::warn!(class = candidate.class_name(), %error, "rejected class");
                    report.rejected.push(Rejection {
                        class: candidate.class_name().to_string(),
                        error,
                    });
                }
            }
        }
        report
    }
}
