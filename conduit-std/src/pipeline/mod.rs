//! # Interceptor Stacks
//!
//! A stack is a named, ordered list of shared interceptor instances; running
//! it walks the chain outermost first and always ends in the target's call
//! adapter. A [`StackSet`] holds every stack the engine knows, frozen after
//! startup.
//!
//! Stacks come from two sources that may be mixed: [`InterceptorStack`]
//! values built in code, and [`StackConfig`] entries from the engine
//! configuration, whose interceptor references are resolved through an
//! [`InterceptorCatalog`].

mod config;

pub use config::{InterceptorCatalog, InterceptorFactory, InterceptorRef, ParamValue, StackConfig};

use conduit_core::{BoxError, ConfigError, DEFAULT_STACK, Interceptor, Invocation, Next, Outcome};
use std::{collections::HashMap, fmt, sync::Arc};

/// A named, ordered chain of interceptors.
#[derive(Clone)]
pub struct InterceptorStack {
    name: String,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorStack {
    /// Create an empty stack. Running it calls the target directly.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor (innermost so far).
    pub fn with<I: Interceptor>(self, interceptor: I) -> Self {
        self.with_shared(Arc::new(interceptor))
    }

    /// Append a shared interceptor instance.
    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interceptors, outermost first.
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the stack has no interceptors.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain around the invocation's target.
    pub fn run(&self, invocation: &mut Invocation<'_>) -> Result<Outcome, BoxError> {
        Next::new(&self.interceptors).proceed(invocation)
    }
}

impl fmt::Debug for InterceptorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.interceptors.iter().map(|i| i.key().to_string()).collect();
        f.debug_struct("InterceptorStack")
            .field("name", &self.name)
            .field("interceptors", &keys)
            .finish()
    }
}

/// Every stack known to an engine, keyed by name.
///
/// The empty `"default"` stack is always present unless replaced.
#[derive(Debug, Clone)]
pub struct StackSet {
    stacks: HashMap<String, Arc<InterceptorStack>>,
}

impl StackSet {
    /// Start building a stack set.
    pub fn builder() -> StackSetBuilder {
        StackSetBuilder::default()
    }

    /// Look up a stack. Unknown names are a configuration error.
    pub fn get(&self, name: &str) -> Result<&Arc<InterceptorStack>, ConfigError> {
        self.stacks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStack(name.to_string()))
    }

    /// Whether a stack exists.
    pub fn contains(&self, name: &str) -> bool {
        self.stacks.contains_key(name)
    }

    /// Stack names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for StackSet {
    fn default() -> Self {
        StackSetBuilder::default().build()
    }
}

/// Builder for [`StackSet`].
#[derive(Debug, Default)]
pub struct StackSetBuilder {
    stacks: HashMap<String, Arc<InterceptorStack>>,
}

impl StackSetBuilder {
    /// Add a stack built in code.
    pub fn stack(&mut self, stack: InterceptorStack) -> Result<&mut Self, ConfigError> {
        if stack.name().trim().is_empty() {
            return Err(ConfigError::Parse("stack name must not be empty".to_string()));
        }
        if self.stacks.contains_key(stack.name()) {
            return Err(ConfigError::DuplicateStack(stack.name().to_string()));
        }
        self.stacks.insert(stack.name().to_string(), Arc::new(stack));
        Ok(self)
    }

    /// Add every configured stack, resolving references through `catalog`.
    pub fn configured(
        &mut self,
        configs: &[StackConfig],
        catalog: &InterceptorCatalog,
    ) -> Result<&mut Self, ConfigError> {
        for stack in config::resolve(configs, catalog)? {
            self.stack(stack)?;
        }
        Ok(self)
    }

    /// Freeze the set.
    pub fn build(mut self) -> StackSet {
        self.stacks
            .entry(DEFAULT_STACK.to_string())
            .or_insert_with(|| Arc::new(InterceptorStack::new(DEFAULT_STACK)));
        StackSet {
            stacks: self.stacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingInterceptor, RecordingInterceptor};
    use conduit_core::{
        Arguments, CallAdapter, Phase, Scope, ScopeError, ScopeStore, TargetDescriptor, TargetId,
        Value,
    };
    use crate::scopes::MemoryScopeStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_target(calls: Arc<AtomicUsize>) -> TargetDescriptor {
        let adapter: CallAdapter = Arc::new(move |_args: &mut Arguments| -> Result<Outcome, BoxError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::success())
        });
        TargetDescriptor::builder(TargetId::new("Profile", "view"), adapter).build()
    }

    #[test]
    fn test_default_stack_always_present() {
        let set = StackSet::default();
        assert!(set.get(DEFAULT_STACK).unwrap().is_empty());
        assert!(matches!(set.get("audit"), Err(ConfigError::UnknownStack(_))));
    }

    #[test]
    fn test_duplicate_stack_rejected() {
        let mut builder = StackSet::builder();
        builder.stack(InterceptorStack::new("audit")).unwrap();
        let err = builder.stack(InterceptorStack::new("audit")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStack(_)));
    }

    #[test]
    fn test_run_order_and_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = counting_target(Arc::clone(&calls));
        let outer = RecordingInterceptor::new("outer");
        let inner = RecordingInterceptor::sharing("inner", &outer);
        let stack = InterceptorStack::new("audit").with(outer.clone()).with(inner);

        let mut store = MemoryScopeStore::detached();
        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Action);
        let outcome = stack.run(&mut invocation).unwrap();

        assert_eq!(outcome, "success");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outer.entries(), vec!["outer:before", "inner:before", "inner:after", "outer:after"]);
    }

    #[test]
    fn test_short_circuit_never_calls_target() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = counting_target(Arc::clone(&calls));
        let gate = CountingInterceptor::short_circuit("denied");
        let stack = InterceptorStack::new("gated").with(gate.clone());

        let mut store = MemoryScopeStore::detached();
        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Action);
        let outcome = stack.run(&mut invocation).unwrap();

        assert_eq!(outcome, "denied");
        assert_eq!(gate.count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct NoStore;

    impl ScopeStore for NoStore {
        fn get(&self, _scope: Scope, _key: &str) -> Option<Value> {
            None
        }
        fn set(&mut self, scope: Scope, _key: &str, _value: Value) -> Result<(), ScopeError> {
            Err(ScopeError::ReadOnly(scope))
        }
        fn remove(&mut self, _scope: Scope, _key: &str) -> Option<Value> {
            None
        }
        fn keys(&self, _scope: Scope) -> Vec<String> {
            Vec::new()
        }
        fn interceptor_state(&self) -> &conduit_core::InterceptorState {
            unreachable!("empty stacks never touch interceptor state")
        }
    }

    #[test]
    fn test_empty_stack_calls_target_directly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = counting_target(Arc::clone(&calls));
        let mut store = NoStore;
        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Render);

        InterceptorStack::new("empty").run(&mut invocation).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
