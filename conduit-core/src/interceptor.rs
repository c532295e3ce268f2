//! # Interceptor Pipeline Protocol
//!
//! Interceptors are cross-cutting behaviors wrapped around target
//! invocation. A stack of interceptors is a linear list; traversal is a
//! recursive "invoke the rest of the chain" protocol, and the chain always
//! ends in the implicit terminal invoker that calls the target's adapter.
//!
//! Each interceptor receives the [`Invocation`] and a [`Next`] handle and may:
//!
//! - call [`Next::proceed`] and return its result unchanged,
//! - call it and post-process the result,
//! - not call it and return its own outcome (short-circuit),
//! - call the rest of the chain several times, but only after opting in via
//!   [`Next::repeatable`].
//!
//! Errors abort the chain and propagate to the dispatcher.
//!
//! # Shared Instances
//!
//! One interceptor instance serves every request and every session. Keep
//! per-session memory in [`Invocation::interceptor_state`], keyed by
//! [`Interceptor::key`], never in instance fields.

use crate::{
    arguments::Arguments,
    descriptor::TargetDescriptor,
    error::BoxError,
    outcome::Outcome,
    phase::Phase,
    scope::ScopeStore,
    state::{InterceptorKey, InterceptorState},
    target::TargetId,
};
use std::sync::Arc;

/// A cross-cutting behavior wrapped around target invocation.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `Interceptor`",
    label = "missing `Interceptor` implementation",
    note = "Interceptors must implement `key` and `intercept`."
)]
pub trait Interceptor: Send + Sync + 'static {
    /// This instance's identity, used to key its per-session state.
    fn key(&self) -> &InterceptorKey;

    /// Run this link of the chain.
    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError>;

    /// Outcomes this interceptor may return in place of the target's own.
    ///
    /// The dispatcher renders them by convention, so targets need not
    /// declare them.
    fn outcomes(&self) -> &[Outcome] {
        &[]
    }
}

/// The state of one dispatch as seen by interceptors.
pub struct Invocation<'a> {
    descriptor: &'a TargetDescriptor,
    store: &'a mut dyn ScopeStore,
    arguments: Arguments,
    phase: Phase,
    fault: Option<String>,
    invocations: usize,
}

impl<'a> Invocation<'a> {
    /// Create an invocation over bound arguments.
    pub fn new(
        descriptor: &'a TargetDescriptor,
        store: &'a mut dyn ScopeStore,
        arguments: Arguments,
        phase: Phase,
    ) -> Self {
        Self {
            descriptor,
            store,
            arguments,
            phase,
            fault: None,
            invocations: 0,
        }
    }

    /// The target being invoked.
    pub fn descriptor(&self) -> &TargetDescriptor {
        self.descriptor
    }

    /// The target id.
    pub fn target(&self) -> &TargetId {
        self.descriptor.id()
    }

    /// The dispatch phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read access to the scopes.
    pub fn store(&self) -> &dyn ScopeStore {
        &*self.store
    }

    /// Write access to the scopes.
    pub fn store_mut(&mut self) -> &mut dyn ScopeStore {
        &mut *self.store
    }

    /// Session-scoped interceptor state.
    pub fn interceptor_state(&self) -> &InterceptorState {
        self.store.interceptor_state()
    }

    /// Bound arguments.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Mutable bound arguments.
    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    /// Where the chain failed, if it did: the interceptor key or the target.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// How many times the terminal invoker ran the handler.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Consume the invocation, returning the arguments with output slots.
    pub fn into_arguments(self) -> Arguments {
        self.arguments
    }

    fn record_fault(&mut self, location: impl FnOnce() -> String) {
        if self.fault.is_none() {
            self.fault = Some(location());
        }
    }

    fn invoke_target(&mut self) -> Result<Outcome, BoxError> {
        self.invocations += 1;
        let result = self.descriptor.call(&mut self.arguments);
        if result.is_err() {
            let target = self.descriptor.id().to_string();
            self.record_fault(|| target);
        }
        result
    }
}

/// Handle to the remainder of the chain. Consumed by [`Next::proceed`].
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
}

impl<'a> Next<'a> {
    /// Start a chain over `interceptors`.
    pub fn new(interceptors: &'a [Arc<dyn Interceptor>]) -> Self {
        Self { rest: interceptors }
    }

    /// Number of interceptors left before the terminal invoker.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Invoke the rest of the chain once.
    pub fn proceed(self, invocation: &mut Invocation<'_>) -> Result<Outcome, BoxError> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                let result = head.intercept(invocation, Next { rest: tail });
                if result.is_err() {
                    invocation.record_fault(|| head.key().to_string());
                }
                result
            }
            None => invocation.invoke_target(),
        }
    }

    /// Opt in to calling the rest of the chain more than once.
    pub fn repeatable(self) -> RepeatableNext<'a> {
        RepeatableNext { rest: self.rest }
    }
}

/// A chain handle that may be invoked repeatedly.
pub struct RepeatableNext<'a> {
    rest: &'a [Arc<dyn Interceptor>],
}

impl RepeatableNext<'_> {
    /// Invoke the rest of the chain.
    pub fn proceed(&self, invocation: &mut Invocation<'_>) -> Result<Outcome, BoxError> {
        Next { rest: self.rest }.proceed(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::CallAdapter,
        error::ScopeError,
        scope::Scope,
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct NullStore {
        state: InterceptorState,
    }

    impl ScopeStore for NullStore {
        fn get(&self, _scope: Scope, _key: &str) -> Option<Value> {
            None
        }
        fn set(&mut self, _scope: Scope, _key: &str, _value: Value) -> Result<(), ScopeError> {
            Ok(())
        }
        fn remove(&mut self, _scope: Scope, _key: &str) -> Option<Value> {
            None
        }
        fn keys(&self, _scope: Scope) -> Vec<String> {
            Vec::new()
        }
        fn interceptor_state(&self) -> &InterceptorState {
            &self.state
        }
    }

    struct Tag {
        key: InterceptorKey,
        suffix: &'static str,
    }

    impl Interceptor for Tag {
        fn key(&self) -> &InterceptorKey {
            &self.key
        }
        fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
            let outcome = next.proceed(invocation)?;
            Ok(Outcome::new(format!("{}{}", outcome, self.suffix)))
        }
    }

    struct Halt(InterceptorKey);

    impl Interceptor for Halt {
        fn key(&self) -> &InterceptorKey {
            &self.0
        }
        fn intercept(&self, _invocation: &mut Invocation<'_>, _next: Next<'_>) -> Result<Outcome, BoxError> {
            Ok(Outcome::new("halted"))
        }
    }

    fn counting_target(count: Arc<AtomicUsize>) -> TargetDescriptor {
        let adapter: CallAdapter = Arc::new(move |_args: &mut Arguments| -> Result<Outcome, BoxError> {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::success())
        });
        TargetDescriptor::builder(TargetId::new("Counter", "hit"), adapter).build()
    }

    #[test]
    fn test_chain_wraps_outermost_first() {
        let count = Arc::new(AtomicUsize::new(0));
        let descriptor = counting_target(Arc::clone(&count));
        let chain: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(Tag { key: InterceptorKey::new("outer"), suffix: "-outer" }),
            Arc::new(Tag { key: InterceptorKey::new("inner"), suffix: "-inner" }),
        ];
        let mut store = NullStore::default();
        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Action);

        let outcome = Next::new(&chain).proceed(&mut invocation).unwrap();
        assert_eq!(outcome, "success-inner-outer");
        assert_eq!(invocation.invocations(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_short_circuit_skips_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let descriptor = counting_target(Arc::clone(&count));
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Halt(InterceptorKey::new("halt")))];
        let mut store = NullStore::default();
        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Action);

        let outcome = Next::new(&chain).proceed(&mut invocation).unwrap();
        assert_eq!(outcome, "halted");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fault_records_target() {
        let adapter: CallAdapter =
            Arc::new(|_args: &mut Arguments| -> Result<Outcome, BoxError> { Err("boom".into()) });
        let descriptor = TargetDescriptor::builder(TargetId::new("Broken", "run"), adapter).build();
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Tag {
            key: InterceptorKey::new("outer"),
            suffix: "",
        })];
        let mut store = NullStore::default();
        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Action);

        assert!(Next::new(&chain).proceed(&mut invocation).is_err());
        assert_eq!(invocation.fault(), Some("Broken!run"));
    }
}
