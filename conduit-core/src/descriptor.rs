//! # Target Descriptor Model
//!
//! Immutable metadata describing one invocable handler method: its identity,
//! positional bindings, declared outcomes, flags, the interceptor stack it
//! runs in, and the call adapter that actually invokes it.
//!
//! Descriptors are created once while the registry is built and are shared
//! read-only between concurrent dispatches. The only mutation after
//! insertion is the cache of lazily synthesized outcomes.

use crate::{
    arguments::Arguments,
    binding::Binding,
    error::BoxError,
    outcome::{Outcome, OutcomeDescriptor},
    target::TargetId,
    validation::Validator,
};
use bitflags::bitflags;
use parking_lot::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};

bitflags! {
    /// Behavioral flags of a target. The default is empty: non-idempotent and
    /// non-cacheable until the author opts in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetFlags: u8 {
        /// Safe to invoke repeatedly with identical inputs; required for
        /// passive entry points.
        const IDEMPOTENT = 0b01;
        /// The rendered result may be cached by the host.
        const CACHEABLE = 0b10;
    }
}

/// The synthesized direct invocation path of a target: constructs a handler
/// instance and calls the method with positional arguments.
pub type CallAdapter = Arc<dyn Fn(&mut Arguments) -> Result<Outcome, BoxError> + Send + Sync>;

/// Name of the stack used when a target declares none.
pub const DEFAULT_STACK: &str = "default";

/// Metadata and invocation path of one target.
pub struct TargetDescriptor {
    id: TargetId,
    class: String,
    adapter: CallAdapter,
    flags: TargetFlags,
    stack: String,
    bindings: Vec<Binding>,
    declared: HashMap<String, Arc<OutcomeDescriptor>>,
    synthesized: RwLock<HashMap<String, Arc<OutcomeDescriptor>>>,
    validator: Option<Arc<dyn Validator>>,
    events: Vec<String>,
}

impl TargetDescriptor {
    /// Start building a descriptor.
    pub fn builder(id: TargetId, adapter: CallAdapter) -> TargetDescriptorBuilder {
        TargetDescriptorBuilder {
            descriptor: TargetDescriptor {
                class: id.action().to_string(),
                id,
                adapter,
                flags: TargetFlags::empty(),
                stack: DEFAULT_STACK.to_string(),
                bindings: Vec::new(),
                declared: HashMap::new(),
                synthesized: RwLock::new(HashMap::new()),
                validator: None,
                events: Vec::new(),
            },
        }
    }

    /// Target identity.
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Name of the handler class.
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Flags.
    pub fn flags(&self) -> TargetFlags {
        self.flags
    }

    /// Whether the target may run from passive entry points.
    pub fn is_idempotent(&self) -> bool {
        self.flags.contains(TargetFlags::IDEMPOTENT)
    }

    /// Whether the host may cache the rendered result.
    pub fn is_cacheable(&self) -> bool {
        self.flags.contains(TargetFlags::CACHEABLE)
    }

    /// Interceptor stack name.
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Bindings, ordered by position.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Fresh, empty argument slots for one invocation.
    pub fn arguments(&self) -> Arguments {
        Arguments::new(self.bindings.iter().map(Binding::name))
    }

    /// Target-level validator.
    pub fn validator(&self) -> Option<&Arc<dyn Validator>> {
        self.validator.as_ref()
    }

    /// Declared event qualified names handled by this target.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Whether `outcome` was declared up front.
    pub fn declares(&self, outcome: &str) -> bool {
        self.declared.contains_key(outcome)
    }

    /// Look up a declared or previously synthesized outcome.
    pub fn outcome(&self, outcome: &str) -> Option<Arc<OutcomeDescriptor>> {
        if let Some(declared) = self.declared.get(outcome) {
            return Some(Arc::clone(declared));
        }
        self.synthesized.read().get(outcome).cloned()
    }

    /// Look up an outcome, synthesizing and caching it on first miss.
    pub fn outcome_or_insert_with<F>(&self, outcome: &str, synthesize: F) -> Arc<OutcomeDescriptor>
    where
        F: FnOnce() -> OutcomeDescriptor,
    {
        if let Some(found) = self.outcome(outcome) {
            return found;
        }
        let mut cache = self.synthesized.write();
        Arc::clone(
            cache
                .entry(outcome.to_string())
                .or_insert_with(|| Arc::new(synthesize())),
        )
    }

    /// Declared outcome ids.
    pub fn declared_outcomes(&self) -> impl Iterator<Item = &str> {
        self.declared.keys().map(String::as_str)
    }

    /// Invoke the handler through its call adapter.
    pub fn call(&self, arguments: &mut Arguments) -> Result<Outcome, BoxError> {
        (self.adapter)(arguments)
    }
}

impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("flags", &self.flags)
            .field("stack", &self.stack)
            .field("bindings", &self.bindings)
            .field("declared", &self.declared.keys().collect::<Vec<_>>())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TargetDescriptor`].
pub struct TargetDescriptorBuilder {
    descriptor: TargetDescriptor,
}

impl TargetDescriptorBuilder {
    /// Set the handler class name (defaults to the action name).
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.descriptor.class = class.into();
        self
    }

    /// Set flags.
    pub fn flags(mut self, flags: TargetFlags) -> Self {
        self.descriptor.flags = flags;
        self
    }

    /// Set the interceptor stack.
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.descriptor.stack = stack.into();
        self
    }

    /// Set bindings; they must already be ordered by position.
    pub fn bindings(mut self, bindings: Vec<Binding>) -> Self {
        self.descriptor.bindings = bindings;
        self
    }

    /// Declare an outcome.
    pub fn outcome(mut self, outcome: OutcomeDescriptor) -> Self {
        self.descriptor
            .declared
            .insert(outcome.id.clone(), Arc::new(outcome));
        self
    }

    /// Attach a target-level validator.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.descriptor.validator = Some(validator);
        self
    }

    /// Declare a handled event.
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.descriptor.events.push(event.into());
        self
    }

    /// Finish.
    pub fn build(self) -> TargetDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeConvention;

    fn noop() -> CallAdapter {
        Arc::new(|_args: &mut Arguments| -> Result<Outcome, BoxError> { Ok(Outcome::success()) })
    }

    #[test]
    fn test_defaults_are_conservative() {
        let descriptor = TargetDescriptor::builder(TargetId::new("Report", "export"), noop()).build();
        assert!(!descriptor.is_idempotent());
        assert!(!descriptor.is_cacheable());
        assert_eq!(descriptor.stack(), DEFAULT_STACK);
        assert_eq!(descriptor.class_name(), "Report");
    }

    #[test]
    fn test_outcome_cache_returns_same_arc() {
        let id = TargetId::new("Profile", "view");
        let descriptor = TargetDescriptor::builder(id.clone(), noop()).build();
        let convention = OutcomeConvention::default();

        assert!(descriptor.outcome("success").is_none());
        let first = descriptor.outcome_or_insert_with("success", || convention.synthesize(&id, "success"));
        let second = descriptor.outcome_or_insert_with("success", || unreachable!());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!descriptor.declares("success"));
    }

    #[test]
    fn test_call_goes_through_adapter() {
        let descriptor = TargetDescriptor::builder(
            TargetId::new("Echo", "run"),
            Arc::new(|args: &mut Arguments| -> Result<Outcome, BoxError> {
                let text: String = args.value(0)?;
                Ok(Outcome::new(text))
            }),
        )
        .bindings(vec![Binding::input("text").at(0)])
        .build();

        let mut args = descriptor.arguments();
        args.set(0, serde_json::json!("done")).unwrap();
        assert_eq!(descriptor.call(&mut args).unwrap(), "done");
    }
}
