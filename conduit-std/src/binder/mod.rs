//! # Parameter Binder
//!
//! Resolves a target's input bindings from the scope store before
//! invocation, and writes its output bindings back afterwards.
//!
//! # Precedence
//!
//! Each input binding names an ordered list of candidate scopes (or uses the
//! binder's default order). The **first scope holding a non-null value
//! wins**; later scopes are never consulted for that binding, even when the
//! winning value fails coercion or validation. Values are never merged
//! across scopes.
//!
//! # Violations
//!
//! Coercion failures, constraint failures and target-level validator
//! findings are collected into [`BoundInputs::violations`] instead of being
//! raised, so the violation handler can see the whole set.

mod bean;
mod coerce;
mod validate;

pub use bean::{Bean, flatten as flatten_bean, gather as gather_bean};
pub use coerce::{CoercionError, coerce};
pub use validate::check as check_constraints;

use conduit_core::{
    Arguments, Binding, Constraint, Phase, Scope, ScopeError, ScopeStore, TargetDescriptor, Value, ValueKind,
    Violation, ViolationKind,
};

/// Inputs gathered for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInputs {
    /// Positional arguments; output-only slots are empty.
    pub arguments: Arguments,
    /// Every violation found.
    pub violations: Vec<Violation>,
}

impl BoundInputs {
    /// Whether no violation was found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Resolves inputs and writes outputs of target invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinder {
    order: Vec<Scope>,
}

impl Default for ParameterBinder {
    fn default() -> Self {
        Self {
            order: Scope::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl ParameterBinder {
    /// Create a binder with the default scope order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `order` for bindings that declare no candidate scopes.
    pub fn with_order(order: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            order: order.into_iter().collect(),
        }
    }

    /// Default candidate order.
    pub fn order(&self) -> &[Scope] {
        &self.order
    }

    /// Candidate scopes of `binding`, in search order.
    pub fn candidates<'a>(&'a self, binding: &'a Binding) -> &'a [Scope] {
        if binding.scopes().is_empty() {
            &self.order
        } else {
            binding.scopes()
        }
    }

    /// Find the raw value of a plain binding: the first candidate scope
    /// holding a non-null value.
    pub fn find(&self, binding: &Binding, store: &dyn ScopeStore) -> Option<(Scope, Value)> {
        self.candidates(binding).iter().find_map(|&scope| {
            store
                .get(scope, binding.name())
                .filter(|value| !value.is_null())
                .map(|value| (scope, value))
        })
    }

    /// Gather, coerce and validate every input binding of `descriptor`.
    pub fn bind_inputs(&self, descriptor: &TargetDescriptor, store: &dyn ScopeStore) -> BoundInputs {
        let mut arguments = descriptor.arguments();
        let mut violations = Vec::new();

        for (position, binding) in descriptor.bindings().iter().enumerate() {
            if !binding.direction().is_input() {
                continue;
            }
            let (scope, value, mut found) = match self.resolve(binding, store) {
                Some(resolved) => resolved,
                None => {
                    if binding.constraints().contains(&Constraint::Required) {
                        violations.push(Violation::new(binding.name(), ViolationKind::Missing));
                    }
                    tracing::debug!(id = %descriptor.id(), name = binding.name(), "input absent");
                    continue;
                }
            };
            tracing::debug!(id = %descriptor.id(), name = binding.name(), %scope, "input bound");

            if let Some(value) = value {
                found.extend(validate::check(binding.name(), &value, binding.constraints()));
                if let Err(error) = arguments.set(position, value) {
                    tracing::warn!(id = %descriptor.id(), name = binding.name(), %error, "input slot unavailable");
                }
            }
            violations.append(&mut found);
        }

        if let Some(validator) = descriptor.validator() {
            violations.extend(validator.validate(descriptor, &arguments));
        }
        BoundInputs {
            arguments,
            violations,
        }
    }

    /// Write every filled output slot to its declared scope.
    ///
    /// Writes the phase does not permit, and writes the store refuses, are
    /// skipped and returned; the remaining outputs are still written.
    pub fn bind_outputs(
        &self,
        descriptor: &TargetDescriptor,
        store: &mut dyn ScopeStore,
        arguments: &Arguments,
        phase: Phase,
    ) -> Vec<ScopeError> {
        let mut errors = Vec::new();
        for (position, binding) in descriptor.bindings().iter().enumerate() {
            if !binding.direction().is_output() {
                continue;
            }
            let Some(value) = arguments.get(position) else {
                continue;
            };
            let scope = binding.output_scope();
            let writes = match binding.value_kind() {
                ValueKind::Bean(spec) => bean::flatten(spec, value),
                _ => vec![(binding.name().to_string(), value.clone())],
            };
            for (key, value) in writes {
                let result = if scope.is_constrained() && !phase.permits_submission_writes() {
                    Err(ScopeError::PhaseRestricted { scope, phase })
                } else {
                    store.set(scope, &key, value)
                };
                if let Err(error) = result {
                    tracing::warn!(id = %descriptor.id(), %scope, %key, %error, "skipped output write");
                    errors.push(error);
                }
            }
        }
        errors
    }

    /// Resolve and coerce one input binding.
    ///
    /// Returns the winning scope, the coerced value (absent when coercion
    /// failed) and the violations found so far.
    fn resolve(
        &self,
        binding: &Binding,
        store: &dyn ScopeStore,
    ) -> Option<(Scope, Option<Value>, Vec<Violation>)> {
        if let ValueKind::Bean(spec) = binding.value_kind() {
            let bean = bean::gather(spec, self.candidates(binding), store)?;
            return Some((bean.scope, Some(bean.value), bean.violations));
        }
        let (scope, raw) = self.find(binding, store)?;
        match coerce::coerce(raw, binding.value_kind()) {
            Ok(value) => Some((scope, Some(value), Vec::new())),
            Err(err) => Some((
                scope,
                None,
                vec![Violation::new(
                    binding.name(),
                    ViolationKind::Type {
                        expected: err.expected,
                    },
                )],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::MemoryScopeStore;
    use conduit_core::{BeanSpec, BoxError, CallAdapter, Outcome, TargetId};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn target(bindings: Vec<Binding>) -> TargetDescriptor {
        let adapter: CallAdapter =
            Arc::new(|_args: &mut Arguments| -> Result<Outcome, BoxError> { Ok(Outcome::success()) });
        TargetDescriptor::builder(TargetId::new("Profile", "save"), adapter)
            .bindings(bindings)
            .build()
    }

    fn profile_save() -> TargetDescriptor {
        target(vec![
            Binding::input("name")
                .at(0)
                .from([Scope::Submission, Scope::SessionPrivate])
                .string(),
            Binding::input("age").at(1).integer().range(0.0, 150.0),
        ])
    }

    #[test]
    fn test_first_scope_wins() {
        let mut store = MemoryScopeStore::detached().submit("name", "Jane").submit("age", "30");
        store.set(Scope::SessionPrivate, "name", json!("Bob")).unwrap();

        let bound = ParameterBinder::new().bind_inputs(&profile_save(), &store);
        assert!(bound.is_valid());
        assert_eq!(bound.arguments.get(0), Some(&json!("Jane")));
        assert_eq!(bound.arguments.get(1), Some(&json!(30)));
    }

    #[test]
    fn test_falls_through_absent_and_null() {
        let mut store = MemoryScopeStore::detached().submit("name", Value::Null);
        store.set(Scope::SessionPrivate, "name", json!("Bob")).unwrap();

        let bound = ParameterBinder::new().bind_inputs(&profile_save(), &store);
        assert_eq!(bound.arguments.get(0), Some(&json!("Bob")));
    }

    #[test]
    fn test_range_violation_collected() {
        let store = MemoryScopeStore::detached().submit("name", "Jane").submit("age", "200");
        let bound = ParameterBinder::new().bind_inputs(&profile_save(), &store);

        assert_eq!(bound.violations.len(), 1);
        assert_eq!(bound.violations[0].name, "age");
        assert!(matches!(
            bound.violations[0].kind,
            ViolationKind::Range { actual, .. } if actual == 200.0
        ));
    }

    #[test]
    fn test_coercion_failure_does_not_fall_through() {
        let mut store = MemoryScopeStore::detached().submit("age", "old");
        store.set(Scope::Request, "age", json!(40)).unwrap();

        let bound = ParameterBinder::new().bind_inputs(&profile_save(), &store);
        assert_eq!(
            bound.violations,
            vec![Violation::new(
                "age",
                ViolationKind::Type {
                    expected: "integer".into()
                }
            )]
        );
        assert_eq!(bound.arguments.get(1), None);
    }

    #[test]
    fn test_required_absent() {
        let descriptor = target(vec![Binding::input("email").at(0).required()]);
        let bound = ParameterBinder::new().bind_inputs(&descriptor, &MemoryScopeStore::detached());
        assert_eq!(bound.violations, vec![Violation::new("email", ViolationKind::Missing)]);
    }

    #[test]
    fn test_custom_default_order() {
        let descriptor = target(vec![Binding::input("theme").at(0)]);
        let mut store = MemoryScopeStore::detached().submit("theme", "light");
        store.set(Scope::SessionShared, "theme", json!("dark")).unwrap();

        let binder = ParameterBinder::with_order([Scope::SessionShared, Scope::Submission]);
        let bound = binder.bind_inputs(&descriptor, &store);
        assert_eq!(bound.arguments.get(0), Some(&json!("dark")));
    }

    #[test]
    fn test_bean_binding() {
        let descriptor = target(vec![
            Binding::input("user")
                .at(0)
                .bean(BeanSpec::new("user:").field("age", ValueKind::Integer)),
        ]);
        let store = MemoryScopeStore::detached()
            .submit("user:name", "Jane")
            .submit("user:age", "31");

        let bound = ParameterBinder::new().bind_inputs(&descriptor, &store);
        assert_eq!(bound.arguments.get(0), Some(&json!({"name": "Jane", "age": 31})));
    }

    #[test]
    fn test_validator_adds_violations() {
        let adapter: CallAdapter =
            Arc::new(|_args: &mut Arguments| -> Result<Outcome, BoxError> { Ok(Outcome::success()) });
        let validator = |_d: &TargetDescriptor, args: &Arguments| -> Vec<Violation> {
            match (args.get(0), args.get(1)) {
                (Some(a), Some(b)) if a != b => vec![Violation::custom("confirm", "does not match")],
                _ => Vec::new(),
            }
        };
        let descriptor = TargetDescriptor::builder(TargetId::new("Account", "register"), adapter)
            .bindings(vec![Binding::input("password").at(0), Binding::input("confirm").at(1)])
            .validator(Arc::new(validator))
            .build();
        let store = MemoryScopeStore::detached()
            .submit("password", "a")
            .submit("confirm", "b");

        let bound = ParameterBinder::new().bind_inputs(&descriptor, &store);
        assert_eq!(bound.violations, vec![Violation::custom("confirm", "does not match")]);
    }

    #[test]
    fn test_outputs_written_to_declared_scope() {
        let descriptor = target(vec![
            Binding::output("greeting").at(0).to(Scope::SessionPrivate),
            Binding::output("draft").at(1).to(Scope::Submission),
        ]);
        let mut args = descriptor.arguments();
        args.set(0, json!("hi")).unwrap();
        args.set(1, json!("x")).unwrap();
        let mut store = MemoryScopeStore::detached();

        let errors = ParameterBinder::new().bind_outputs(&descriptor, &mut store, &args, Phase::Render);
        assert_eq!(store.get(Scope::SessionPrivate, "greeting"), Some(json!("hi")));
        assert_eq!(store.get(Scope::Submission, "draft"), None);
        assert_eq!(
            errors,
            vec![ScopeError::PhaseRestricted {
                scope: Scope::Submission,
                phase: Phase::Render
            }]
        );
    }

    #[test]
    fn test_submission_write_allowed_in_action_phase() {
        let descriptor = target(vec![Binding::output("draft").at(0).to(Scope::Submission)]);
        let mut args = descriptor.arguments();
        args.set(0, json!("x")).unwrap();
        let mut store = MemoryScopeStore::detached();

        let errors = ParameterBinder::new().bind_outputs(&descriptor, &mut store, &args, Phase::Action);
        assert!(errors.is_empty());
        assert_eq!(store.get(Scope::Submission, "draft"), Some(json!("x")));
    }

    #[test]
    fn test_config_write_reported() {
        let descriptor = target(vec![Binding::output("site").at(0).to(Scope::Config)]);
        let mut args = descriptor.arguments();
        args.set(0, json!("x")).unwrap();
        let mut store = MemoryScopeStore::detached();

        let errors = ParameterBinder::new().bind_outputs(&descriptor, &mut store, &args, Phase::Action);
        assert_eq!(errors, vec![ScopeError::ReadOnly(Scope::Config)]);
    }
}
