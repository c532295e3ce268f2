//! Conditional interceptor.

use crate::pipeline::InterceptorCatalog;
use conduit_core::{
    BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params, Scope,
    Value,
};
use std::{fmt, sync::Arc};

/// Decides whether the wrapped interceptor runs for one invocation.
pub type Predicate = Arc<dyn Fn(&Invocation<'_>) -> bool + Send + Sync>;

/// Runs an inner interceptor only when a predicate holds; otherwise the
/// chain continues as if the inner interceptor were absent.
///
/// # Parameters
///
/// | key      | meaning                                              |
/// |----------|------------------------------------------------------|
/// | `inner`  | interceptor kind to wrap (required)                  |
/// | `key`    | scope key the predicate inspects (required)          |
/// | `scope`  | scope holding `key`, default `request`               |
/// | `equals` | expected value; without it, presence is enough       |
///
/// Every other parameter is handed to the inner interceptor.
pub struct ConditionalInterceptor {
    key: InterceptorKey,
    inner: Arc<dyn Interceptor>,
    predicate: Predicate,
}

const OWN_PARAMS: [&str; 4] = ["inner", "key", "scope", "equals"];

impl ConditionalInterceptor {
    /// Wrap `inner` behind an arbitrary predicate.
    pub fn new<F>(inner: Arc<dyn Interceptor>, predicate: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            key: InterceptorKey::new("conditional"),
            inner,
            predicate: Arc::new(predicate),
        }
    }

    /// Run `inner` when `scope` holds a non-null value for `key`.
    pub fn when_present(inner: Arc<dyn Interceptor>, scope: Scope, key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(inner, move |invocation: &Invocation<'_>| {
            invocation.store().contains(scope, &key)
        })
    }

    /// Run `inner` when `scope` holds `expected` under `key`.
    pub fn when_equals(
        inner: Arc<dyn Interceptor>,
        scope: Scope,
        key: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let expected = expected.into();
        Self::new(inner, move |invocation: &Invocation<'_>| {
            invocation
                .store()
                .get(scope, &key)
                .is_some_and(|value| equals_rendered(&value, &expected))
        })
    }

    /// Build from configuration parameters, creating the inner interceptor
    /// through `catalog`.
    pub fn from_params(params: &Params, catalog: &InterceptorCatalog) -> Result<Self, ConfigError> {
        let kind: String = params.require("inner")?;
        let key: String = params.require("key")?;
        let scope: Scope = params.parse_or("scope", Scope::Request)?;

        let factory = catalog
            .factory(&kind)
            .ok_or_else(|| params.invalid("inner", format!("unknown interceptor kind {kind:?}")))?;
        let inner = factory(&params.forward(&kind, &OWN_PARAMS), catalog)?;

        let mut conditional = match params.get("equals") {
            Some(expected) => Self::when_equals(inner, scope, key, expected),
            None => Self::when_present(inner, scope, key),
        };
        conditional.key = InterceptorKey::new(params.interceptor());
        Ok(conditional)
    }

    /// The wrapped interceptor.
    pub fn inner(&self) -> &Arc<dyn Interceptor> {
        &self.inner
    }
}

fn equals_rendered(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(text) => text == expected,
        Value::Array(items) => items.len() == 1 && equals_rendered(&items[0], expected),
        other => other.to_string() == expected,
    }
}

impl fmt::Debug for ConditionalInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalInterceptor")
            .field("key", &self.key)
            .field("inner", &self.inner.key())
            .finish_non_exhaustive()
    }
}

impl Interceptor for ConditionalInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn outcomes(&self) -> &[Outcome] {
        self.inner.outcomes()
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        if (self.predicate)(invocation) {
            self.inner.intercept(invocation, next)
        } else {
            next.proceed(invocation)
        }
    }
}
