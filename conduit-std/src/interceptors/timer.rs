//! Timing interceptor.

use conduit_core::{
    BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params, Scope,
    Value,
};
use std::time::Instant;

/// Request-scope key the elapsed time is written to by default.
pub const ELAPSED_KEY: &str = "conduit.elapsed_us";

/// Measures the rest of the chain and records the elapsed microseconds in
/// the request scope.
///
/// The measurement is recorded whether the chain succeeds or fails.
#[derive(Debug)]
pub struct TimerInterceptor {
    key: InterceptorKey,
    record: String,
}

impl TimerInterceptor {
    /// Create a timer writing to [`ELAPSED_KEY`].
    pub fn new() -> Self {
        Self {
            key: InterceptorKey::new("timer"),
            record: ELAPSED_KEY.to_string(),
        }
    }

    /// Write the measurement under another request key.
    pub fn record_as(mut self, key: impl Into<String>) -> Self {
        self.record = key.into();
        self
    }

    /// Build from configuration parameters (`key`).
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        let record = params.get_or("key", ELAPSED_KEY);
        if record.trim().is_empty() {
            return Err(params.invalid("key", "must not be empty"));
        }
        Ok(Self {
            key: InterceptorKey::new(params.interceptor()),
            record: record.to_string(),
        })
    }
}

impl Default for TimerInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for TimerInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        let started = Instant::now();
        let result = next.proceed(invocation);
        let elapsed = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        tracing::debug!(id = %invocation.target(), elapsed_us = elapsed, "timed invocation");
        if let Err(error) = invocation
            .store_mut()
            .set(Scope::Request, &self.record, Value::from(elapsed))
        {
            tracing::warn!(%error, "could not record elapsed time");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::MemoryScopeStore;
    use conduit_core::{Arguments, CallAdapter, Phase, ScopeStore, TargetDescriptor, TargetId};
    use std::sync::Arc;

    #[test]
    fn test_records_elapsed_even_on_failure() {
        let adapter: CallAdapter =
            Arc::new(|_args: &mut Arguments| -> Result<Outcome, BoxError> { Err("boom".into()) });
        let descriptor = TargetDescriptor::builder(TargetId::new("Slow", "run"), adapter).build();
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(TimerInterceptor::new().record_as("t"))];
        let mut store = MemoryScopeStore::detached();

        let mut invocation = Invocation::new(&descriptor, &mut store, descriptor.arguments(), Phase::Action);
        assert!(Next::new(&chain).proceed(&mut invocation).is_err());
        drop(invocation);

        assert!(store.get(Scope::Request, "t").is_some_and(|v| v.is_u64()));
    }

    #[test]
    fn test_empty_key_rejected() {
        let params = Params::new("timer").with("key", " ");
        assert!(TimerInterceptor::from_params(&params).is_err());
    }
}
