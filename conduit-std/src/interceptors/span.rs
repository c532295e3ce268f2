//! Span interceptor.

use conduit_core::{BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params};

/// Runs the rest of the chain inside a `conduit.invoke` span.
///
/// The span carries the target id and phase, and records the outcome once
/// the chain returns.
#[derive(Debug)]
pub struct TracingInterceptor {
    key: InterceptorKey,
}

impl TracingInterceptor {
    /// Create a span interceptor.
    pub fn new() -> Self {
        Self {
            key: InterceptorKey::new("tracing"),
        }
    }

    /// Build from configuration parameters. There are none.
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        Ok(Self {
            key: InterceptorKey::new(params.interceptor()),
        })
    }
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for TracingInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        let span = tracing::info_span!(
            "conduit.invoke",
            id = %invocation.target(),
            phase = %invocation.phase(),
            outcome = tracing::field::Empty,
        );
        let _entered = span.enter();
        let result = next.proceed(invocation);
        if let Ok(outcome) = &result {
            span.record("outcome", outcome.as_str());
        }
        result
    }
}
