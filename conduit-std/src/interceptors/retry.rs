//! Retry interceptor.

use conduit_core::{BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params};

/// Re-runs the rest of the chain when it fails.
///
/// Only idempotent targets are retried; anything else runs once. The error
/// of the last attempt is returned when every attempt fails.
#[derive(Debug)]
pub struct RetryInterceptor {
    key: InterceptorKey,
    attempts: u32,
}

impl RetryInterceptor {
    /// Allow up to `attempts` runs in total (at least one).
    pub fn new(attempts: u32) -> Self {
        Self {
            key: InterceptorKey::new("retry"),
            attempts: attempts.max(1),
        }
    }

    /// Build from configuration parameters (`attempts`, default 3).
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        let attempts: u32 = params.parse_or("attempts", 3)?;
        if attempts == 0 {
            return Err(params.invalid("attempts", "must be at least 1"));
        }
        Ok(Self {
            key: InterceptorKey::new(params.interceptor()),
            attempts,
        })
    }
}

impl Interceptor for RetryInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        if !invocation.descriptor().is_idempotent() {
            return next.proceed(invocation);
        }

        let next = next.repeatable();
        let mut attempt = 1;
        loop {
            match next.proceed(invocation) {
                Ok(outcome) => return Ok(outcome),
                Err(error) if attempt < self.attempts => {
                    tracing::warn!(id = %invocation.target(), attempt, %error, "retrying invocation");
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
