//! Logging interceptor for dispatch observation.

use conduit_core::{BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params};

/// Logs every invocation and its outcome.
///
/// Successful outcomes are logged at `info`, failures at `error`. The
/// argument values are only logged when `arguments = true`.
#[derive(Debug)]
pub struct LoggingInterceptor {
    key: InterceptorKey,
    arguments: bool,
}

impl LoggingInterceptor {
    /// Create a logging interceptor.
    pub fn new() -> Self {
        Self {
            key: InterceptorKey::new("logging"),
            arguments: false,
        }
    }

    /// Also log the bound argument values.
    pub fn with_arguments(mut self, arguments: bool) -> Self {
        self.arguments = arguments;
        self
    }

    /// Build from configuration parameters.
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        Ok(Self {
            key: InterceptorKey::new(params.interceptor()),
            arguments: params.parse_or("arguments", false)?,
        })
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for LoggingInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        let id = invocation.target().clone();
        let phase = invocation.phase();
        if self.arguments {
            let arguments: Vec<String> = invocation
                .arguments()
                .iter()
                .map(|(_, name, value)| format!("{name}={value}"))
                .collect();
            tracing::info!(%id, %phase, ?arguments, "invoking target");
        } else {
            tracing::info!(%id, %phase, "invoking target");
        }

        match next.proceed(invocation) {
            Ok(outcome) => {
                tracing::info!(%id, %outcome, "target returned");
                Ok(outcome)
            }
            Err(error) => {
                tracing::error!(%id, %error, "target failed");
                Err(error)
            }
        }
    }
}
