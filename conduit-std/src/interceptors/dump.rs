//! Scope dump interceptor for diagnostics.

use conduit_core::{
    BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params, Scope,
    Value,
};
use serde_json::Map;

/// Request-scope key the dump is written to.
pub const DUMP_KEY: &str = "conduit.dump";

/// Records the key names held by each scope once the chain returns.
///
/// The dump is a JSON object mapping scope names to sorted key lists. Values
/// are not copied. Keys of the dump itself are left out.
#[derive(Debug)]
pub struct DumpInterceptor {
    key: InterceptorKey,
    scopes: Vec<Scope>,
}

impl DumpInterceptor {
    /// Dump every scope.
    pub fn new() -> Self {
        Self {
            key: InterceptorKey::new("dump"),
            scopes: Scope::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Restrict the dump to `scopes`.
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Build from configuration parameters (`scopes`, comma separated).
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        let scopes = match params.get("scopes") {
            None => Scope::DEFAULT_ORDER.to_vec(),
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| name.parse::<Scope>().map_err(|reason| params.invalid("scopes", reason)))
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(Self {
            key: InterceptorKey::new(params.interceptor()),
            scopes,
        })
    }
}

impl Default for DumpInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for DumpInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        let result = next.proceed(invocation);

        let store = invocation.store();
        let mut dump = Map::new();
        for &scope in &self.scopes {
            let mut keys = store.keys(scope);
            keys.retain(|key| key != DUMP_KEY);
            keys.sort_unstable();
            dump.insert(scope.to_string(), Value::from(keys));
        }
        tracing::debug!(id = %invocation.target(), dump = %serde_json::Value::Object(dump.clone()), "scope dump");

        if let Err(error) = invocation
            .store_mut()
            .set(Scope::Request, DUMP_KEY, Value::Object(dump))
        {
            tracing::warn!(%error, "could not record scope dump");
        }
        result
    }
}
