//! Declarative stack configuration.
//!
//! ```toml
//! [[stacks]]
//! name = "guarded"
//! interceptors = [
//!     { ref = "logging" },
//!     { ref = "token", params = { mode = "replay", capacity = 16 } },
//! ]
//!
//! [[stacks]]
//! name = "audited"
//! interceptors = [{ ref = "guarded" }, { ref = "timer" }]
//! ```
//!
//! A `ref` names either another stack, which is spliced in place, or an
//! interceptor kind registered in the [`InterceptorCatalog`]. Stack names
//! take precedence over interceptor kinds.

use crate::interceptors::{
    ConditionalInterceptor, DumpInterceptor, LoggingInterceptor, RetryInterceptor,
    TimerInterceptor, TokenInterceptor, TracingInterceptor,
};
use conduit_core::{ConfigError, Interceptor, Params};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use super::InterceptorStack;

/// One configured stack.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    /// Stack name.
    pub name: String,
    /// Interceptor references, outermost first.
    #[serde(default)]
    pub interceptors: Vec<InterceptorRef>,
}

/// A reference to an interceptor kind or another stack.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterceptorRef {
    /// Interceptor kind or stack name.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Parameters handed to the interceptor factory.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl InterceptorRef {
    /// Parameters as the interceptor factory sees them.
    pub fn params(&self) -> Params {
        let mut params = Params::new(self.reference.as_str());
        for (key, value) in &self.params {
            params.insert(key.as_str(), value.to_string());
        }
        params
    }
}

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// InterceptorCatalog
// ============================================================================

/// Creates one interceptor instance from its configured parameters.
pub type InterceptorFactory = Arc<
    dyn Fn(&Params, &InterceptorCatalog) -> Result<Arc<dyn Interceptor>, ConfigError> + Send + Sync,
>;

/// The interceptor kinds configuration may reference, by name.
#[derive(Clone, Default)]
pub struct InterceptorCatalog {
    kinds: HashMap<String, InterceptorFactory>,
}

impl InterceptorCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with every standard interceptor kind:
    /// `logging`, `tracing`, `timer`, `token`, `dump`, `retry` and
    /// `conditional`.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog
            .register_with("logging", LoggingInterceptor::from_params)
            .register_with("tracing", TracingInterceptor::from_params)
            .register_with("timer", TimerInterceptor::from_params)
            .register_with("token", TokenInterceptor::from_params)
            .register_with("dump", DumpInterceptor::from_params)
            .register_with("retry", RetryInterceptor::from_params)
            .register("conditional", |params: &Params, catalog: &InterceptorCatalog| {
                let interceptor = ConditionalInterceptor::from_params(params, catalog)?;
                Ok(Arc::new(interceptor) as Arc<dyn Interceptor>)
            });
        catalog
    }

    /// Register (or replace) a kind with full access to the catalog.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Params, &InterceptorCatalog) -> Result<Arc<dyn Interceptor>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.kinds.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Register (or replace) a kind built from its parameters alone.
    pub fn register_with<I, F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        I: Interceptor,
        F: Fn(&Params) -> Result<I, ConfigError> + Send + Sync + 'static,
    {
        self.register(kind, move |params: &Params, _: &InterceptorCatalog| {
            Ok(Arc::new(factory(params)?) as Arc<dyn Interceptor>)
        })
    }

    /// Whether `kind` is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// The factory for `kind`.
    pub fn factory(&self, kind: &str) -> Option<&InterceptorFactory> {
        self.kinds.get(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for InterceptorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ============================================================================
// Resolution
// ============================================================================

type Chain = Vec<Arc<dyn Interceptor>>;

struct Resolver<'a> {
    configs: HashMap<&'a str, &'a StackConfig>,
    catalog: &'a InterceptorCatalog,
    done: HashMap<&'a str, Chain>,
    visiting: Vec<&'a str>,
}

/// Resolve configured stacks into interceptor chains, in declaration order.
pub(super) fn resolve(
    configs: &[StackConfig],
    catalog: &InterceptorCatalog,
) -> Result<Vec<InterceptorStack>, ConfigError> {
    let mut by_name = HashMap::new();
    for config in configs {
        if config.name.trim().is_empty() {
            return Err(ConfigError::Parse("stack name must not be empty".to_string()));
        }
        if by_name.insert(config.name.as_str(), config).is_some() {
            return Err(ConfigError::DuplicateStack(config.name.clone()));
        }
    }

    let mut resolver = Resolver {
        configs: by_name,
        catalog,
        done: HashMap::new(),
        visiting: Vec::new(),
    };
    configs
        .iter()
        .map(|config| {
            let chain = resolver.expand(config)?;
            Ok(chain
                .into_iter()
                .fold(InterceptorStack::new(config.name.as_str()), InterceptorStack::with_shared))
        })
        .collect()
}

impl<'a> Resolver<'a> {
    fn expand(&mut self, config: &'a StackConfig) -> Result<Chain, ConfigError> {
        let name = config.name.as_str();
        if let Some(chain) = self.done.get(name) {
            return Ok(chain.clone());
        }
        if self.visiting.contains(&name) {
            return Err(ConfigError::StackCycle(name.to_string()));
        }
        self.visiting.push(name);

        let mut chain = Chain::new();
        for reference in &config.interceptors {
            let target = reference.reference.as_str();
            if target.trim().is_empty() {
                return Err(ConfigError::Parse(format!(
                    "stack {name:?} has an empty interceptor reference"
                )));
            }
            if let Some(nested) = self.configs.get(target).copied() {
                if let Some(param) = reference.params.keys().next() {
                    return Err(ConfigError::InvalidParam {
                        interceptor: target.to_string(),
                        param: param.clone(),
                        reason: "stack references take no parameters".to_string(),
                    });
                }
                chain.extend(self.expand(nested)?);
            } else if let Some(factory) = self.catalog.factory(target) {
                chain.push(factory(&reference.params(), self.catalog)?);
            } else {
                return Err(ConfigError::UnknownInterceptor {
                    stack: name.to_string(),
                    name: target.to_string(),
                });
            }
        }

        self.visiting.pop();
        self.done.insert(name, chain.clone());
        Ok(chain)
    }
}
