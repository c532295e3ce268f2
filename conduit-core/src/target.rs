//! Target identity.

use crate::error::ConfigError;
use std::{fmt, sync::Arc};

/// Separator between action and method in the textual target form.
pub const METHOD_SEPARATOR: char = '!';

/// The identity of one invocable handler method.
///
/// Textual form is `Action` (conventional default method) or
/// `Action!method`. Both parts are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    action: Arc<str>,
    method: Arc<str>,
}

impl TargetId {
    /// Conventional method name used when a textual id names none.
    pub const DEFAULT_METHOD: &'static str = "execute";

    /// Create a target id from its parts.
    pub fn new(action: impl Into<Arc<str>>, method: impl Into<Arc<str>>) -> Self {
        Self {
            action: action.into(),
            method: method.into(),
        }
    }

    /// Parse `Action` or `Action!method`.
    ///
    /// `default_method` is used when the method part is omitted.
    pub fn parse(text: &str, default_method: &str) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedTarget(text.to_string());
        let (action, method) = match text.split_once(METHOD_SEPARATOR) {
            Some((action, method)) => {
                if method.contains(METHOD_SEPARATOR) {
                    return Err(malformed());
                }
                (action, method)
            }
            None => (text, default_method),
        };
        if action.trim().is_empty() || method.trim().is_empty() {
            return Err(malformed());
        }
        Ok(Self::new(action, method))
    }

    /// The action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The method name.
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.action, METHOD_SEPARATOR, self.method)
    }
}
