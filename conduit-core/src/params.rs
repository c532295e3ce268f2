//! Interceptor configuration parameters.

use crate::error::ConfigError;
use std::{collections::BTreeMap, str::FromStr};

/// The key→value parameter map an interceptor receives at configuration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    interceptor: String,
    values: BTreeMap<String, String>,
}

impl Params {
    /// Create an empty parameter map for the named interceptor kind.
    pub fn new(interceptor: impl Into<String>) -> Self {
        Self {
            interceptor: interceptor.into(),
            values: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a parameter (mutable version).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// The interceptor kind these parameters belong to.
    pub fn interceptor(&self) -> &str {
        &self.interceptor
    }

    /// Raw string value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// String value or a default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a value, falling back to `default` when absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| self.invalid(key, e.to_string())),
            None => Ok(default),
        }
    }

    /// Parse a required value.
    pub fn require<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key).ok_or_else(|| self.invalid(key, "missing"))?;
        raw.trim().parse().map_err(|e: T::Err| self.invalid(key, e.to_string()))
    }

    /// Build an [`ConfigError::InvalidParam`] for `key`.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParam {
            interceptor: self.interceptor.clone(),
            param: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Iterate all parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of these parameters re-labelled for another interceptor kind,
    /// without the listed keys.
    pub fn forward(&self, interceptor: &str, without: &[&str]) -> Params {
        let mut params = Params::new(interceptor);
        for (key, value) in self.iter().filter(|(k, _)| !without.contains(k)) {
            params.insert(key, value);
        }
        params
    }
}
