//! Positional handler arguments.
//!
//! The binder fills one slot per declared parameter position before
//! invocation. The handler reads inputs and fills output slots by position;
//! after invocation the binder writes output slots back to their scopes.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// Errors raised when a handler reads or writes an argument slot.
#[derive(Error, Debug)]
pub enum ArgumentError {
    /// No parameter is declared at this position.
    #[error("no parameter at position {0}")]
    OutOfRange(usize),

    /// The slot holds no value.
    #[error("parameter {name:?} (position {position}) has no value")]
    Missing {
        /// Parameter position.
        position: usize,
        /// External name.
        name: String,
    },

    /// The slot value does not deserialize into the requested type.
    #[error("parameter {name:?} (position {position}) has an unexpected shape")]
    Shape {
        /// Parameter position.
        position: usize,
        /// External name.
        name: String,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Positional argument slots for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    names: Vec<String>,
    slots: Vec<Option<Value>>,
}

impl Arguments {
    /// Create empty slots for the given parameter names, in position order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let slots = vec![None; names.len()];
        Self { names, slots }
    }

    /// Number of declared positions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no positions are declared.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// External name of the parameter at `position`.
    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }

    /// Position of the parameter named `name`.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Raw value at `position`.
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    /// Raw value for the parameter named `name`.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.position_of(name).and_then(|p| self.get(p))
    }

    /// Deserialize the value at `position`.
    pub fn value<T: DeserializeOwned>(&self, position: usize) -> Result<T, ArgumentError> {
        let name = self
            .name(position)
            .ok_or(ArgumentError::OutOfRange(position))?
            .to_string();
        let raw = self.get(position).ok_or_else(|| ArgumentError::Missing {
            position,
            name: name.clone(),
        })?;
        serde_json::from_value(raw.clone()).map_err(|source| ArgumentError::Shape {
            position,
            name,
            source,
        })
    }

    /// Deserialize the value at `position`, or `None` when the slot is empty.
    pub fn optional<T: DeserializeOwned>(&self, position: usize) -> Result<Option<T>, ArgumentError> {
        match self.get(position) {
            None if position < self.len() => Ok(None),
            _ => self.value(position).map(Some),
        }
    }

    /// Store a raw value at `position`.
    pub fn set(&mut self, position: usize, value: Value) -> Result<(), ArgumentError> {
        let slot = self
            .slots
            .get_mut(position)
            .ok_or(ArgumentError::OutOfRange(position))?;
        *slot = Some(value);
        Ok(())
    }

    /// Serialize `value` into the slot at `position`.
    pub fn put<T: Serialize>(&mut self, position: usize, value: &T) -> Result<(), ArgumentError> {
        let name = self
            .name(position)
            .ok_or(ArgumentError::OutOfRange(position))?
            .to_string();
        let raw = serde_json::to_value(value).map_err(|source| ArgumentError::Shape {
            position,
            name,
            source,
        })?;
        self.set(position, raw)
    }

    /// Empty the slot at `position`, returning its value.
    pub fn take(&mut self, position: usize) -> Option<Value> {
        self.slots.get_mut(position).and_then(Option::take)
    }

    /// Iterate `(position, name, value)` for every filled slot.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &Value)> {
        self.names
            .iter()
            .zip(&self.slots)
            .enumerate()
            .filter_map(|(i, (name, slot))| slot.as_ref().map(|v| (i, name.as_str(), v)))
    }
}
