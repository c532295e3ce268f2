//! Raw value → semantic type coercion.
//!
//! Hosts deliver most submitted values as strings (or single-element string
//! arrays), so every scalar kind accepts its textual form.

use conduit_core::{Value, ValueKind};
use serde_json::Number;
use thiserror::Error;

/// A raw value that cannot be coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}")]
pub struct CoercionError {
    /// Name of the expected kind.
    pub expected: String,
}

impl CoercionError {
    fn new(kind: &ValueKind) -> Self {
        Self {
            expected: kind.name(),
        }
    }
}

/// Coerce `raw` to `kind`.
pub fn coerce(raw: Value, kind: &ValueKind) -> Result<Value, CoercionError> {
    let mismatch = || CoercionError::new(kind);
    match kind {
        ValueKind::Any => Ok(raw),
        ValueKind::Array(element) => match raw {
            Value::Array(items) => items
                .into_iter()
                .map(|item| coerce(item, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
                .map_err(|_| mismatch()),
            scalar => Ok(Value::Array(vec![
                coerce(scalar, element).map_err(|_| mismatch())?,
            ])),
        },
        ValueKind::Bean(_) => match raw {
            Value::Object(_) => Ok(raw),
            _ => Err(mismatch()),
        },
        scalar_kind => match raw {
            Value::Array(mut items) if items.len() == 1 => coerce(items.remove(0), scalar_kind),
            value => coerce_scalar(value, scalar_kind).ok_or_else(mismatch),
        },
    }
}

fn coerce_scalar(raw: Value, kind: &ValueKind) -> Option<Value> {
    match (kind, raw) {
        (ValueKind::String, Value::String(s)) => Some(Value::String(s)),
        (ValueKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ValueKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ValueKind::Integer, Value::Number(n)) => integer(&n).map(Value::from),
        (ValueKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

        (ValueKind::Number, Value::Number(n)) => Some(Value::Number(n)),
        (ValueKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),

        (ValueKind::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ValueKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        (ValueKind::Boolean, Value::String(s)) => boolean(&s).map(Value::Bool),

        _ => None,
    }
}

fn integer(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn boolean(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}
