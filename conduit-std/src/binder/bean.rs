//! Structured bean population from prefixed keys.
//!
//! A bean with mask `user:` is assembled from every key of one scope that
//! starts with `user:`. The mask is stripped and the rest is a dotted path:
//!
//! ```text
//! user:name         = "Jane"     ┐
//! user:address.city = "Lisbon"   ┴─> {"name": "Jane", "address": {"city": "Lisbon"}}
//! ```

use super::coerce::coerce;
use conduit_core::{BeanSpec, Scope, ScopeStore, Value, Violation, ViolationKind};
use serde_json::Map;

/// A bean assembled from one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Bean {
    /// The scope the fields came from.
    pub scope: Scope,
    /// The assembled object.
    pub value: Value,
    /// Field coercion failures, named by their full key.
    pub violations: Vec<Violation>,
}

/// Assemble a bean from the first scope holding any key with the mask.
///
/// Scopes are not merged: once a scope has matching keys, later scopes are
/// ignored even for fields the first scope lacks.
pub fn gather(spec: &BeanSpec, scopes: &[Scope], store: &dyn ScopeStore) -> Option<Bean> {
    scopes.iter().find_map(|&scope| {
        let keys: Vec<String> = store
            .keys(scope)
            .into_iter()
            .filter(|key| key.len() > spec.mask.len() && key.starts_with(&spec.mask))
            .collect();
        if keys.is_empty() {
            return None;
        }

        let mut object = Map::new();
        let mut violations = Vec::new();
        for key in keys {
            let Some(raw) = store.get(scope, &key).filter(|v| !v.is_null()) else {
                continue;
            };
            let path = &key[spec.mask.len()..];
            let value = match spec.fields.get(path) {
                None => raw,
                Some(kind) => match coerce(raw, kind) {
                    Ok(value) => value,
                    Err(err) => {
                        violations.push(Violation::new(
                            key.as_str(),
                            ViolationKind::Type {
                                expected: err.expected,
                            },
                        ));
                        continue;
                    }
                },
            };
            let segments: Vec<&str> = path.split('.').collect();
            insert(&mut object, &segments, value);
        }
        Some(Bean {
            scope,
            value: Value::Object(object),
            violations,
        })
    })
}

/// Flatten a bean back into `(mask + path, leaf)` pairs.
pub fn flatten(spec: &BeanSpec, value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    if let Value::Object(object) = value {
        walk(object, &spec.mask, true, &mut out);
    }
    out
}

fn insert(object: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            object.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = object
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert(inner, rest, value);
            }
        }
    }
}

fn walk(object: &Map<String, Value>, prefix: &str, top: bool, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let path = if top {
            format!("{prefix}{key}")
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => walk(inner, &path, false, out),
            leaf => out.push((path, leaf.clone())),
        }
    }
}
