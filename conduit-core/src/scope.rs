//! # Scope Store (Leaf Layer)
//!
//! Scopes are independent key→value containers with different lifetimes and
//! visibility. The host runtime owns and populates them; the engine only
//! reads inputs from them and writes outputs back.
//!
//! | scope            | lifetime                          |
//! |------------------|-----------------------------------|
//! | `Submission`     | one request, URL/form visible     |
//! | `Request`        | one request                       |
//! | `SessionPrivate` | one session, one target window    |
//! | `SessionShared`  | one session, all target windows   |
//! | `Config`         | process, read-only                |

use crate::{error::ScopeError, state::InterceptorState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// Identifies one of the data scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Per-submission parameters (form fields, URL parameters).
    Submission,
    /// Per-request attributes.
    Request,
    /// Session data private to one target window.
    SessionPrivate,
    /// Session data shared by every target window.
    SessionShared,
    /// Static configuration values.
    Config,
}

impl Scope {
    /// Default candidate order used when a binding does not declare one.
    pub const DEFAULT_ORDER: [Scope; 5] = [
        Scope::Submission,
        Scope::Request,
        Scope::SessionPrivate,
        Scope::SessionShared,
        Scope::Config,
    ];

    /// Snake-case scope name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Scope::Submission => "submission",
            Scope::Request => "request",
            Scope::SessionPrivate => "session_private",
            Scope::SessionShared => "session_shared",
            Scope::Config => "config",
        }
    }

    /// Whether writes into this scope depend on the dispatch phase.
    pub const fn is_constrained(self) -> bool {
        matches!(self, Scope::Submission)
    }

    /// Whether this scope can never be written by the engine.
    pub const fn is_read_only(self) -> bool {
        matches!(self, Scope::Config)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submission" => Ok(Scope::Submission),
            "request" => Ok(Scope::Request),
            "session_private" => Ok(Scope::SessionPrivate),
            "session_shared" => Ok(Scope::SessionShared),
            "config" => Ok(Scope::Config),
            other => Err(format!("unknown scope {other:?}")),
        }
    }
}

/// The host-side container for all scopes of one request.
///
/// Request-bound scopes are only touched by the dispatching thread. Session
/// scopes may be shared with concurrent requests of the same session, so
/// implementations guard them at the point of access and never hand out
/// long-lived locks.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `ScopeStore`",
    label = "missing `ScopeStore` implementation",
    note = "Scope stores must provide get/set/remove/keys and the session interceptor state."
)]
pub trait ScopeStore {
    /// Read a value. Absent keys yield `None`.
    fn get(&self, scope: Scope, key: &str) -> Option<Value>;

    /// Write a value.
    fn set(&mut self, scope: Scope, key: &str, value: Value) -> Result<(), ScopeError>;

    /// Remove a value, returning the previous one.
    fn remove(&mut self, scope: Scope, key: &str) -> Option<Value>;

    /// Enumerate the keys currently held by a scope.
    fn keys(&self, scope: Scope) -> Vec<String>;

    /// Session-scoped private state for interceptors.
    fn interceptor_state(&self) -> &InterceptorState;

    /// Whether the scope holds a non-null value for `key`.
    fn contains(&self, scope: Scope, key: &str) -> bool {
        self.get(scope, key).is_some_and(|v| !v.is_null())
    }
}
