//! In-memory scope store.

use conduit_core::{InterceptorState, Scope, ScopeError, ScopeStore, Value};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// A plain key→value scope container.
pub type ScopeMap = HashMap<String, Value>;

struct SharedSession {
    values: RwLock<ScopeMap>,
    state: InterceptorState,
}

/// One user session as seen from one target window.
///
/// Windows of the same session share the `SessionShared` scope and the
/// interceptor state; each window has its own `SessionPrivate` scope.
/// All access goes through short-lived locks, so concurrent requests of the
/// same session may hold clones of the same `Arc<Session>`.
pub struct Session {
    id: String,
    private: RwLock<ScopeMap>,
    shared: Arc<SharedSession>,
}

impl Session {
    /// Create a new session.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            private: RwLock::new(ScopeMap::new()),
            shared: Arc::new(SharedSession {
                values: RwLock::new(ScopeMap::new()),
                state: InterceptorState::new(),
            }),
        })
    }

    /// Open another window of this session with an empty private scope.
    pub fn window(&self, id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            private: RwLock::new(ScopeMap::new()),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Session (window) id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Interceptor state of the session.
    pub fn interceptor_state(&self) -> &InterceptorState {
        &self.shared.state
    }

    fn map(&self, scope: Scope) -> Option<&RwLock<ScopeMap>> {
        match scope {
            Scope::SessionPrivate => Some(&self.private),
            Scope::SessionShared => Some(&self.shared.values),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("private", &self.private.read().len())
            .field("shared", &self.shared.values.read().len())
            .finish()
    }
}

/// A [`ScopeStore`] backed by hash maps.
///
/// Submission and request scopes are owned by the store and live as long as
/// it does; session scopes live in the shared [`Session`]; the configuration
/// scope is a read-only map shared by every store.
#[derive(Debug)]
pub struct MemoryScopeStore {
    submission: ScopeMap,
    request: ScopeMap,
    session: Arc<Session>,
    config: Arc<ScopeMap>,
}

impl MemoryScopeStore {
    /// Create a request store bound to `session`.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            submission: ScopeMap::new(),
            request: ScopeMap::new(),
            session,
            config: Arc::new(ScopeMap::new()),
        }
    }

    /// Create a request store with a fresh anonymous session.
    pub fn detached() -> Self {
        Self::new(Session::new("anonymous"))
    }

    /// Attach the process-wide configuration scope.
    pub fn with_config(mut self, config: Arc<ScopeMap>) -> Self {
        self.config = config;
        self
    }

    /// Add a submitted value, as the host does while decoding a request.
    pub fn submit(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.submission.insert(key.into(), value.into());
        self
    }

    /// The session this store is bound to.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl ScopeStore for MemoryScopeStore {
    fn get(&self, scope: Scope, key: &str) -> Option<Value> {
        match scope {
            Scope::Submission => self.submission.get(key).cloned(),
            Scope::Request => self.request.get(key).cloned(),
            Scope::Config => self.config.get(key).cloned(),
            _ => self.session.map(scope)?.read().get(key).cloned(),
        }
    }

    fn set(&mut self, scope: Scope, key: &str, value: Value) -> Result<(), ScopeError> {
        match scope {
            Scope::Submission => {
                self.submission.insert(key.to_string(), value);
            }
            Scope::Request => {
                self.request.insert(key.to_string(), value);
            }
            Scope::Config => return Err(ScopeError::ReadOnly(scope)),
            _ => {
                if let Some(map) = self.session.map(scope) {
                    map.write().insert(key.to_string(), value);
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, scope: Scope, key: &str) -> Option<Value> {
        match scope {
            Scope::Submission => self.submission.remove(key),
            Scope::Request => self.request.remove(key),
            Scope::Config => None,
            _ => self.session.map(scope)?.write().remove(key),
        }
    }

    fn keys(&self, scope: Scope) -> Vec<String> {
        let mut keys: Vec<String> = match scope {
            Scope::Submission => self.submission.keys().cloned().collect(),
            Scope::Request => self.request.keys().cloned().collect(),
            Scope::Config => self.config.keys().cloned().collect(),
            _ => self
                .session
                .map(scope)
                .map(|map| map.read().keys().cloned().collect())
                .unwrap_or_default(),
        };
        keys.sort();
        keys
    }

    fn interceptor_state(&self) -> &InterceptorState {
        self.session.interceptor_state()
    }
}
