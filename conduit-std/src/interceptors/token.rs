//! Duplicate-submission suppression.
//!
//! # Ledger
//!
//! Each session keeps a bounded ledger of the submission tokens this
//! interceptor instance has seen, stored in the session's
//! [`InterceptorState`](conduit_core::InterceptorState) under the
//! interceptor's key. A token is `Pending` while its invocation runs and
//! `Done` afterwards, remembering the outcome.
//!
//! # Locking
//!
//! The ledger lock is held only while a token is checked or recorded, so two
//! submissions of the same session never wait on each other's handler. With
//! `serialize = true` the lock is held across the nested invocation instead:
//! the second submission then waits and sees the completed entry.

use conduit_core::{
    BoxError, ConfigError, Interceptor, InterceptorKey, Invocation, Next, Outcome, Params, Scope,
    Value,
};
use parking_lot::{Mutex, MutexGuard};
use std::{
    collections::{HashMap, VecDeque},
    fmt,
    str::FromStr,
};

/// Submission-scope key carrying the token by default.
pub const TOKEN_KEY: &str = "conduit.token";

const DEFAULT_CAPACITY: usize = 64;

/// What a repeated token yields once the first submission has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenMode {
    /// Always answer with the double-submission outcome.
    #[default]
    Reject,
    /// Answer with the outcome recorded for the first submission.
    Replay,
}

impl FromStr for TokenMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(TokenMode::Reject),
            "replay" => Ok(TokenMode::Replay),
            other => Err(format!("expected \"reject\" or \"replay\", got {other:?}")),
        }
    }
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenMode::Reject => "reject",
            TokenMode::Replay => "replay",
        })
    }
}

enum Entry {
    Pending,
    Done(Outcome),
}

enum Decision {
    Fresh,
    InFlight,
    Completed(Outcome),
}

#[derive(Default)]
struct Ledger {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
}

impl Ledger {
    fn begin(&mut self, token: &str) -> Decision {
        match self.entries.get(token) {
            Some(Entry::Pending) => Decision::InFlight,
            Some(Entry::Done(outcome)) => Decision::Completed(outcome.clone()),
            None => {
                self.entries.insert(token.to_string(), Entry::Pending);
                self.order.push_back(token.to_string());
                Decision::Fresh
            }
        }
    }

    fn settle(&mut self, token: &str, result: &Result<Outcome, BoxError>, capacity: usize) {
        match result {
            Ok(outcome) => {
                self.entries.insert(token.to_string(), Entry::Done(outcome.clone()));
                self.evict(capacity);
            }
            // A failed submission may be retried with the same token.
            Err(_) => self.forget(token),
        }
    }

    fn forget(&mut self, token: &str) {
        self.entries.remove(token);
        self.order.retain(|t| t != token);
    }

    /// Drop the oldest completed entries until within capacity. Pending
    /// entries are never evicted.
    fn evict(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some(index) = self
                .order
                .iter()
                .position(|t| matches!(self.entries.get(t), Some(Entry::Done(_))))
            else {
                break;
            };
            if let Some(token) = self.order.remove(index) {
                self.entries.remove(&token);
            }
        }
    }
}

/// A fresh token whose submission is running.
///
/// Dropped without [`PendingToken::settle`] (the chain panicked), it forgets
/// the token so the session can submit it again.
struct PendingToken<'a> {
    ledger: &'a Mutex<Ledger>,
    held: Option<MutexGuard<'a, Ledger>>,
    token: &'a str,
    settled: bool,
}

impl PendingToken<'_> {
    fn settle(mut self, result: &Result<Outcome, BoxError>, capacity: usize) {
        match self.held.as_mut() {
            Some(ledger) => ledger.settle(self.token, result, capacity),
            None => self.ledger.lock().settle(self.token, result, capacity),
        }
        self.settled = true;
    }
}

impl Drop for PendingToken<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(token = self.token, "submission abandoned");
        match self.held.as_mut() {
            Some(ledger) => ledger.forget(self.token),
            None => self.ledger.lock().forget(self.token),
        }
    }
}

/// Suppresses repeated submissions carrying the same token.
///
/// Dispatches without a token pass through untouched.
///
/// # Parameters
///
/// | key         | default          |
/// |-------------|------------------|
/// | `token_key` | `conduit.token`  |
/// | `outcome`   | `double_submit`  |
/// | `mode`      | `reject`         |
/// | `serialize` | `false`          |
/// | `capacity`  | `64`             |
pub struct TokenInterceptor {
    key: InterceptorKey,
    token_key: String,
    outcome: Outcome,
    mode: TokenMode,
    serialize: bool,
    capacity: usize,
}

impl TokenInterceptor {
    /// Create a token interceptor with the default parameters.
    pub fn new() -> Self {
        Self {
            key: InterceptorKey::new("token"),
            token_key: TOKEN_KEY.to_string(),
            outcome: Outcome::new(Outcome::DOUBLE_SUBMIT),
            mode: TokenMode::Reject,
            serialize: false,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Read the token from another submission key.
    pub fn token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Outcome returned for rejected submissions.
    pub fn outcome(mut self, outcome: impl Into<Outcome>) -> Self {
        self.outcome = outcome.into();
        self
    }

    /// Behavior for tokens whose first submission already completed.
    pub fn mode(mut self, mode: TokenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Hold the ledger lock across the nested invocation.
    pub fn serialize(mut self, serialize: bool) -> Self {
        self.serialize = serialize;
        self
    }

    /// Maximum number of remembered tokens per session.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Build from configuration parameters.
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        let capacity: usize = params.parse_or("capacity", DEFAULT_CAPACITY)?;
        if capacity == 0 {
            return Err(params.invalid("capacity", "must be at least 1"));
        }
        let outcome = params.get_or("outcome", Outcome::DOUBLE_SUBMIT);
        if outcome.trim().is_empty() {
            return Err(params.invalid("outcome", "must not be empty"));
        }
        Ok(Self {
            key: InterceptorKey::new(params.interceptor()),
            token_key: params.get_or("token_key", TOKEN_KEY).to_string(),
            outcome: Outcome::new(outcome),
            mode: params.parse_or("mode", TokenMode::Reject)?,
            serialize: params.parse_or("serialize", false)?,
            capacity,
        })
    }

    fn answer(&self, invocation: &Invocation<'_>, token: &str, decision: Decision) -> Outcome {
        let outcome = match (decision, self.mode) {
            (Decision::Completed(recorded), TokenMode::Replay) => recorded,
            _ => self.outcome.clone(),
        };
        tracing::warn!(id = %invocation.target(), token, %outcome, "duplicate submission");
        outcome
    }
}

impl Default for TokenInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInterceptor")
            .field("key", &self.key)
            .field("token_key", &self.token_key)
            .field("mode", &self.mode)
            .field("serialize", &self.serialize)
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn token_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(mut items) if items.len() == 1 => items.pop().and_then(token_text),
        _ => None,
    }
}

impl Interceptor for TokenInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn outcomes(&self) -> &[Outcome] {
        std::slice::from_ref(&self.outcome)
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        let Some(token) = invocation
            .store()
            .get(Scope::Submission, &self.token_key)
            .and_then(token_text)
        else {
            return next.proceed(invocation);
        };
        let ledger = invocation.interceptor_state().slot::<Mutex<Ledger>>(&self.key);

        let mut guard = ledger.lock();
        let decision = guard.begin(&token);
        if !matches!(decision, Decision::Fresh) {
            drop(guard);
            return Ok(self.answer(invocation, &token, decision));
        }
        let held = if self.serialize {
            Some(guard)
        } else {
            drop(guard);
            None
        };
        let pending = PendingToken {
            ledger: &ledger,
            held,
            token: &token,
            settled: false,
        };
        let result = next.proceed(invocation);
        pending.settle(&result, self.capacity);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::{MemoryScopeStore, Session};
    use conduit_core::{Arguments, CallAdapter, Phase, TargetDescriptor, TargetId};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn target(calls: Arc<AtomicUsize>) -> TargetDescriptor {
        let adapter: CallAdapter = Arc::new(move |_args: &mut Arguments| -> Result<Outcome, BoxError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::new("saved"))
        });
        TargetDescriptor::builder(TargetId::new("Order", "place"), adapter).build()
    }

    fn run(chain: &[Arc<dyn Interceptor>], descriptor: &TargetDescriptor, store: &mut MemoryScopeStore) -> Outcome {
        let mut invocation = Invocation::new(descriptor, store, descriptor.arguments(), Phase::Action);
        Next::new(chain).proceed(&mut invocation).unwrap()
    }

    #[test]
    fn test_sequential_duplicate_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = target(Arc::clone(&calls));
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(TokenInterceptor::new())];
        let session = Session::new("s1");

        let mut first = MemoryScopeStore::new(Arc::clone(&session)).submit(TOKEN_KEY, "t-1");
        let mut second = MemoryScopeStore::new(Arc::clone(&session)).submit(TOKEN_KEY, "t-1");

        assert_eq!(run(&chain, &descriptor, &mut first), "saved");
        assert_eq!(run(&chain, &descriptor, &mut second), Outcome::DOUBLE_SUBMIT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_replay_returns_recorded_outcome() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = target(Arc::clone(&calls));
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(TokenInterceptor::new().mode(TokenMode::Replay))];
        let session = Session::new("s1");

        for _ in 0..3 {
            let mut store = MemoryScopeStore::new(Arc::clone(&session)).submit(TOKEN_KEY, "t-1");
            assert_eq!(run(&chain, &descriptor, &mut store), "saved");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = target(Arc::clone(&calls));
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(TokenInterceptor::new())];

        let mut a = MemoryScopeStore::new(Session::new("a")).submit(TOKEN_KEY, "t-1");
        let mut b = MemoryScopeStore::new(Session::new("b")).submit(TOKEN_KEY, "t-1");
        run(&chain, &descriptor, &mut a);
        run(&chain, &descriptor, &mut b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_token_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = target(Arc::clone(&calls));
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(TokenInterceptor::new())];
        let session = Session::new("s1");

        for _ in 0..2 {
            let mut store = MemoryScopeStore::new(Arc::clone(&session));
            run(&chain, &descriptor, &mut store);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_submission_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let adapter: CallAdapter = Arc::new(move |_args: &mut Arguments| -> Result<Outcome, BoxError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("transient".into())
            } else {
                Ok(Outcome::success())
            }
        });
        let descriptor = TargetDescriptor::builder(TargetId::new("Order", "place"), adapter).build();
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(TokenInterceptor::new())];
        let session = Session::new("s1");

        let mut first = MemoryScopeStore::new(Arc::clone(&session)).submit(TOKEN_KEY, "t-1");
        let mut invocation = Invocation::new(&descriptor, &mut first, descriptor.arguments(), Phase::Action);
        assert!(Next::new(&chain).proceed(&mut invocation).is_err());

        let mut second = MemoryScopeStore::new(session).submit(TOKEN_KEY, "t-1");
        assert_eq!(run(&chain, &descriptor, &mut second), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicked_submission_releases_token() {
        for serialize in [false, true] {
            let attempts = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&attempts);
            let adapter: CallAdapter = Arc::new(move |_args: &mut Arguments| -> Result<Outcome, BoxError> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("handler crashed");
                }
                Ok(Outcome::success())
            });
            let descriptor = TargetDescriptor::builder(TargetId::new("Order", "place"), adapter).build();
            let chain: Vec<Arc<dyn Interceptor>> =
                vec![Arc::new(TokenInterceptor::new().serialize(serialize))];
            let session = Session::new("s1");

            let mut first = MemoryScopeStore::new(Arc::clone(&session)).submit(TOKEN_KEY, "t-1");
            let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut invocation =
                    Invocation::new(&descriptor, &mut first, descriptor.arguments(), Phase::Action);
                Next::new(&chain).proceed(&mut invocation)
            }));
            assert!(crashed.is_err());

            let mut second = MemoryScopeStore::new(session).submit(TOKEN_KEY, "t-1");
            assert_eq!(run(&chain, &descriptor, &mut second), "success");
            assert_eq!(attempts.load(Ordering::SeqCst), 2);
        }
    }

    #[test]
    fn test_configured_outcome_is_reported() {
        let params = Params::new("token").with("outcome", "dup");
        let interceptor = TokenInterceptor::from_params(&params).unwrap();
        assert_eq!(interceptor.outcomes(), &[Outcome::new("dup")]);
    }

    #[test]
    fn test_ledger_evicts_oldest_completed() {
        let mut ledger = Ledger::default();
        for token in ["a", "b", "c"] {
            assert!(matches!(ledger.begin(token), Decision::Fresh));
            ledger.settle(token, &Ok(Outcome::success()), 2);
        }
        assert!(matches!(ledger.begin("a"), Decision::Fresh));
        assert!(matches!(ledger.begin("c"), Decision::Completed(_)));
    }

    #[test]
    fn test_pending_entries_survive_eviction() {
        let mut ledger = Ledger::default();
        assert!(matches!(ledger.begin("pending"), Decision::Fresh));
        ledger.begin("done");
        ledger.settle("done", &Ok(Outcome::success()), 1);
        assert!(matches!(ledger.begin("pending"), Decision::InFlight));
    }

    #[test]
    fn test_params() {
        let params = Params::new("token").with("mode", "replay").with("capacity", "4");
        let interceptor = TokenInterceptor::from_params(&params).unwrap();
        assert_eq!(interceptor.mode, TokenMode::Replay);
        assert_eq!(interceptor.capacity, 4);

        let bad = Params::new("token").with("mode", "ignore");
        assert!(TokenInterceptor::from_params(&bad).is_err());
        let zero = Params::new("token").with("capacity", "0");
        assert!(TokenInterceptor::from_params(&zero).is_err());
    }
}
