//! Testing utilities for Conduit.
//!
//! This module provides doubles for the extension points, so stacks,
//! dispatchers and renderers can be exercised without real handlers.
//!
//! # Features
//!
//! - [`CountingInterceptor`]: counts calls, optionally short-circuits
//! - [`RecordingInterceptor`]: records before/after entries in a shared log
//! - [`FailingInterceptor`]: always fails
//! - [`StaticOutcome`]: a call adapter returning a fixed outcome
//! - [`RecordingRenderer`]: a renderer that records directives

use conduit_core::{
    Arguments, BoxError, CallAdapter, Interceptor, InterceptorKey, Invocation, Next, Outcome,
    RenderDirective, ScopeStore,
};
use crate::renderer::Renderer;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Counting Interceptor
// ============================================================================

/// An interceptor that counts how often it runs.
///
/// Clones share the counter and the key.
///
/// # Example
///
/// ```rust,ignore
/// let gate = CountingInterceptor::short_circuit("denied");
/// let stack = InterceptorStack::new("gated").with(gate.clone());
/// // ... dispatch ...
/// assert_eq!(gate.count(), 1);
/// ```
#[derive(Clone)]
pub struct CountingInterceptor {
    key: InterceptorKey,
    count: Arc<AtomicUsize>,
    outcome: Option<Outcome>,
}

impl CountingInterceptor {
    /// Create a counting interceptor that continues the chain.
    pub fn new() -> Self {
        Self {
            key: InterceptorKey::new("counting"),
            count: Arc::new(AtomicUsize::new(0)),
            outcome: None,
        }
    }

    /// Create a counting interceptor that returns `outcome` without
    /// continuing the chain.
    pub fn short_circuit(outcome: impl Into<Outcome>) -> Self {
        Self {
            outcome: Some(outcome.into()),
            ..Self::new()
        }
    }

    /// Number of calls so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for CountingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for CountingInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn outcomes(&self) -> &[Outcome] {
        self.outcome.as_slice()
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Some(outcome) => Ok(outcome.clone()),
            None => next.proceed(invocation),
        }
    }
}

// ============================================================================
// Recording Interceptor
// ============================================================================

/// An interceptor that appends `label:before` and `label:after` entries to a
/// log, which several recorders may share to observe chain order.
#[derive(Clone)]
pub struct RecordingInterceptor {
    key: InterceptorKey,
    label: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingInterceptor {
    /// Create a recorder with its own log.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            key: InterceptorKey::new(label.as_str()),
            label,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a recorder writing to the log of `other`.
    pub fn sharing(label: impl Into<String>, other: &RecordingInterceptor) -> Self {
        Self {
            log: Arc::clone(&other.log),
            ..Self::new(label)
        }
    }

    /// A copy of the shared log.
    pub fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Clear the shared log.
    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Interceptor for RecordingInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Outcome, BoxError> {
        self.log.lock().push(format!("{}:before", self.label));
        let result = next.proceed(invocation);
        self.log.lock().push(format!("{}:after", self.label));
        result
    }
}

// ============================================================================
// Failing Interceptor
// ============================================================================

/// An interceptor that fails without continuing the chain.
pub struct FailingInterceptor {
    key: InterceptorKey,
    message: String,
}

impl FailingInterceptor {
    /// Fail with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            key: InterceptorKey::new("failing"),
            message: message.into(),
        }
    }
}

impl Interceptor for FailingInterceptor {
    fn key(&self) -> &InterceptorKey {
        &self.key
    }

    fn intercept(&self, _invocation: &mut Invocation<'_>, _next: Next<'_>) -> Result<Outcome, BoxError> {
        Err(self.message.clone().into())
    }
}

// ============================================================================
// Static Outcome
// ============================================================================

/// A handler double that returns a fixed outcome and counts its calls.
#[derive(Clone)]
pub struct StaticOutcome {
    outcome: Outcome,
    calls: Arc<AtomicUsize>,
}

impl StaticOutcome {
    /// Always return `outcome`.
    pub fn new(outcome: impl Into<Outcome>) -> Self {
        Self {
            outcome: outcome.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A call adapter sharing this double's counter.
    pub fn adapter(&self) -> CallAdapter {
        let outcome = self.outcome.clone();
        let calls = Arc::clone(&self.calls);
        Arc::new(move |_args: &mut Arguments| -> Result<Outcome, BoxError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(outcome.clone())
        })
    }

    /// Number of calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Recording Renderer
// ============================================================================

/// A renderer that records every directive it receives.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    directives: Arc<Mutex<Vec<RenderDirective>>>,
}

impl RecordingRenderer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the recorded directives.
    pub fn directives(&self) -> Vec<RenderDirective> {
        self.directives.lock().clone()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, directive: &RenderDirective, _store: &dyn ScopeStore) -> Result<(), BoxError> {
        self.directives.lock().push(directive.clone());
        Ok(())
    }
}
