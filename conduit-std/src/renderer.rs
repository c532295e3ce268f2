//! # Renderer Selection
//!
//! Maps a target's symbolic outcome to a [`RenderDirective`], and hands
//! directives to the renderer registered under their id.
//!
//! Declared outcomes resolve directly. For an undeclared outcome the
//! selector is strict unless `auto_outcomes` is on, in which case a
//! descriptor is synthesized from the [`OutcomeConvention`] and cached in
//! the target descriptor, so later lookups see the same `Arc`.
//!
//! Reserved outcomes (the ones the engine itself produces, such as
//! `invalid_input` and `double_submit`) always fall back to the convention:
//! a target cannot be expected to declare every outcome an interceptor might
//! substitute.

use conduit_core::{
    BoxError, ConduitError, ConfigError, Outcome, OutcomeConvention, RenderDirective, ScopeStore,
    TargetDescriptor,
};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

/// Resolves outcomes to render directives.
#[derive(Debug, Clone)]
pub struct RendererSelector {
    convention: OutcomeConvention,
    auto_outcomes: bool,
    reserved: BTreeSet<String>,
}

impl RendererSelector {
    /// Create a strict selector with the default reserved outcomes.
    pub fn new(convention: OutcomeConvention) -> Self {
        Self {
            convention,
            auto_outcomes: false,
            reserved: [Outcome::INVALID_INPUT, Outcome::DOUBLE_SUBMIT]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Synthesize descriptors for every undeclared outcome.
    pub fn auto_outcomes(mut self, enabled: bool) -> Self {
        self.auto_outcomes = enabled;
        self
    }

    /// Treat `outcome` as engine-produced.
    pub fn reserve(mut self, outcome: impl Into<String>) -> Self {
        self.reserved.insert(outcome.into());
        self
    }

    /// The naming convention in use.
    pub fn convention(&self) -> &OutcomeConvention {
        &self.convention
    }

    /// Whether `outcome` is engine-produced.
    pub fn is_reserved(&self, outcome: &str) -> bool {
        self.reserved.contains(outcome)
    }

    /// Resolve `outcome` for `descriptor`.
    pub fn resolve(
        &self,
        descriptor: &TargetDescriptor,
        outcome: &Outcome,
    ) -> Result<RenderDirective, ConfigError> {
        if let Some(found) = descriptor.outcome(outcome.as_str()) {
            return Ok(found.directive());
        }
        if !self.auto_outcomes && !self.is_reserved(outcome.as_str()) {
            return Err(ConfigError::UnknownOutcome {
                target: descriptor.id().clone(),
                outcome: outcome.to_string(),
            });
        }

        let synthesized = descriptor.outcome_or_insert_with(outcome.as_str(), || {
            tracing::debug!(id = %descriptor.id(), %outcome, "synthesizing outcome");
            self.convention.synthesize(descriptor.id(), outcome.as_str())
        });
        Ok(synthesized.directive())
    }
}

impl Default for RendererSelector {
    fn default() -> Self {
        Self::new(OutcomeConvention::default())
    }
}

// ============================================================================
// Renderers
// ============================================================================

/// Produces the response for a directive.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Renderer`",
    label = "missing `Renderer` implementation",
    note = "Renderers receive the directive and read-only scopes."
)]
pub trait Renderer: Send + Sync + 'static {
    /// Render `directive`.
    fn render(&self, directive: &RenderDirective, store: &dyn ScopeStore) -> Result<(), BoxError>;
}

impl<F> Renderer for F
where
    F: Fn(&RenderDirective, &dyn ScopeStore) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn render(&self, directive: &RenderDirective, store: &dyn ScopeStore) -> Result<(), BoxError> {
        (self)(directive, store)
    }
}

/// Installed renderers, keyed by renderer id.
#[derive(Clone, Default)]
pub struct RendererSet {
    renderers: HashMap<String, Arc<dyn Renderer>>,
}

impl RendererSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the renderer for `id`.
    pub fn insert(&mut self, id: impl Into<String>, renderer: impl Renderer) -> &mut Self {
        self.insert_shared(id, Arc::new(renderer))
    }

    /// Install a shared renderer instance.
    pub fn insert_shared(&mut self, id: impl Into<String>, renderer: Arc<dyn Renderer>) -> &mut Self {
        self.renderers.insert(id.into(), renderer);
        self
    }

    /// The renderer for `id`.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(id)
    }

    /// Whether a renderer is installed for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.renderers.contains_key(id)
    }

    /// Whether no renderer is installed.
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Hand `directive` to its renderer.
    pub fn render(&self, directive: &RenderDirective, store: &dyn ScopeStore) -> Result<(), ConduitError> {
        let renderer = self
            .get(&directive.renderer)
            .ok_or_else(|| ConfigError::UnknownRenderer(directive.renderer.clone()))?;
        renderer.render(directive, store).map_err(ConduitError::Custom)
    }
}

impl fmt::Debug for RendererSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("RendererSet").field("renderers", &ids).finish()
    }
}
