//! Symbolic outcomes and render directives.
//!
//! A handler summarizes what happened as a short string token (`"success"`,
//! `"error"`, ...). The target's outcome table maps that token to a renderer
//! id and renderer-specific data, producing a [`RenderDirective`].

use crate::target::TargetId;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// A symbolic outcome token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outcome(Arc<str>);

impl Outcome {
    /// Conventional success outcome.
    pub const SUCCESS: &'static str = "success";
    /// Conventional failure outcome.
    pub const ERROR: &'static str = "error";
    /// Produced by the violation handler when inputs are rejected.
    pub const INVALID_INPUT: &'static str = "invalid_input";
    /// Produced by the duplicate-submission interceptor.
    pub const DOUBLE_SUBMIT: &'static str = "double_submit";
    /// Produced by the dispatcher when an invocation fails.
    pub const FATAL: &'static str = "fatal";

    /// Create an outcome token.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// `"success"`.
    pub fn success() -> Self {
        Self::new(Self::SUCCESS)
    }

    /// `"error"`.
    pub fn error() -> Self {
        Self::new(Self::ERROR)
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Outcome {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for Outcome {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Outcome {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// How one outcome of a target is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeDescriptor {
    /// The outcome token.
    pub id: String,
    /// Which renderer handles it.
    pub renderer: String,
    /// Renderer-specific data (a template path, a redirect URL, ...).
    pub data: String,
    /// Optional mode transition hint for the render boundary.
    pub mode: Option<String>,
    /// Optional window-state transition hint for the render boundary.
    pub window_state: Option<String>,
}

impl OutcomeDescriptor {
    /// Build the directive handed to the render boundary.
    pub fn directive(&self) -> RenderDirective {
        RenderDirective {
            outcome: Outcome::new(self.id.as_str()),
            renderer: self.renderer.clone(),
            data: self.data.clone(),
            mode: self.mode.clone(),
            window_state: self.window_state.clone(),
        }
    }
}

/// What the render boundary receives: which renderer, with what data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDirective {
    /// The outcome being rendered.
    #[serde(with = "outcome_serde")]
    pub outcome: Outcome,
    /// Renderer id.
    pub renderer: String,
    /// Renderer-specific data.
    pub data: String,
    /// Optional mode transition hint.
    pub mode: Option<String>,
    /// Optional window-state transition hint.
    pub window_state: Option<String>,
}

mod outcome_serde {
    use super::Outcome;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(outcome: &Outcome, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(outcome.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Outcome, D::Error> {
        String::deserialize(deserializer).map(Outcome::from)
    }
}

/// The naming convention used to synthesize render data for outcomes that
/// carry no explicit data.
///
/// The template may reference `{root}`, `{action}`, `{method}` and
/// `{outcome}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeConvention {
    /// Value substituted for `{root}`.
    pub root: String,
    /// Renderer used when an outcome names none.
    pub renderer: String,
    /// Data template for outcomes without explicit data.
    pub template: String,
}

impl Default for OutcomeConvention {
    fn default() -> Self {
        Self {
            root: "/views".to_string(),
            renderer: "template".to_string(),
            template: "{root}/{action}/{method}/{outcome}".to_string(),
        }
    }
}

impl OutcomeConvention {
    /// Substitute the convention placeholders in `template`.
    pub fn expand(&self, template: &str, target: &TargetId, outcome: &str) -> String {
        template
            .replace("{root}", &self.root)
            .replace("{action}", target.action())
            .replace("{method}", target.method())
            .replace("{outcome}", outcome)
    }

    /// Synthesize the conventional descriptor for `outcome`.
    pub fn synthesize(&self, target: &TargetId, outcome: &str) -> OutcomeDescriptor {
        OutcomeDescriptor {
            id: outcome.to_string(),
            renderer: self.renderer.clone(),
            data: self.expand(&self.template, target, outcome),
            mode: None,
            window_state: None,
        }
    }
}
