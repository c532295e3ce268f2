//! Engine configuration.
//!
//! ```toml
//! root = "/views"
//! default_stack = "guarded"
//! auto_outcomes = true
//! scope_order = ["submission", "request", "session_private"]
//! render_targets = ["Profile!view"]
//!
//! [error_view]
//! renderer = "template"
//! data = "{root}/error"
//!
//! [[stacks]]
//! name = "guarded"
//! interceptors = [{ ref = "logging" }, { ref = "token" }]
//! ```
//!
//! Every field is optional; missing fields take the values of
//! [`EngineConfig::default`].

use crate::pipeline::StackConfig;
use conduit_core::{
    ConfigError, DEFAULT_STACK, Outcome, OutcomeConvention, Scope, TargetId,
};
use serde::Deserialize;
use std::path::Path;

/// Where failed invocations are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorView {
    /// Renderer id.
    pub renderer: String,
    /// Renderer data; convention placeholders are expanded.
    pub data: String,
}

impl Default for ErrorView {
    fn default() -> Self {
        Self {
            renderer: "template".to_string(),
            data: "{root}/error".to_string(),
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Value of the `{root}` placeholder.
    pub root: String,
    /// Method used when a textual target id names none.
    pub default_method: String,
    /// Stack used by targets that name none.
    pub default_stack: String,
    /// Renderer used by outcomes that name none.
    pub default_renderer: String,
    /// Data template for outcomes without explicit data.
    pub outcome_template: String,
    /// Default scope precedence for input bindings.
    pub scope_order: Vec<Scope>,
    /// Whether re-registering a target id replaces the earlier one.
    pub allow_overwrite: bool,
    /// Whether undeclared outcomes are synthesized from the convention.
    pub auto_outcomes: bool,
    /// Outcome produced when inputs are rejected.
    pub invalid_input_outcome: String,
    /// Where failed invocations are rendered.
    pub error_view: ErrorView,
    /// Targets the host uses as passive render entry points.
    pub render_targets: Vec<String>,
    /// Configured interceptor stacks.
    pub stacks: Vec<StackConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let convention = OutcomeConvention::default();
        Self {
            root: convention.root,
            default_method: TargetId::DEFAULT_METHOD.to_string(),
            default_stack: DEFAULT_STACK.to_string(),
            default_renderer: convention.renderer,
            outcome_template: convention.template,
            scope_order: Scope::DEFAULT_ORDER.to_vec(),
            allow_overwrite: false,
            auto_outcomes: false,
            invalid_input_outcome: Outcome::INVALID_INPUT.to_string(),
            error_view: ErrorView::default(),
            render_targets: Vec::new(),
            stacks: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// The outcome naming convention these settings describe.
    pub fn convention(&self) -> OutcomeConvention {
        OutcomeConvention {
            root: self.root.clone(),
            renderer: self.default_renderer.clone(),
            template: self.outcome_template.clone(),
        }
    }

    /// Check the settings that deserialization cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("default_method", &self.default_method),
            ("default_stack", &self.default_stack),
            ("default_renderer", &self.default_renderer),
            ("outcome_template", &self.outcome_template),
            ("invalid_input_outcome", &self.invalid_input_outcome),
            ("error_view.renderer", &self.error_view.renderer),
        ];
        if let Some((field, _)) = non_empty.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Parse(format!("{field} must not be empty")));
        }
        if self.scope_order.is_empty() {
            return Err(ConfigError::Parse("scope_order must name at least one scope".to_string()));
        }
        for (i, scope) in self.scope_order.iter().enumerate() {
            if self.scope_order[..i].contains(scope) {
                return Err(ConfigError::Parse(format!("scope_order lists {scope} twice")));
            }
        }
        for target in &self.render_targets {
            TargetId::parse(target, &self.default_method)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_full_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            root = "/WEB-INF/views"
            auto_outcomes = true
            scope_order = ["request", "submission"]
            render_targets = ["Profile!view", "Dashboard"]

            [error_view]
            data = "{root}/oops"

            [[stacks]]
            name = "guarded"
            interceptors = [{ ref = "token" }]
            "#,
        )
        .unwrap();

        assert!(config.auto_outcomes);
        assert_eq!(config.scope_order, vec![Scope::Request, Scope::Submission]);
        assert_eq!(config.error_view.renderer, "template");
        assert_eq!(config.error_view.data, "{root}/oops");
        assert_eq!(config.stacks[0].name, "guarded");
        assert_eq!(config.convention().root, "/WEB-INF/views");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml_str("auto_outcome = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_duplicate_scope_rejected() {
        let err = EngineConfig::from_toml_str(r#"scope_order = ["request", "request"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(ref msg) if msg.contains("twice")));
    }

    #[test]
    fn test_malformed_render_target() {
        let err = EngineConfig::from_toml_str(r#"render_targets = ["!view"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedTarget(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_path("/nonexistent/conduit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
