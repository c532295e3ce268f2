//! Dispatch phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entry point a dispatch arrives through.
///
/// `Action` and `Event` are explicit one-shot submissions. `Render` and
/// `Resource` are passive and may be repeated by the host at will, so only
/// idempotent targets may run there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// A form submission or other explicit state-changing request.
    Action,
    /// An event delivered from another target's submission.
    Event,
    /// Passive view generation.
    Render,
    /// Passive resource serving.
    Resource,
}

impl Phase {
    /// Whether this phase corresponds to an explicit one-shot submission.
    pub const fn is_submission(self) -> bool {
        matches!(self, Phase::Action | Phase::Event)
    }

    /// Whether submission-scope parameters may be written in this phase.
    pub const fn permits_submission_writes(self) -> bool {
        self.is_submission()
    }

    /// Lowercase phase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Action => "action",
            Phase::Event => "event",
            Phase::Render => "render",
            Phase::Resource => "resource",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_phases() {
        assert!(Phase::Action.is_submission());
        assert!(Phase::Event.is_submission());
        assert!(!Phase::Render.is_submission());
        assert!(!Phase::Resource.is_submission());
    }
}
