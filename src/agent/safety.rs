//! Safety gate for model-flagged actions.
//!
//! The model attaches a safety review to actions it considers sensitive and
//! refuses to continue the conversation unless the review is acknowledged.
//! The gate resolves each review to a decision before the action executes.

use tracing::warn;

/// Verdict on one safety review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyDecision {
    /// Execute the action and acknowledge the review to the model
    Continue,
    /// Abandon the rest of the turn and end the task
    Terminate,
}

/// Decision hook consulted for every action carrying a safety review.
///
/// Injected into the conversation loop so deployments can wire in a
/// human-in-the-loop prompt or a policy engine.
pub trait SafetyPolicy: Send + Sync {
    fn review(&self, explanation: &str) -> SafetyDecision;
}

/// Default policy: approve every review.
pub struct AutoApprove;

impl SafetyPolicy for AutoApprove {
    fn review(&self, explanation: &str) -> SafetyDecision {
        warn!(explanation, "safety review auto-approved");
        SafetyDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyAll;

    impl SafetyPolicy for DenyAll {
        fn review(&self, _explanation: &str) -> SafetyDecision {
            SafetyDecision::Terminate
        }
    }

    #[test]
    fn auto_approve_always_continues() {
        assert_eq!(
            AutoApprove.review("clicking a checkout button"),
            SafetyDecision::Continue
        );
    }

    #[test]
    fn policies_are_pluggable() {
        let policy: Box<dyn SafetyPolicy> = Box::new(DenyAll);
        assert_eq!(policy.review("anything"), SafetyDecision::Terminate);
    }
}
