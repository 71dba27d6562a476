//! Agent core: the conversation loop and everything it drives.
//!
//! The loop exchanges turns with the computer-use model, gates each proposed
//! action through the safety policy, executes approved actions against the
//! browser session, and feeds post-action observations back until the model
//! produces a final answer (or the turn budget runs out).

mod coords;
mod executor;
mod extract;
mod observation;
mod safety;
mod task;

pub use coords::denormalize;
pub use extract::extract_json;
pub use safety::{AutoApprove, SafetyDecision, SafetyPolicy};
pub use task::Agent;

pub(crate) use executor::{TurnExecution, execute_turn};
pub(crate) use observation::build_turn_responses;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::browser::BrowserError;
use crate::model::ModelError;

/// Errors that abort a task (as opposed to per-action failures, which are
/// reported to the model and keep the loop running).
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Result of executing one action request. Produced exactly once per request
/// that reaches the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Action name, echoed back to the model in the response
    pub name: String,
    /// Set for actions that ran to a decision; absent when the browser call
    /// itself failed (only `error` is populated then)
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
    /// Set when the safety gate approved an attached review; the model
    /// requires the acknowledgement echoed back to accept the next turn
    pub safety_acknowledged: bool,
}

impl ActionOutcome {
    pub(crate) fn succeeded(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            success: Some(true),
            message: Some(message.into()),
            error: None,
            safety_acknowledged: false,
        }
    }

    pub(crate) fn failed(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            success: Some(false),
            message: Some(message.into()),
            error: None,
            safety_acknowledged: false,
        }
    }

    pub(crate) fn errored(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            success: None,
            message: None,
            error: Some(error.into()),
            safety_acknowledged: false,
        }
    }

    /// Flatten into the response payload sent back to the model, with the
    /// current page URL folded in.
    pub(crate) fn into_response(self, url: &str) -> Map<String, Value> {
        let mut response = Map::new();
        response.insert("url".to_string(), Value::String(url.to_string()));
        if let Some(success) = self.success {
            response.insert("success".to_string(), Value::Bool(success));
        }
        if let Some(message) = self.message {
            response.insert("message".to_string(), Value::String(message));
        }
        if let Some(error) = self.error {
            response.insert("error".to_string(), Value::String(error));
        }
        if self.safety_acknowledged {
            response.insert(
                "safety_acknowledgement".to_string(),
                Value::String("true".to_string()),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_outcome_has_no_success_flag() {
        let outcome = ActionOutcome::errored("click_at", "element detached");
        let response = outcome.into_response("https://example.com");
        assert!(response.get("success").is_none());
        assert_eq!(response["error"], "element detached");
        assert_eq!(response["url"], "https://example.com");
    }

    #[test]
    fn acknowledgement_is_threaded_into_response() {
        let mut outcome = ActionOutcome::succeeded("navigate", "Navigated");
        outcome.safety_acknowledged = true;
        let response = outcome.into_response("https://example.com");
        assert_eq!(response["safety_acknowledgement"], "true");
        assert_eq!(response["success"], true);
    }
}
