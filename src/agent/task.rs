//! The conversation loop: one task, one session, bounded turns.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    AgentResult, AutoApprove, SafetyPolicy, TurnExecution, build_turn_responses, execute_turn,
    extract_json,
};
use crate::Config;
use crate::browser::{BrowserControl, Session};
use crate::model::{Content, FunctionCall, GeminiClient, ModelBackend, ModelError, Part};

/// Computer-use agent: owns the model client, the safety policy, and the
/// configuration; acquires a fresh browser session per task.
pub struct Agent<M: ModelBackend> {
    model: M,
    policy: Arc<dyn SafetyPolicy>,
    config: Config,
}

impl Agent<GeminiClient> {
    /// Build an agent against the real model API with the default
    /// auto-approving safety policy. Fails fast if the credential is missing.
    pub fn from_env(config: Config) -> Result<Self, ModelError> {
        let model = GeminiClient::from_env(&config.model)?;
        Ok(Self::new(model, Arc::new(AutoApprove), config))
    }
}

impl<M: ModelBackend> Agent<M> {
    pub fn new(model: M, policy: Arc<dyn SafetyPolicy>, config: Config) -> Self {
        Self {
            model,
            policy,
            config,
        }
    }

    /// Run one task to completion and return its structured result.
    ///
    /// Launches a browser session, drives the conversation loop, and tears
    /// the session down on every exit path. `None` signals any failure:
    /// session launch, model transport, safety termination without a usable
    /// answer, or unextractable final text.
    pub async fn run_task(
        &self,
        task: &str,
        start_url: Option<&str>,
        max_turns: usize,
    ) -> Option<Map<String, Value>> {
        let session = match Session::launch(&self.config).await {
            Ok(session) => session,
            Err(e) => {
                error!("failed to start browser session: {e}");
                return None;
            }
        };
        self.run_with_surface(session, task, start_url, max_turns)
            .await
    }

    /// Drive the loop over an already-acquired control surface.
    ///
    /// Takes ownership of the surface and closes it exactly once, whether the
    /// loop finishes, the safety gate terminates it, the turn budget runs
    /// out, or a model/browser error aborts it.
    pub async fn run_with_surface<S: BrowserControl>(
        &self,
        mut surface: S,
        task: &str,
        start_url: Option<&str>,
        max_turns: usize,
    ) -> Option<Map<String, Value>> {
        let ending = self.drive(&surface, task, start_url, max_turns).await;
        surface.close().await;

        let final_text = match ending {
            Ok(text) => text?,
            Err(e) => {
                error!("task aborted: {e}");
                return None;
            }
        };

        match extract_json(&final_text) {
            Some(map) => {
                info!("extracted structured result");
                Some(map)
            }
            None => {
                warn!("no JSON object found in final answer");
                None
            }
        }
    }

    /// The state machine proper. Returns the best final text seen, if any.
    async fn drive<S: BrowserControl>(
        &self,
        surface: &S,
        task: &str,
        start_url: Option<&str>,
        max_turns: usize,
    ) -> AgentResult<Option<String>> {
        let start = start_url.unwrap_or(&self.config.search_url);
        info!(task, start, max_turns, "task started");

        surface.navigate(start).await?;
        let screenshot = surface.screenshot().await?;

        let mut transcript = vec![Content::user(vec![
            Part::Text(initial_instruction(task)),
            Part::png(&screenshot),
        ])];
        let mut last_text: Option<String> = None;

        for turn in 1..=max_turns {
            debug!(turn, "thinking");
            let reply = self.model.generate(&transcript).await?;
            transcript.push(reply.clone());

            let text = reply.text();
            if !text.trim().is_empty() {
                last_text = Some(text);
            }

            let calls: Vec<FunctionCall> = reply.function_calls().cloned().collect();
            if calls.is_empty() {
                info!(turn, "model returned a final answer");
                return Ok(last_text);
            }

            debug!(turn, actions = calls.len(), "acting");
            let TurnExecution {
                outcomes,
                terminated,
            } = execute_turn(surface, &calls, self.policy.as_ref(), &self.config.search_url).await;

            if terminated {
                info!(turn, "task ended by safety policy");
                return Ok(last_text);
            }

            let responses = build_turn_responses(surface, outcomes).await?;
            transcript.push(Content::user(responses));
        }

        warn!(max_turns, "turn budget exhausted");
        Ok(last_text)
    }
}

/// Seed instruction: the task plus the pure-JSON answer mandate.
fn initial_instruction(task: &str) -> String {
    format!(
        "You are a capable AI assistant operating a web browser.\n\n\
         Task: {task}\n\n\
         Important: once the task is complete, respond with a pure JSON object only.\n\
         No explanations and no markdown code fences, just the JSON object itself.\n\
         Example: {{\"contact_email\": \"example@example.com\", \"contact_call\": \"+123456789\"}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_task_and_mandate() {
        let prompt = initial_instruction("find the support email on https://acme.test");
        assert!(prompt.contains("find the support email on https://acme.test"));
        assert!(prompt.contains("pure JSON object"));
    }
}
