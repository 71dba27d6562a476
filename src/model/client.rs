//! Gemini generateContent client for the computer-use model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{Content, Tool, default_tools};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors from the model conversation
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Model returned no candidates")]
    EmptyResponse,
}

/// Seam between the conversation loop and the model transport.
///
/// One implementation speaks to the real API ([`GeminiClient`]); tests script
/// replies turn by turn.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Submit the full transcript and return the top candidate's reply.
    async fn generate(&self, contents: &[Content]) -> Result<Content, ModelError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    tools: &'a [Tool],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// Computer-use model client over the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    tools: Vec<Tool>,
}

impl GeminiClient {
    /// Build a client for `model`, reading the credential from
    /// `GEMINI_API_KEY`. Fails before any session starts if the key is
    /// missing.
    pub fn from_env(model: &str) -> Result<Self, ModelError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ModelError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            tools: default_tools(),
        })
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn generate(&self, contents: &[Content]) -> Result<Content, ModelError> {
        let url = format!("{API_BASE}/models/{}:generateContent", self.model);
        debug!(model = %self.model, turns = contents.len(), "calling model");

        let request = GenerateContentRequest {
            contents,
            tools: &self.tools,
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content)
            .ok_or(ModelError::EmptyResponse)
    }
}
